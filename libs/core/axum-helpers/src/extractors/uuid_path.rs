//! UUID path parameter extractor.

use crate::errors::AppError;
use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

/// Single UUID path segment; malformed values become an `INVALID_UUID` 400.
///
/// ```ignore
/// async fn get_link(UuidPath(id): UuidPath) -> String {
///     format!("link {id}")
/// }
///
/// let app = Router::new().route("/links/{id}", get(get_link));
/// ```
pub struct UuidPath(pub Uuid);

impl<S> FromRequestParts<S> for UuidPath
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        Uuid::parse_str(&raw)
            .map(UuidPath)
            .map_err(|e| AppError::UuidError(e).into_response())
    }
}
