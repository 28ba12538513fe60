//! JSON extractor that runs `validator` rules before the handler sees the body.

use crate::errors::AppError;
use axum::{
    extract::{FromRequest, Json, Request},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use validator::Validate;

/// Deserialize and validate a JSON body.
///
/// Malformed JSON is rejected with `JSON_EXTRACTION`, rule violations with
/// `VALIDATION_ERROR` and per-field details.
///
/// ```ignore
/// #[derive(Deserialize, Validate)]
/// struct RegisterEntry {
///     #[validate(length(min = 1, max = 200))]
///     name: String,
/// }
///
/// async fn register(ValidatedJson(input): ValidatedJson<RegisterEntry>) -> String {
///     input.name
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::from(e).into_response())?;

        data.validate()
            .map_err(|e| AppError::from(e).into_response())?;

        Ok(ValidatedJson(data))
    }
}
