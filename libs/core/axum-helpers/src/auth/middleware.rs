use super::jwt::JwtAuth;
use super::principal::Principal;
use crate::errors::AppError;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Bearer token from `Authorization`, falling back to the `access_token` cookie.
pub(crate) fn extract_token_from_request(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .or_else(|| {
            headers
                .get("cookie")
                .and_then(|v| v.to_str().ok())
                .and_then(|cookies| {
                    cookies.split(';').find_map(|cookie| {
                        cookie
                            .trim()
                            .strip_prefix("access_token=")
                            .map(str::to_string)
                    })
                })
        })
        .filter(|token| !token.is_empty())
}

/// Resolve the caller and attach a [`Principal`] (and the raw claims) to the request.
///
/// - no token: 401 `UNAUTHORIZED`
/// - bad signature, expired, or a subject that is not a UUID: 400 `INVALID_TOKEN`
///
/// ```ignore
/// let protected = Router::new()
///     .nest("/links", links)
///     .layer(axum::middleware::from_fn_with_state(auth, jwt_auth_middleware));
/// ```
pub async fn jwt_auth_middleware(
    State(auth): State<JwtAuth>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token_from_request(request.headers()).ok_or_else(|| {
        tracing::debug!("No JWT found in Authorization header or cookie");
        AppError::Unauthorized("No token provided".to_string())
    })?;

    let claims = auth.verify_token(&token).map_err(|e| {
        tracing::debug!(error = %e, "JWT verification failed");
        AppError::InvalidToken(e.to_string())
    })?;

    let id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::InvalidToken(format!("subject '{}' is not a user id", claims.sub)))?;

    let principal = Principal {
        id,
        role: claims.role,
    };

    request.extensions_mut().insert(principal);
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_token_from_request(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_extract_cookie_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_static("theme=dark; access_token=abc.def.ghi"),
        );
        assert_eq!(extract_token_from_request(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_extract_ignores_other_schemes_and_empty_tokens() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(extract_token_from_request(&headers).is_none());

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert!(extract_token_from_request(&headers).is_none());
    }
}
