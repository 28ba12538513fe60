pub mod codes;
pub mod handlers;
pub mod responses;

pub use codes::ErrorCode;

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Error as UuidError;
use validator::ValidationErrors;

/// Body of every error response.
///
/// ```json
/// {
///   "code": 1102,
///   "error": "ALREADY_LINKED",
///   "message": "Device 0191... is already linked",
///   "details": null
/// }
/// ```
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Integer error code for logging and monitoring
    pub code: i32,
    /// Stable machine-readable kind
    pub error: String,
    /// Human-readable message
    pub message: String,
    /// Field errors for validation failures, driver detail for storage failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            error: code.as_str().to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Application error type that can be converted to HTTP responses.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    #[error("JSON extraction error: {0}")]
    JsonExtractorRejection(#[from] JsonRejection),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationErrors),

    #[error("UUID error: {0}")]
    UuidError(#[from] UuidError),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Client error carrying a domain-specific code.
    #[error("{message}")]
    Rejected {
        status: StatusCode,
        code: ErrorCode,
        message: String,
    },

    /// Storage failure; `detail` is the driver's error text.
    #[error("{message}: {detail}")]
    Storage {
        code: ErrorCode,
        message: String,
        detail: String,
    },

    #[error("Internal Server Error: {0}")]
    InternalServerError(String),

    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    pub fn rejected(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        AppError::Rejected {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn storage(code: ErrorCode, detail: impl Into<String>) -> Self {
        AppError::Storage {
            code,
            message: code.default_message().to_string(),
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::JsonExtractorRejection(e) => e.status(),
            AppError::ValidationError(_)
            | AppError::UuidError(_)
            | AppError::BadRequest(_)
            | AppError::InvalidToken(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Rejected { status, .. } => *status,
            AppError::Storage { .. } | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn into_body(self) -> ErrorResponse {
        match self {
            AppError::JsonExtractorRejection(e) => {
                tracing::warn!(error_code = ErrorCode::JsonExtraction.code(), "JSON extraction error: {:?}", e);
                ErrorResponse::new(ErrorCode::JsonExtraction, e.body_text())
            }
            AppError::ValidationError(e) => {
                tracing::info!(error_code = ErrorCode::ValidationError.code(), "Validation error: {}", e);
                ErrorResponse::new(
                    ErrorCode::ValidationError,
                    ErrorCode::ValidationError.default_message(),
                )
                .with_details(validation_details(&e))
            }
            AppError::UuidError(e) => {
                tracing::warn!(error_code = ErrorCode::InvalidUuid.code(), "UUID error: {}", e);
                ErrorResponse::new(ErrorCode::InvalidUuid, ErrorCode::InvalidUuid.default_message())
            }
            AppError::BadRequest(msg) => {
                tracing::info!("Bad request: {}", msg);
                ErrorResponse::new(ErrorCode::BadRequest, msg)
            }
            AppError::Unauthorized(msg) => {
                tracing::info!("Unauthorized: {}", msg);
                ErrorResponse::new(ErrorCode::Unauthorized, msg)
            }
            AppError::InvalidToken(msg) => {
                tracing::info!("Invalid token: {}", msg);
                ErrorResponse::new(ErrorCode::InvalidToken, ErrorCode::InvalidToken.default_message())
            }
            AppError::Forbidden(msg) => {
                tracing::info!("Forbidden: {}", msg);
                ErrorResponse::new(ErrorCode::Forbidden, msg)
            }
            AppError::NotFound(msg) => {
                tracing::info!(error_code = ErrorCode::NotFound.code(), "Not found: {}", msg);
                ErrorResponse::new(ErrorCode::NotFound, msg)
            }
            AppError::Conflict(msg) => {
                tracing::info!("Conflict: {}", msg);
                ErrorResponse::new(ErrorCode::Conflict, msg)
            }
            AppError::Rejected { code, message, .. } => {
                tracing::info!(error_code = code.code(), kind = code.as_str(), "{}", message);
                ErrorResponse::new(code, message)
            }
            AppError::Storage {
                code,
                message,
                detail,
            } => {
                tracing::error!(error_code = code.code(), detail = %detail, "{}", message);
                ErrorResponse::new(code, message).with_details(json!({ "storage": detail }))
            }
            AppError::InternalServerError(msg) => {
                tracing::error!(error_code = ErrorCode::InternalError.code(), "Internal server error: {}", msg);
                ErrorResponse::new(ErrorCode::InternalError, msg)
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                ErrorResponse::new(ErrorCode::ServiceUnavailable, msg)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(self.into_body())).into_response()
    }
}

/// `{ field: [{ code, message, params }] }` for each failing field.
fn validation_details(errors: &ValidationErrors) -> Value {
    let fields = errors
        .field_errors()
        .iter()
        .map(|(field, errors)| {
            let entries: Vec<Value> = errors
                .iter()
                .map(|err| {
                    json!({
                        "code": err.code,
                        "message": err.message,
                        "params": err.params,
                    })
                })
                .collect();
            (field.to_string(), Value::Array(entries))
        })
        .collect::<serde_json::Map<_, _>>();

    Value::Object(fields)
}
