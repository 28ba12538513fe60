//! Stable error codes carried in every error response.
//!
//! ```rust
//! use axum_helpers::errors::ErrorCode;
//!
//! let code = ErrorCode::AlreadyLinked;
//! assert_eq!(code.as_str(), "ALREADY_LINKED");
//! assert_eq!(code.code(), 1102);
//! ```

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Machine-readable error kinds.
///
/// Ranges of [`ErrorCode::code`]:
/// - 1000-1099: generic client errors
/// - 1100-1199: device linkage errors
/// - 2000-2099: storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    InvalidUuid,
    JsonExtraction,
    NotFound,
    InternalError,
    Unauthorized,
    Forbidden,
    Conflict,
    BadRequest,
    ServiceUnavailable,
    /// Bearer token present but malformed, expired or badly signed.
    InvalidToken,

    MissingInput,
    AlreadyLinked,
    NotADevice,
    DuplicateIdentifier,
    /// A concurrent transaction touched the same document.
    WriteConflict,

    StorageError,
    TransactionAborted,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InvalidUuid => "INVALID_UUID",
            Self::JsonExtraction => "JSON_EXTRACTION",
            Self::NotFound => "NOT_FOUND",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::Conflict => "CONFLICT",
            Self::BadRequest => "BAD_REQUEST",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::MissingInput => "MISSING_INPUT",
            Self::AlreadyLinked => "ALREADY_LINKED",
            Self::NotADevice => "NOT_A_DEVICE",
            Self::DuplicateIdentifier => "DUPLICATE_IDENTIFIER",
            Self::WriteConflict => "WRITE_CONFLICT",
            Self::StorageError => "STORAGE_ERROR",
            Self::TransactionAborted => "TRANSACTION_ABORTED",
        }
    }

    /// Integer code for logs and dashboards.
    pub fn code(&self) -> i32 {
        match self {
            Self::ValidationError => 1001,
            Self::InvalidUuid => 1002,
            Self::JsonExtraction => 1003,
            Self::NotFound => 1004,
            Self::InternalError => 1005,
            Self::Unauthorized => 1006,
            Self::Forbidden => 1007,
            Self::Conflict => 1008,
            Self::BadRequest => 1009,
            Self::ServiceUnavailable => 1011,
            Self::InvalidToken => 1012,

            Self::MissingInput => 1101,
            Self::AlreadyLinked => 1102,
            Self::NotADevice => 1103,
            Self::DuplicateIdentifier => 1104,
            Self::WriteConflict => 1105,

            Self::StorageError => 2001,
            Self::TransactionAborted => 2002,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            Self::ValidationError => "Request validation failed",
            Self::InvalidUuid => "Invalid UUID format",
            Self::JsonExtraction => "Failed to parse request body",
            Self::NotFound => "Resource not found",
            Self::InternalError => "An internal server error occurred",
            Self::Unauthorized => "Authentication required",
            Self::Forbidden => "Access forbidden",
            Self::Conflict => "Resource already exists",
            Self::BadRequest => "Bad request",
            Self::ServiceUnavailable => "Service is temporarily unavailable",
            Self::InvalidToken => "Invalid token",
            Self::MissingInput => "A required field is missing",
            Self::AlreadyLinked => "Device is already linked",
            Self::NotADevice => "Catalog entry is not an IoT device",
            Self::DuplicateIdentifier => "Device identifier is already registered",
            Self::WriteConflict => "The resource was modified concurrently, retry the request",
            Self::StorageError => "A storage error occurred",
            Self::TransactionAborted => "The transaction was aborted",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
