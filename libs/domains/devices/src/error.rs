use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_helpers::{AppError, ErrorCode};
use mongodb::error::{
    ErrorKind, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT, WriteFailure,
};
use thiserror::Error;
use uuid::Uuid;

const DUPLICATE_KEY: i32 = 11000;
const WRITE_CONFLICT: i32 = 112;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device_id is required")]
    MissingInput,

    #[error("Link not found")]
    LinkNotFound,

    #[error("Device {0} not found")]
    DeviceNotFound(Uuid),

    #[error("Device {0} is already linked")]
    AlreadyLinked(Uuid),

    #[error("Catalog entry {0} is not an IoT device")]
    NotADevice(Uuid),

    #[error("Device identifier '{0}' is already registered")]
    DuplicateIdentifier(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    /// Another transaction touched the same documents.
    #[error("Write conflict: {0}")]
    WriteConflict(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Database error: {0}")]
    Database(String),
}

pub type DeviceResult<T> = Result<T, DeviceError>;

impl DeviceError {
    /// Classify a failure of begin/commit/abort.
    pub fn transaction(err: mongodb::error::Error) -> Self {
        match DeviceError::from(err) {
            DeviceError::Database(detail) => DeviceError::Transaction(detail),
            other => other,
        }
    }
}

impl From<DeviceError> for AppError {
    fn from(err: DeviceError) -> Self {
        let message = err.to_string();
        match err {
            DeviceError::MissingInput => {
                AppError::rejected(StatusCode::BAD_REQUEST, ErrorCode::MissingInput, message)
            }
            DeviceError::AlreadyLinked(_) => {
                AppError::rejected(StatusCode::BAD_REQUEST, ErrorCode::AlreadyLinked, message)
            }
            DeviceError::NotADevice(_) => {
                AppError::rejected(StatusCode::BAD_REQUEST, ErrorCode::NotADevice, message)
            }
            DeviceError::LinkNotFound | DeviceError::DeviceNotFound(_) => {
                AppError::NotFound(message)
            }
            DeviceError::DuplicateIdentifier(_) => {
                AppError::rejected(StatusCode::CONFLICT, ErrorCode::DuplicateIdentifier, message)
            }
            DeviceError::Validation(msg) => AppError::BadRequest(msg),
            DeviceError::WriteConflict(_) => {
                AppError::rejected(StatusCode::CONFLICT, ErrorCode::WriteConflict, message)
            }
            DeviceError::Transaction(detail) => {
                AppError::storage(ErrorCode::TransactionAborted, detail)
            }
            DeviceError::Database(detail) => AppError::storage(ErrorCode::StorageError, detail),
        }
    }
}

impl IntoResponse for DeviceError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

impl From<mongodb::error::Error> for DeviceError {
    fn from(err: mongodb::error::Error) -> Self {
        if err.contains_label(TRANSIENT_TRANSACTION_ERROR) || has_code(&err, WRITE_CONFLICT) {
            DeviceError::WriteConflict(err.to_string())
        } else if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) {
            DeviceError::Transaction(err.to_string())
        } else {
            DeviceError::Database(err.to_string())
        }
    }
}

/// True when a write was rejected by a unique index.
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    has_code(err, DUPLICATE_KEY)
}

fn has_code(err: &mongodb::error::Error, code: i32) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == code,
        ErrorKind::Command(e) => e.code == code,
        _ => false,
    }
}
