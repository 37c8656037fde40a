//! Error types for huddle-importer
//!
//! [`ImportError`] is what the importer and its collaborators return.
//! [`ApiError`] is the HTTP-facing wrapper that renders `{error: {code, message}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Import pipeline error
#[derive(Debug, Error)]
pub enum ImportError {
    /// Importer identity incomplete (missing key or name)
    #[error("Invalid importer configuration: {0}")]
    InvalidConfiguration(String),

    /// Selection lacks its users or channels list
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// No acting user supplied
    #[error("You must be logged in to do this")]
    Unauthenticated,

    /// The import record was invalidated while the run was in progress
    #[error("The import operation is no longer valid")]
    RunInvalidated,

    /// Converter failed outside of a per-record error
    #[error("Conversion failed: {0}")]
    ConversionFailure(String),

    /// Export file could not be read or parsed
    #[error("Invalid export file: {0}")]
    InvalidFile(String),

    /// Persistence failure
    #[error(transparent)]
    Store(#[from] huddle_common::Error),
}

impl From<sqlx::Error> for ImportError {
    fn from(err: sqlx::Error) -> Self {
        ImportError::Store(huddle_common::Error::Database(err))
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing acting user (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Conflict (409) - e.g., import already running
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// huddle-common error
    #[error("Common error: {0}")]
    Common(#[from] huddle_common::Error),
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::InvalidSelection(_)
            | ImportError::InvalidConfiguration(_)
            | ImportError::InvalidFile(_) => ApiError::BadRequest(err.to_string()),
            ImportError::Unauthenticated => ApiError::Unauthorized(err.to_string()),
            ImportError::RunInvalidated => ApiError::Conflict(err.to_string()),
            ImportError::Store(huddle_common::Error::NotFound(msg)) => ApiError::NotFound(msg),
            ImportError::Store(inner) => ApiError::Common(inner),
            ImportError::ConversionFailure(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
