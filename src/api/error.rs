//! API error types and their HTTP mapping.
//!
//! Upload and file routes answer with `{"error": "..."}`; the submit route
//! answers in plain text via [`PlainTextError`]. Internal details are logged
//! and never sent to the caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::DatabaseError;
use crate::sanitize::SanitizeError;
use crate::storage::StorageError;
use crate::uploader::UploadError;

/// Message sent to callers for every server-side failure.
pub const SERVER_ERROR_MESSAGE: &str = "Server error.";

/// Structured error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Status code and caller-facing message. Logs internal detail.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail.clone()),
            ApiError::PayloadTooLarge(detail) => (StatusCode::PAYLOAD_TOO_LARGE, detail.clone()),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail.clone()),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    SERVER_ERROR_MESSAGE.to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_message();
        (status, Json(ErrorBody { error })).into_response()
    }
}

/// Plain-text rendering of an [`ApiError`].
#[derive(Debug)]
pub struct PlainTextError(pub ApiError);

impl From<ApiError> for PlainTextError {
    fn from(err: ApiError) -> Self {
        PlainTextError(err)
    }
}

impl From<SanitizeError> for PlainTextError {
    fn from(err: SanitizeError) -> Self {
        PlainTextError(err.into())
    }
}

impl From<DatabaseError> for PlainTextError {
    fn from(err: DatabaseError) -> Self {
        PlainTextError(err.into())
    }
}

impl IntoResponse for PlainTextError {
    fn into_response(self) -> Response {
        let (status, message) = self.0.status_and_message();
        (status, message).into_response()
    }
}

impl From<SanitizeError> for ApiError {
    fn from(err: SanitizeError) -> Self {
        ApiError::BadRequest(format!("Invalid submission: {err}"))
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::FileTooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            UploadError::Storage { .. } => ApiError::Internal(err.to_string()),
            _ => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) | StorageError::InvalidKey(key) => {
                ApiError::NotFound(format!("No such file: {key}"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}
