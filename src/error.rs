use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("HID device unavailable [{path}]: {reason}")]
    DeviceUnavailable { path: String, reason: String },

    #[error("HID write failed [{path}]: {reason} (code: {error_code})")]
    WriteFailed {
        path: String,
        reason: String,
        error_code: String,
    },

    #[error("Failed to decode event: {0}")]
    DecodeFailed(String),

    #[error("Unknown event type")]
    UnknownEventType,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Failed to start {program}: {reason}")]
    SubprocessStartFailed { program: String, reason: String },

    #[error("{program} exited: {status}")]
    SubprocessExited { program: String, status: String },

    #[error("Stream already in use")]
    StreamConflict,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::DecodeFailed(_) | AppError::UnknownEventType | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::StreamConflict => StatusCode::CONFLICT,
            AppError::DeviceUnavailable { .. } | AppError::ServiceUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::WriteFailed { .. }
            | AppError::SubprocessStartFailed { .. }
            | AppError::SubprocessExited { .. }
            | AppError::Internal(_)
            | AppError::Io(_)
            | AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(status = %status, error_message = %body.message, "Request failed");
        } else {
            tracing::warn!(status = %status, error_message = %body.message, "Request rejected");
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
