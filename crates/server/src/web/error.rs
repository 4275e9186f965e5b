//! Mapping of file-operation failures to HTTP responses.
//!
//! Response bodies only ever carry a short fixed message: the share root's
//! location on disk never reaches the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use protocol::messages::{ErrorCode, ErrorMessage};
use tokio::task::JoinError;
use tracing::error;

use crate::files::{BrowserError, SandboxError, TransferError};

/// Errors surfaced by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested path would leave the share root.
    #[error("invalid path")]
    InvalidPath,

    /// Nothing exists at the requested path.
    #[error("not found")]
    NotFound,

    /// A directory operation was requested on something else.
    #[error("not a directory")]
    NotADirectory,

    /// A file operation was requested on a directory.
    #[error("is a directory")]
    IsADirectory,

    /// The filesystem failed while serving the request.
    #[error("filesystem error")]
    Io(#[source] std::io::Error),

    /// Internal error.
    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    /// Protocol error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::InvalidPath => ErrorCode::InvalidPath,
            ApiError::NotFound => ErrorCode::NotFound,
            ApiError::NotADirectory => ErrorCode::NotADirectory,
            ApiError::IsADirectory => ErrorCode::IsADirectory,
            ApiError::Io(_) | ApiError::Internal(_) => ErrorCode::IoFailure,
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Convert the error to a protocol ErrorMessage.
    pub fn to_error_message(&self) -> ErrorMessage {
        ErrorMessage {
            code: self.code(),
            message: self.to_string(),
        }
    }

    /// Plain-text response, for routes a browser navigates to directly.
    pub fn into_text_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_error_message())).into_response()
    }
}

impl From<SandboxError> for ApiError {
    fn from(e: SandboxError) -> Self {
        match e {
            SandboxError::PathTraversal(_) => ApiError::InvalidPath,
            SandboxError::InvalidRoot { .. } => ApiError::Internal(e.to_string()),
            SandboxError::Io(e) => io_failure(e),
        }
    }
}

impl From<BrowserError> for ApiError {
    fn from(e: BrowserError) -> Self {
        match e {
            BrowserError::NotFound(_) => ApiError::NotFound,
            BrowserError::NotADirectory(_) => ApiError::NotADirectory,
            BrowserError::Io(e) => io_failure(e),
        }
    }
}

impl From<TransferError> for ApiError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::NotFound(_) => ApiError::NotFound,
            TransferError::IsADirectory(_) => ApiError::IsADirectory,
            TransferError::Io(e) => io_failure(e),
        }
    }
}

impl From<JoinError> for ApiError {
    fn from(e: JoinError) -> Self {
        error!(error = %e, "Blocking file task failed");
        ApiError::Internal(e.to_string())
    }
}

fn io_failure(e: std::io::Error) -> ApiError {
    error!(error = %e, "Filesystem error while serving request");
    ApiError::Io(e)
}
