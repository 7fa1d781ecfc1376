//! Error-to-HTTP response conversion
//!
//! Handlers return `Result<_, ApiError>`; every variant maps to a status
//! code and a short plaintext body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, error};

use crate::images::{ParamError, StoreError, TransformError};

/// Request failures
#[derive(Debug, Error)]
pub enum ApiError {
    /// `n` missing or not a valid identifier
    #[error("n is not right")]
    InvalidName,

    #[error(transparent)]
    InvalidParam(#[from] ParamError),

    #[error("scale is out of range")]
    ScaleOutOfRange,

    /// Malformed request body (multipart)
    #[error("{message}")]
    InvalidRequest { status: StatusCode, message: String },

    #[error("content type is not support")]
    UnsupportedType,

    #[error("image not exist")]
    NotFound,

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidName
            | ApiError::InvalidParam(_)
            | ApiError::ScaleOutOfRange
            | ApiError::UnsupportedType => StatusCode::BAD_REQUEST,
            ApiError::InvalidRequest { status, .. } => *status,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::Unsupported(_) => ApiError::UnsupportedType,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<TransformError> for ApiError {
    fn from(e: TransformError) -> Self {
        match e {
            TransformError::TooLarge { .. } => ApiError::ScaleOutOfRange,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(status = %status, error = %self, "Server error in image handler");
        } else {
            debug!(status = %status, error = %self, "Rejected image request");
        }

        (status, self.to_string()).into_response()
    }
}
