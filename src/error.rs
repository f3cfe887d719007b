//! Error types for the cache server
//!
//! Provides unified error handling using thiserror.

use std::path::{Path, PathBuf};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache server.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Missing or malformed argument
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Snapshot destination or source could not be read or written
    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot content is not a valid key/value mapping
    #[error("Malformed snapshot: {0}")]
    Format(String),

    /// The expiry scheduler no longer accepts timers
    #[error("Cache is shutting down")]
    ShutDown,

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Wraps an I/O error together with the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// HTTP status the error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::Format(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::ShutDown => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache server.
pub type Result<T> = std::result::Result<T, CacheError>;
