//! Error type of the request surface.

use pinup_core::VaultError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Result type for request handling.
pub type ApiResult<T> = Result<T, ApiError>;

/// Message returned for every internal failure; detail goes to the log only.
pub const INTERNAL_MESSAGE: &str = "internal error";

/// An error as returned to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ApiError {
    /// Stable error code, e.g. `NOT_FOUND`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Present on `RATE_LIMITED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl ApiError {
    /// A malformed request.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: "VALIDATION_ERROR".to_string(),
            message: message.into(),
            retry_after_ms: None,
        }
    }

    /// Returns true for errors the caller can fix or retry.
    pub fn is_client_error(&self) -> bool {
        self.code != "INTERNAL"
    }

    /// Returns true for failures on our side.
    pub fn is_server_error(&self) -> bool {
        self.code == "INTERNAL"
    }
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        let retry_after_ms = match &err {
            VaultError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        };
        let message = if err.is_caller_facing() {
            err.to_string()
        } else {
            error!(error = %err, code = err.code(), "request failed");
            INTERNAL_MESSAGE.to_string()
        };
        Self {
            code: err.code().to_string(),
            message,
            retry_after_ms,
        }
    }
}
