//! Error types for the vault core.

use std::io;
use thiserror::Error;

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors that can occur in vault operations.
///
/// The first group of variants is caller-facing and carries a message that is
/// safe to return. The second group wraps internal failures; their detail is
/// logged but must never be passed through to callers (see [`VaultError::code`]).
#[derive(Debug, Error)]
pub enum VaultError {
    /// Malformed or oversized input.
    #[error("validation error: {message}")]
    Validation {
        /// Description of the problem.
        message: String,
    },

    /// Duplicate unique name on direct tag/collection creation.
    #[error("conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// Unknown id or name.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of record ("snippet", "tag", ...).
        kind: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// The free-tier snippet ceiling is reached.
    #[error("free tier limit of {limit} snippets reached")]
    QuotaExceeded {
        /// The configured ceiling.
        limit: u32,
    },

    /// The operation requires an active entitlement.
    #[error("license required: {feature}")]
    LicenseRequired {
        /// The gated feature.
        feature: &'static str,
    },

    /// Admission control rejected the request.
    #[error("rate limited, retry after {retry_after_ms} ms")]
    RateLimited {
        /// Milliseconds until a slot frees up.
        retry_after_ms: u64,
    },

    /// Another backup or restore (or a conflicting request) is in flight.
    #[error("backup or restore already in flight: {message}")]
    BackupInFlight {
        /// Description of what is busy.
        message: String,
    },

    /// Restore replaced the data file but the search index could not be rebuilt.
    #[error("restore failed: {message}")]
    RestoreFailed {
        /// Description of the failure.
        message: String,
    },

    /// The primary data file is corrupt or could not be initialized.
    #[error("vault corrupt: {message}")]
    Corrupt {
        /// Description of the corruption.
        message: String,
    },

    /// Underlying SQLite error.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invariant broken or unexpected state.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl VaultError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Creates a backup-in-flight error.
    pub fn backup_in_flight(message: impl Into<String>) -> Self {
        Self::BackupInFlight {
            message: message.into(),
        }
    }

    /// Creates a restore-failed error.
    pub fn restore_failed(message: impl Into<String>) -> Self {
        Self::RestoreFailed {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Conflict { .. } => "CONFLICT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            Self::LicenseRequired { .. } => "LICENSE_REQUIRED",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::BackupInFlight { .. } => "BACKUP_IN_FLIGHT",
            Self::RestoreFailed { .. } => "RESTORE_FAILED",
            Self::Corrupt { .. }
            | Self::Storage(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Internal { .. } => "INTERNAL",
        }
    }

    /// Returns true if the error's message may be shown to callers.
    #[must_use]
    pub fn is_caller_facing(&self) -> bool {
        self.code() != "INTERNAL"
    }

    /// Returns true if a failed unique constraint caused this error.
    pub(crate) fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::Storage(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(VaultError::validation("x").code(), "VALIDATION_ERROR");
        assert_eq!(VaultError::conflict("x").code(), "CONFLICT");
        assert_eq!(VaultError::not_found("snippet", "1").code(), "NOT_FOUND");
        assert_eq!(VaultError::QuotaExceeded { limit: 50 }.code(), "QUOTA_EXCEEDED");
        assert_eq!(VaultError::backup_in_flight("x").code(), "BACKUP_IN_FLIGHT");
        assert_eq!(VaultError::restore_failed("x").code(), "RESTORE_FAILED");
    }

    #[test]
    fn internal_errors_are_not_caller_facing() {
        let err = VaultError::from(io::Error::new(io::ErrorKind::Other, "disk on fire"));
        assert_eq!(err.code(), "INTERNAL");
        assert!(!err.is_caller_facing());
        assert!(VaultError::corrupt("bad page").code() == "INTERNAL");
    }

    #[test]
    fn not_found_display() {
        let msg = VaultError::not_found("tag", "abc").to_string();
        assert_eq!(msg, "tag not found: abc");
    }
}
