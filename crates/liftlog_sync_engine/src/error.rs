//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Lost connectivity is deliberately not an error: `trigger` treats it as
/// a silent no-op and the caller retries via the usual triggers.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Remote store failure.
    #[error("remote store error: {message}")]
    Remote {
        /// Error message.
        message: String,
        /// Whether a later sync attempt can succeed without intervention.
        retryable: bool,
    },

    /// Local store failure. Always fatal to the current sync attempt.
    #[error("local store error: {0}")]
    LocalStore(String),

    /// The bounded trigger queue is full.
    #[error("sync trigger queue is full (capacity {capacity})")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },
}

impl SyncError {
    /// Creates a retryable remote error (transient network failure,
    /// server unavailable).
    pub fn remote_unavailable(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable remote error (constraint violation,
    /// rejected write).
    pub fn remote_rejected(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a local store error.
    pub fn local(message: impl Into<String>) -> Self {
        Self::LocalStore(message.into())
    }

    /// Returns true if a later sync attempt can succeed without
    /// intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(SyncError::remote_unavailable("connection reset").is_retryable());
        assert!(!SyncError::remote_rejected("foreign key violation").is_retryable());
        assert!(!SyncError::local("disk I/O error").is_retryable());
        assert!(!SyncError::QueueFull { capacity: 8 }.is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::remote_rejected("duplicate id");
        assert_eq!(err.to_string(), "remote store error: duplicate id");

        let err = SyncError::local("disk full");
        assert_eq!(err.to_string(), "local store error: disk full");

        let err = SyncError::QueueFull { capacity: 8 };
        assert!(err.to_string().contains("8"));
    }
}
