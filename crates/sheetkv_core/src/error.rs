//! Error types for SheetKV.

use thiserror::Error;

/// Result type for cache and client operations.
pub type SheetKvResult<T> = Result<T, SheetKvError>;

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors surfaced by the cache, the sync coordinator and the client.
#[derive(Error, Debug)]
pub enum SheetKvError {
    /// No record is stored under the key.
    #[error("key not found: {key}")]
    KeyNotFound {
        /// The missing key.
        key: u32,
    },

    /// A record is already stored under the key.
    #[error("duplicate key: {key}")]
    DuplicateKey {
        /// The conflicting key.
        key: u32,
    },

    /// Keys must address data rows (row 1 is the header).
    #[error("invalid key {key}: data rows start at {min}", min = crate::record::MIN_KEY)]
    InvalidKey {
        /// The rejected key.
        key: u32,
    },

    /// The query failed validation.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// What is wrong with the query.
        message: String,
    },

    /// The adapter kept failing until the retry budget ran out.
    #[error("sync failed after {retries} retries: {source}")]
    SyncFailed {
        /// Number of retries performed after the first attempt.
        retries: u32,
        /// The last adapter error.
        #[source]
        source: AdapterError,
    },

    /// The client has been closed.
    #[error("client is closed")]
    ClientClosed,

    /// The operation was cancelled through its [`crate::CancelToken`].
    #[error("operation cancelled")]
    Cancelled,

    /// I/O error (e.g. spawning the sync thread).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SheetKvError {
    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Returns true if the error came from an exhausted retry budget.
    pub fn is_sync_failure(&self) -> bool {
        matches!(self, SheetKvError::SyncFailed { .. })
    }
}

/// Errors reported by a backing-store [`crate::Adapter`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The backing store failed (network, file, quota, ...).
    #[error("backend error: {message}")]
    Backend {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// A batch tried to add a row that already exists.
    #[error("cannot add record with duplicate key: {key}")]
    DuplicateKey {
        /// The conflicting key.
        key: u32,
    },

    /// A batch tried to update or delete a row that does not exist.
    #[error("no record at key: {key}")]
    KeyNotFound {
        /// The missing key.
        key: u32,
    },

    /// The adapter observed a cancelled token.
    #[error("adapter call cancelled")]
    Cancelled,
}

impl AdapterError {
    /// Creates a retryable backend error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable backend error.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            AdapterError::Backend { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(AdapterError::transient("rate limited").is_retryable());
        assert!(!AdapterError::fatal("sheet not found").is_retryable());
        assert!(!AdapterError::Cancelled.is_retryable());
        assert!(!AdapterError::DuplicateKey { key: 3 }.is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SheetKvError::ClientClosed;
        assert_eq!(err.to_string(), "client is closed");

        let err = SheetKvError::KeyNotFound { key: 7 };
        assert_eq!(err.to_string(), "key not found: 7");

        let err = SheetKvError::InvalidKey { key: 1 };
        assert!(err.to_string().contains("start at 2"));

        let err = SheetKvError::SyncFailed {
            retries: 3,
            source: AdapterError::transient("quota exceeded"),
        };
        assert!(err.to_string().contains("3 retries"));
        assert!(err.to_string().contains("quota exceeded"));
        assert!(err.is_sync_failure());
    }
}
