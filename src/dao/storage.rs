//! Backend-agnostic storage errors.

use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or rejected the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human-readable description of the failure.
        message: String,
        /// Backend error that caused it.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The targeted document (or nested poll/option) does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a not-found error describing the missing target.
    pub fn not_found(target: impl Into<String>) -> Self {
        StorageError::NotFound(target.into())
    }
}
