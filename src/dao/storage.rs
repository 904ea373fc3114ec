use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or rejected the request.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Backend description of the failure.
        message: String,
        /// Backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The table (collection, database) does not exist yet.
    #[error("table `{table}` not found")]
    NotFound {
        /// Missing table.
        table: String,
    },
    /// The record cannot be stored as given.
    #[error("invalid record: {reason}")]
    InvalidRecord {
        /// Why the record was refused.
        reason: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a not-found error for a missing table.
    pub fn not_found(table: impl Into<String>) -> Self {
        StorageError::NotFound {
            table: table.into(),
        }
    }

    /// Whether the failure only means "nothing was written yet".
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}
