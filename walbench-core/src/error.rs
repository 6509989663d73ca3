//! Error types for walbench

use thiserror::Error;

/// Result type alias for walbench operations
pub type Result<T> = std::result::Result<T, BenchError>;

/// walbench error types
#[derive(Error, Debug)]
pub enum BenchError {
    /// Record failed validation before reaching the engine
    #[error("bad record: key {key}: {reason}")]
    BadRecord { key: i64, reason: &'static str },

    /// Invalid configuration option
    #[error("Configuration error: {0}")]
    Config(String),

    /// SQLite reported an error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database is locked by another connection
    #[error("Database busy: {0}")]
    Busy(String),

    /// Busy failures outlasted the retry policy
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    /// Report serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store was used after close
    #[error("Store closed: {0}")]
    Closed(String),

    /// A writer thread panicked
    #[error("Writer thread panicked: {0}")]
    WorkerPanicked(String),
}

impl BenchError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, BenchError::Busy(_))
    }

    /// Check if error is a validation failure rather than an engine failure
    pub fn is_validation(&self) -> bool {
        matches!(self, BenchError::BadRecord { .. } | BenchError::Config(_))
    }

    /// Map a SQLite error, separating lock contention from everything else
    pub(crate) fn from_sqlite(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                BenchError::Busy(err.to_string())
            }
            _ => BenchError::Sqlite(err),
        }
    }
}
