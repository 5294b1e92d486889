//! Store error types

use cfgdeck_history::HistoryError;
use thiserror::Error;

/// Store result type
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the configuration store and editing sessions
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("No value at {0}")]
    NotFound(String),

    #[error("Value already exists at {0}")]
    AlreadyExists(String),

    #[error("Cannot descend into a scalar at {0}")]
    NotAnObject(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    History(#[from] HistoryError),
}
