//! Error types for the change history engine

use thiserror::Error;

use crate::change::ConfigPath;

/// Result type for history operations
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Raised by a configuration store that could not adopt a value
#[derive(Debug, Clone, PartialEq, Error)]
#[error("failed to apply change at {target}: {reason}")]
pub struct ApplyError {
    /// Path the store was asked to write
    pub target: ConfigPath,
    /// Why the store refused
    pub reason: String,
}

impl ApplyError {
    /// Create a new apply error for a target
    pub fn new(target: impl Into<ConfigPath>, reason: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur in the history engine
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The configuration store rejected an undo/redo instruction
    #[error(transparent)]
    Apply(#[from] ApplyError),

    /// Imported data is not a history export
    #[error("Malformed history file: {0}")]
    MalformedImport(String),

    /// Operation is not allowed while a batch is open
    #[error("A batch is in progress: {0}")]
    BatchInProgress(String),

    /// Batch cancellation stopped before the log was fully rolled back
    #[error("Batch cancellation incomplete, {remaining} change(s) still applied: {source}")]
    CancelIncomplete {
        /// Entries still past the position captured at batch start
        remaining: usize,
        /// The failure that stopped the rollback
        #[source]
        source: Box<HistoryError>,
    },

    /// Capacity must be at least one entry
    #[error("Invalid capacity: {0} (must be at least 1)")]
    InvalidCapacity(usize),

    /// Change not found in history
    #[error("Change not found: {0}")]
    ChangeNotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Storage error
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl HistoryError {
    /// Create a new ChangeNotFound error with context
    pub fn change_not_found(id: impl Into<String>) -> Self {
        Self::ChangeNotFound(id.into())
    }

    /// Create a new MalformedImport error with context
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedImport(msg.into())
    }

    /// Create a new StorageError with context
    pub fn storage_error(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    /// Create a new ValidationError with context
    pub fn validation_error(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }
}
