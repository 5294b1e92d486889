// CLI error types

use cfgdeck_history::HistoryError;
use cfgdeck_store::StoreError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CliError {
    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            CliError::InvalidArgument { message } => {
                format!("Invalid argument: {}\n\nRun 'cfgdeck --help' for usage information.", message)
            }
            CliError::NotFound(what) => {
                format!("Not found: {}", what)
            }
            CliError::Io(e) => {
                format!("File operation failed: {}", e)
            }
            CliError::Store(StoreError::NotFound(path)) => {
                format!("No value at '{}'.\n\nRun 'cfgdeck get' to see the whole document.", path)
            }
            CliError::Store(e) => {
                format!("Document error: {}", e)
            }
            CliError::History(HistoryError::Apply(e)) => {
                format!(
                    "Could not apply history to the document: {}\n\nThe document was probably edited outside cfgdeck. Run 'cfgdeck log' to inspect the history.",
                    e
                )
            }
            CliError::History(HistoryError::MalformedImport(msg)) => {
                format!("Malformed history file: {}\n\nOnly files written by 'cfgdeck export' can be imported.", msg)
            }
            CliError::History(HistoryError::Config(e)) => {
                format!("Configuration error: {}\n\nCheck the file passed with --config and CFGDECK_HISTORY_* variables.", e)
            }
            CliError::History(e) => {
                format!("History error: {}", e)
            }
            CliError::Internal(msg) => {
                format!("Internal error: {}\n\nPlease report this issue.", msg)
            }
        }
    }

    /// Get technical details for verbose mode
    pub fn technical_details(&self) -> String {
        format!("{:?}", self)
    }
}

pub type CliResult<T> = Result<T, CliError>;
