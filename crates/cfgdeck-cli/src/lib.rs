// cfgdeck CLI library

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;

pub use cli::{Cli, Commands};
pub use commands::{execute, Workspace};
pub use error::{CliError, CliResult};
pub use output::OutputStyle;
