// Command line definition

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// cfgdeck - edit game configuration documents with full undo history
#[derive(Parser, Debug)]
#[command(name = "cfgdeck")]
#[command(bin_name = "cfgdeck")]
#[command(about = "Edit game configuration documents with undo, redo and checkpoints")]
#[command(
    long_about = "cfgdeck edits a JSON configuration document through dot paths and records every edit.\n\nEdits can be undone and redone across invocations, grouped under named checkpoints,\nsearched, compacted and exported.\n\nExamples:\n  • cfgdeck set characters.char1.stats.intelligence 12\n  • cfgdeck checkpoint \"Before balancing\"\n  • cfgdeck undo -n 3\n  • cfgdeck log --limit 20"
)]
#[command(version)]
#[command(author = "cfgdeck Contributors")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration document to edit
    #[arg(long, global = true, value_name = "FILE", default_value = "cfgdeck.json")]
    pub doc: PathBuf,

    /// Directory holding the persisted history
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// History settings file (TOML, YAML or JSON)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimize output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Write a value
    #[command(about = "Write a value at a dot path; the value is parsed as JSON, or taken as a string")]
    Set {
        /// Dot path, e.g. characters.char1.name
        #[arg(value_name = "PATH")]
        path: String,

        /// New value
        #[arg(value_name = "VALUE")]
        value: String,
    },

    /// Remove a value
    #[command(about = "Remove the value at a dot path")]
    Delete {
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Print a value
    #[command(about = "Print the value at a dot path, or the whole document")]
    Get {
        #[arg(value_name = "PATH", default_value = "")]
        path: String,
    },

    /// Undo recent edits
    #[command(about = "Undo the most recent edits")]
    Undo {
        /// Number of steps
        #[arg(short = 'n', long, default_value_t = 1)]
        steps: usize,
    },

    /// Redo undone edits
    #[command(about = "Redo previously undone edits")]
    Redo {
        /// Number of steps
        #[arg(short = 'n', long, default_value_t = 1)]
        steps: usize,
    },

    /// Record a checkpoint
    #[command(about = "Record a named checkpoint at the current position")]
    Checkpoint {
        #[arg(value_name = "DESCRIPTION")]
        description: String,
    },

    /// List checkpoints
    #[command(about = "List all checkpoints")]
    Checkpoints,

    /// Jump to a checkpoint
    #[command(about = "Undo or redo until the document matches a checkpoint")]
    Jump {
        /// Checkpoint id or a unique prefix of it
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Merge near-duplicate edits
    #[command(about = "Merge consecutive edits of the same field made within the merge window")]
    Compact,

    /// Show the history
    #[command(about = "Show the history log")]
    Log {
        /// Maximum number of entries
        #[arg(long, default_value_t = 50)]
        limit: usize,

        /// Entries to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Search the history
    #[command(about = "Search history entries by description, path or kind")]
    Search {
        #[arg(value_name = "QUERY")]
        query: String,

        /// Only entries of this kind (modify, add, delete, checkpoint, batch)
        #[arg(long)]
        kind: Option<String>,
    },

    /// Show history statistics
    #[command(about = "Show history statistics")]
    Stats,

    /// Export the history
    #[command(about = "Write the history to an export file")]
    Export {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Import a history
    #[command(about = "Replace the history with an export file")]
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Drop the history
    #[command(about = "Drop every history entry; the document is left as is")]
    Clear,
}

impl Commands {
    /// True for commands that can change the document
    pub fn writes_document(&self) -> bool {
        matches!(
            self,
            Commands::Set { .. }
                | Commands::Delete { .. }
                | Commands::Undo { .. }
                | Commands::Redo { .. }
                | Commands::Jump { .. }
        )
    }
}
