// Command handlers

use std::path::PathBuf;

use cfgdeck_history::{ChangeKind, HistoryConfig, HistoryManager, HistoryQuery, StorageManager};
use cfgdeck_store::{ConfigStore, EditorSession, StoreError};
use serde_json::Value;
use tracing::{debug, info};

use crate::cli::{Cli, Commands};
use crate::error::{CliError, CliResult};
use crate::output::OutputStyle;

/// Files a command operates on
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Configuration document
    pub doc: PathBuf,
    /// Directory the history is persisted in
    pub state_dir: PathBuf,
    /// History settings
    pub config: HistoryConfig,
}

impl Workspace {
    /// Resolve paths and settings from the command line
    pub fn resolve(cli: &Cli) -> CliResult<Self> {
        let state_dir = match &cli.state_dir {
            Some(dir) => dir.clone(),
            None => Self::default_state_dir()?,
        };
        let config = HistoryConfig::load(cli.config.as_deref())?;

        debug!(doc = ?cli.doc, state_dir = ?state_dir, capacity = config.capacity, "Workspace resolved");
        Ok(Self {
            doc: cli.doc.clone(),
            state_dir,
            config,
        })
    }

    /// Get the default state directory
    fn default_state_dir() -> CliResult<PathBuf> {
        dirs::data_dir()
            .map(|dir| dir.join("cfgdeck"))
            .ok_or_else(|| CliError::Internal("Could not determine data directory".to_string()))
    }

    /// Open the document together with its persisted history
    pub fn open_session(&self) -> CliResult<EditorSession> {
        let store = ConfigStore::open(&self.doc)?;
        let history = HistoryManager::open(
            self.config.clone(),
            Box::new(StorageManager::new(&self.state_dir)),
        )?;
        Ok(EditorSession::new(store, history))
    }
}

/// Run a parsed command and return what should be printed
pub async fn execute(cli: &Cli, style: &OutputStyle) -> CliResult<String> {
    let workspace = Workspace::resolve(cli)?;
    let mut session = workspace.open_session()?;

    let result = run(&cli.command, &mut session, style).await;

    // Steps taken before a failure already moved the history
    if cli.command.writes_document() {
        session.store().save(&workspace.doc)?;
    }
    result
}

async fn run(command: &Commands, session: &mut EditorSession, style: &OutputStyle) -> CliResult<String> {
    match command {
        Commands::Set { path, value } => {
            let value = parse_value(value);
            let rendered = value.to_string();
            session.set(path.as_str(), value)?;
            Ok(style.success(&format!("{} = {}", style.code(path), rendered)))
        }
        Commands::Delete { path } => {
            session.remove(path.as_str())?;
            Ok(style.success(&format!("Deleted {}", style.code(path))))
        }
        Commands::Get { path } => {
            let value = session
                .get(path.as_str())
                .ok_or_else(|| StoreError::NotFound(path.clone()))?;
            serde_json::to_string_pretty(value).map_err(|e| CliError::Internal(e.to_string()))
        }
        Commands::Undo { steps } => {
            let done = session.undo_many(*steps)?;
            Ok(step_report(style, "Undid", "Nothing to undo", done, session.history()))
        }
        Commands::Redo { steps } => {
            let done = session.redo_many(*steps)?;
            Ok(step_report(style, "Redid", "Nothing to redo", done, session.history()))
        }
        Commands::Checkpoint { description } => {
            let id = session.create_checkpoint(description.as_str())?;
            Ok(style.success(&format!("Checkpoint {} created", style.code(&id))))
        }
        Commands::Checkpoints => {
            let checkpoints = session.history().get_checkpoints();
            if checkpoints.is_empty() {
                return Ok(style.info("No checkpoints"));
            }
            Ok(checkpoints
                .iter()
                .map(|cp| style.checkpoint(cp))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        Commands::Jump { id } => {
            let checkpoint_id = resolve_checkpoint(session.history(), id)?;
            if session.jump_to_checkpoint(&checkpoint_id)? {
                Ok(style.success(&format!("At checkpoint {}", style.code(&checkpoint_id))))
            } else {
                Ok(style.warning(&format!("Could not reach checkpoint {}", checkpoint_id)))
            }
        }
        Commands::Compact => {
            let removed = session.compact();
            if removed == 0 {
                Ok(style.info("Nothing to compact"))
            } else {
                Ok(style.success(&format!("Merged {} entr{}", removed, plural_y(removed))))
            }
        }
        Commands::Log { limit, offset } => {
            let entries = session.history().get_history(*limit, *offset);
            if entries.is_empty() {
                return Ok(style.info("History is empty"));
            }
            Ok(entries
                .iter()
                .map(|e| style.history_entry(e))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        Commands::Search { query, kind } => {
            let mut filter = HistoryQuery::new().with_text(query.as_str());
            if let Some(kind) = kind {
                filter = filter.with_kind(kind.parse::<ChangeKind>()?);
            }
            let hits = session.history().query(&filter);
            if hits.is_empty() {
                return Ok(style.info(&format!("No entries match '{}'", query)));
            }
            Ok(hits
                .iter()
                .map(|e| style.history_entry(e))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        Commands::Stats => Ok(style.stats(&session.history().stats())),
        Commands::Export { file } => {
            session.history().export_to_path(file).await?;
            Ok(style.success(&format!(
                "Exported {} entr{} to {}",
                session.history().len(),
                plural_y(session.history().len()),
                file.display()
            )))
        }
        Commands::Import { file } => {
            let count = session.history_mut().import_from_path(file).await?;
            info!(count, file = ?file, "History imported from file");
            Ok(style.success(&format!("Imported {} entr{}", count, plural_y(count))))
        }
        Commands::Clear => {
            session.history_mut().clear();
            Ok(style.success("History cleared"))
        }
    }
}

/// Parse a command line value as JSON, falling back to a plain string
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Find the checkpoint whose id is `id` or starts with it
fn resolve_checkpoint(history: &HistoryManager, id: &str) -> CliResult<String> {
    let matches: Vec<String> = history
        .get_checkpoints()
        .into_iter()
        .map(|cp| cp.checkpoint_id)
        .filter(|cid| cid.starts_with(id))
        .collect();

    match matches.as_slice() {
        [] => Err(CliError::NotFound(format!("checkpoint '{}'", id))),
        [single] => Ok(single.clone()),
        _ if matches.iter().any(|cid| cid == id) => Ok(id.to_string()),
        _ => Err(CliError::InvalidArgument {
            message: format!("checkpoint prefix '{}' matches {} checkpoints", id, matches.len()),
        }),
    }
}

fn step_report(style: &OutputStyle, verb: &str, nothing: &str, done: usize, history: &HistoryManager) -> String {
    if done == 0 {
        return style.warning(nothing);
    }
    style.success(&format!(
        "{} {} change{} (position {} of {})",
        verb,
        done,
        if done == 1 { "" } else { "s" },
        history.cursor() + 1,
        history.len()
    ))
}

fn plural_y(count: usize) -> &'static str {
    if count == 1 {
        "y"
    } else {
        "ies"
    }
}
