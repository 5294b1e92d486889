//! Persistence of the history log and export/import files

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::change::ChangeRecord;
use crate::error::{HistoryError, HistoryResult};
use crate::events::HistoryEvent;
use crate::history::HistoryManager;

/// `type` tag of an export file
pub const EXPORT_TYPE: &str = "config-history";

/// Blob storage the history is persisted into
pub trait HistoryStore: Send {
    /// Read the blob stored under `key`, `None` when absent
    fn read(&self, key: &str) -> HistoryResult<Option<String>>;

    /// Store `blob` under `key`, replacing any previous value
    fn write(&self, key: &str, blob: &str) -> HistoryResult<()>;

    /// Remove the blob stored under `key`
    fn remove(&self, key: &str) -> HistoryResult<()>;
}

/// File-backed store keeping one JSON file per key
#[derive(Debug, Clone)]
pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Store blobs under `base_dir`, created on first write
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Directory holding the blobs
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// File a key is stored in
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", key))
    }
}

impl HistoryStore for StorageManager {
    fn read(&self, key: &str) -> HistoryResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, blob: &str) -> HistoryResult<()> {
        fs::create_dir_all(&self.base_dir)?;
        fs::write(self.path_for(key), blob)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> HistoryResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store; clones share the same blobs
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> HistoryResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.blobs
            .lock()
            .map_err(|_| HistoryError::storage_error("memory store lock poisoned"))
    }
}

impl HistoryStore for MemoryStore {
    fn read(&self, key: &str) -> HistoryResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn write(&self, key: &str, blob: &str) -> HistoryResult<()> {
        self.lock()?.insert(key.to_string(), blob.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> HistoryResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Persisted form of the log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    /// Entries in chronological order
    pub entries: Vec<ChangeRecord>,
    /// Cursor position, -1 when fully undone
    pub cursor: i64,
    /// When the snapshot was written
    pub saved_at: DateTime<Utc>,
}

/// Export file layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryExport {
    /// Always [`EXPORT_TYPE`]
    #[serde(rename = "type")]
    pub export_type: String,
    /// When the export was produced
    pub timestamp: DateTime<Utc>,
    /// Entries in chronological order
    pub entries: Vec<ChangeRecord>,
    /// Cursor position, -1 when fully undone
    pub cursor: i64,
}

/// Convert a wire cursor into an applied-entry count within `len`
fn applied_from_cursor(cursor: i64, len: usize) -> usize {
    if cursor < 0 {
        0
    } else {
        (cursor as u64).saturating_add(1).min(len as u64) as usize
    }
}

impl HistoryManager {
    pub(crate) fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            entries: self.entries.clone(),
            cursor: self.cursor(),
            saved_at: Utc::now(),
        }
    }

    /// Write the log to storage, returning any failure
    pub fn try_save(&self) -> HistoryResult<()> {
        let blob = serde_json::to_string(&self.snapshot())?;
        self.store.write(&self.config.storage_key, &blob)?;
        debug!(key = %self.config.storage_key, entries = self.entries.len(), "History saved");
        Ok(())
    }

    /// Write the log to storage; failures are logged and the in-memory log
    /// stays authoritative
    pub fn save(&self) {
        if let Err(e) = self.try_save() {
            warn!(error = %e, key = %self.config.storage_key, "Failed to persist history");
        }
    }

    pub(crate) fn persist(&self) {
        if self.config.persist {
            self.save();
        }
    }

    /// Restore the log from storage.
    ///
    /// Missing or unreadable data resets to an empty log. A cursor outside
    /// the log is clamped, and entries beyond the configured capacity are
    /// dropped oldest first.
    pub fn load(&mut self) {
        let blob = match self.store.read(&self.config.storage_key) {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                debug!(key = %self.config.storage_key, "No persisted history");
                self.reset();
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read persisted history");
                self.reset();
                return;
            }
        };

        match serde_json::from_str::<HistorySnapshot>(&blob) {
            Ok(snapshot) => {
                self.applied = applied_from_cursor(snapshot.cursor, snapshot.entries.len());
                self.entries = snapshot.entries;
                self.evict_overflow();
                info!(
                    entries = self.entries.len(),
                    cursor = self.cursor(),
                    "History restored"
                );
            }
            Err(e) => {
                warn!(error = %e, "Persisted history is corrupt, starting empty");
                self.reset();
            }
        }
    }

    fn reset(&mut self) {
        self.entries.clear();
        self.applied = 0;
    }

    /// Serialize the log as an export file
    pub fn export_to_string(&self) -> HistoryResult<String> {
        let export = HistoryExport {
            export_type: EXPORT_TYPE.to_string(),
            timestamp: Utc::now(),
            entries: self.entries.clone(),
            cursor: self.cursor(),
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }

    /// Write an export file to `path`
    pub async fn export_to_path(&self, path: impl AsRef<Path>) -> HistoryResult<()> {
        let blob = self.export_to_string()?;
        tokio::fs::write(path.as_ref(), blob).await?;
        info!(path = ?path.as_ref(), entries = self.entries.len(), "History exported");
        Ok(())
    }

    /// Replace the log with the contents of an export file.
    ///
    /// The log is left untouched unless the whole file validates. Returns
    /// the number of entries kept after trimming to capacity.
    pub fn import_from_str(&mut self, raw: &str) -> HistoryResult<usize> {
        self.ensure_no_batch("import")?;

        let (entries, applied) = parse_export(raw)?;
        self.entries = entries;
        self.applied = applied;
        self.evict_overflow();
        let count = self.entries.len();

        info!(entries = count, cursor = self.cursor(), "History imported");
        self.persist();
        self.bus.publish(HistoryEvent::Imported {
            stats: self.stats(),
        });
        Ok(count)
    }

    /// Read an export file from disk and import it
    pub async fn import_from_path(&mut self, path: impl AsRef<Path>) -> HistoryResult<usize> {
        self.ensure_no_batch("import")?;
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        self.import_from_str(&raw)
    }

    fn ensure_no_batch(&self, operation: &str) -> HistoryResult<()> {
        if self.batch.is_some() {
            return Err(HistoryError::BatchInProgress(format!(
                "cannot {} while a batch is open",
                operation
            )));
        }
        Ok(())
    }
}

/// Validate an export file, returning its entries and applied count
fn parse_export(raw: &str) -> HistoryResult<(Vec<ChangeRecord>, usize)> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| HistoryError::malformed(format!("not valid JSON: {}", e)))?;

    match value.get("type").and_then(Value::as_str) {
        Some(EXPORT_TYPE) => {}
        Some(other) => {
            return Err(HistoryError::malformed(format!(
                "expected type '{}', found '{}'",
                EXPORT_TYPE, other
            )))
        }
        None => {
            return Err(HistoryError::malformed(format!(
                "missing type '{}'",
                EXPORT_TYPE
            )))
        }
    }

    let entries = value
        .get("entries")
        .cloned()
        .ok_or_else(|| HistoryError::malformed("missing entries"))?;
    let entries: Vec<ChangeRecord> = serde_json::from_value(entries)
        .map_err(|e| HistoryError::malformed(format!("invalid entries: {}", e)))?;

    for (index, record) in entries.iter().enumerate() {
        record
            .validate()
            .map_err(|e| HistoryError::malformed(format!("entry {}: {}", index, e)))?;
    }

    let applied = match value.get("cursor").and_then(Value::as_i64) {
        Some(cursor) => applied_from_cursor(cursor, entries.len()),
        None => entries.len(),
    };

    Ok((entries, applied))
}
