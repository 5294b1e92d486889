//! An editing session wiring a document to its history

use cfgdeck_history::{ChangeRecord, ConfigChange, ConfigPath, HistoryError, HistoryManager};
use serde_json::Value;
use tracing::debug;

use crate::document::ConfigStore;
use crate::error::{StoreError, StoreResult};

/// A configuration document together with the history of its edits.
///
/// User edits go through the session so they are recorded; undo and redo
/// write back into the same document.
pub struct EditorSession {
    store: ConfigStore,
    history: HistoryManager,
}

impl EditorSession {
    /// Pair a document with a history
    pub fn new(store: ConfigStore, history: HistoryManager) -> Self {
        Self { store, history }
    }

    /// An empty document with an ephemeral history
    pub fn in_memory() -> Self {
        Self::new(ConfigStore::new(), HistoryManager::in_memory())
    }

    /// The document
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// The history
    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    /// Mutable access to the history for queries and settings
    pub fn history_mut(&mut self) -> &mut HistoryManager {
        &mut self.history
    }

    /// Split the session back into its parts
    pub fn into_parts(self) -> (ConfigStore, HistoryManager) {
        (self.store, self.history)
    }

    /// Value at `path`
    pub fn get(&self, path: impl Into<ConfigPath>) -> Option<&Value> {
        self.store.get(path)
    }

    /// Write a value and record the edit
    pub fn set(&mut self, path: impl Into<ConfigPath>, value: Value) -> StoreResult<Option<ChangeRecord>> {
        let change = self.store.set(path, value)?;
        Ok(self.record(change))
    }

    /// Create a field and record the edit
    pub fn insert(&mut self, path: impl Into<ConfigPath>, value: Value) -> StoreResult<Option<ChangeRecord>> {
        let change = self.store.insert(path, value)?;
        Ok(self.record(change))
    }

    /// Remove a field and record the edit
    pub fn remove(&mut self, path: impl Into<ConfigPath>) -> StoreResult<Option<ChangeRecord>> {
        let change = self.store.remove(path)?;
        Ok(self.record(change))
    }

    fn record(&mut self, change: ConfigChange) -> Option<ChangeRecord> {
        debug!(target_path = %change.edit.target(), "Store edit observed");
        self.history.observe(change)
    }

    /// Undo the current entry
    pub fn undo(&mut self) -> StoreResult<bool> {
        Ok(self.history.undo(&mut self.store)?)
    }

    /// Redo the next entry
    pub fn redo(&mut self) -> StoreResult<bool> {
        Ok(self.history.redo(&mut self.store)?)
    }

    /// Undo up to `steps` entries
    pub fn undo_many(&mut self, steps: usize) -> StoreResult<usize> {
        Ok(self.history.undo_many(&mut self.store, steps)?)
    }

    /// Redo up to `steps` entries
    pub fn redo_many(&mut self, steps: usize) -> StoreResult<usize> {
        Ok(self.history.redo_many(&mut self.store, steps)?)
    }

    /// Record a checkpoint at the current position
    pub fn create_checkpoint(&mut self, description: impl Into<String>) -> StoreResult<String> {
        Ok(self.history.create_checkpoint(description)?)
    }

    /// Move the document to the state recorded at a checkpoint
    pub fn jump_to_checkpoint(&mut self, checkpoint_id: &str) -> StoreResult<bool> {
        Ok(self.history.jump_to_checkpoint(checkpoint_id, &mut self.store)?)
    }

    /// See [`HistoryManager::begin_batch`]
    pub fn begin_batch(&mut self, description: impl Into<String>) -> bool {
        self.history.begin_batch(description)
    }

    /// See [`HistoryManager::end_batch`]
    pub fn end_batch(&mut self) -> Option<ChangeRecord> {
        self.history.end_batch()
    }

    /// Roll the document back to where the open batch started
    pub fn cancel_batch(&mut self) -> StoreResult<bool> {
        Ok(self.history.cancel_batch(&mut self.store)?)
    }

    /// Run `edit` as one batch; an error cancels everything it did.
    ///
    /// ```rust
    /// use cfgdeck_store::EditorSession;
    /// use serde_json::json;
    ///
    /// let mut session = EditorSession::in_memory();
    /// session
    ///     .batch("Create hero", |s| {
    ///         s.set("hero.name", json!("Ayla"))?;
    ///         s.set("hero.hp", json!(10))?;
    ///         Ok(())
    ///     })
    ///     .unwrap();
    ///
    /// assert_eq!(session.history().len(), 1);
    /// session.undo().unwrap();
    /// assert!(session.get("hero.name").is_none());
    /// ```
    pub fn batch<T>(
        &mut self,
        description: impl Into<String>,
        edit: impl FnOnce(&mut Self) -> StoreResult<T>,
    ) -> StoreResult<T> {
        if !self.history.begin_batch(description) {
            return Err(StoreError::History(HistoryError::BatchInProgress(
                "batches cannot be nested".to_string(),
            )));
        }

        match edit(self) {
            Ok(value) => {
                self.history.end_batch();
                Ok(value)
            }
            Err(e) => {
                self.history.cancel_batch(&mut self.store)?;
                Err(e)
            }
        }
    }

    /// Merge near-duplicate edits in the history
    pub fn compact(&mut self) -> usize {
        self.history.compact()
    }
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::in_memory()
    }
}
