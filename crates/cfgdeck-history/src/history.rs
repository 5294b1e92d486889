//! History log and undo/redo navigation

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::apply::{apply_edits, ApplyTarget, RecordingGate};
use crate::batch::BatchContext;
use crate::change::{ApplyDirection, ChangeKind, ChangeRecord, ConfigChange, ConfigPath, Edit};
use crate::config::HistoryConfig;
use crate::error::{HistoryError, HistoryResult};
use crate::events::{HistoryEvent, HistoryEventBus, HistoryStats};
use crate::persistence::{HistoryStore, MemoryStore};

/// An entry of the log annotated with its position
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// The record at this position
    pub record: ChangeRecord,
    /// Position in the log
    pub index: usize,
    /// True when this is the most recently applied entry
    pub is_current: bool,
    /// True when this entry sits in the redo branch
    pub is_undone: bool,
}

/// Linear history of configuration changes with a cursor.
///
/// The log never touches configuration data. Undo and redo hand
/// [`ApplyInstruction`](crate::ApplyInstruction)s to an [`ApplyTarget`] and
/// only move the cursor once the target accepted all of them.
pub struct HistoryManager {
    pub(crate) entries: Vec<ChangeRecord>,
    /// Number of applied entries; the cursor is `applied - 1`
    pub(crate) applied: usize,
    pub(crate) config: HistoryConfig,
    pub(crate) gate: RecordingGate,
    pub(crate) batch: Option<BatchContext>,
    pub(crate) store: Box<dyn HistoryStore>,
    pub(crate) bus: HistoryEventBus,
}

impl HistoryManager {
    /// Create an empty history persisting into `store`
    pub fn new(config: HistoryConfig, store: Box<dyn HistoryStore>) -> HistoryResult<Self> {
        config.validate()?;
        Ok(HistoryManager {
            entries: Vec::new(),
            applied: 0,
            config,
            gate: RecordingGate::new(),
            batch: None,
            store,
            bus: HistoryEventBus::new(),
        })
    }

    /// Create a history and restore whatever `store` holds under the configured key
    pub fn open(config: HistoryConfig, store: Box<dyn HistoryStore>) -> HistoryResult<Self> {
        let mut manager = Self::new(config, store)?;
        manager.load();
        Ok(manager)
    }

    /// An ephemeral history with default settings
    pub fn in_memory() -> Self {
        HistoryManager {
            entries: Vec::new(),
            applied: 0,
            config: HistoryConfig::default(),
            gate: RecordingGate::new(),
            batch: None,
            store: Box::new(MemoryStore::new()),
            bus: HistoryEventBus::new(),
        }
    }

    /// Publish events on `bus` instead of a private one
    pub fn with_event_bus(mut self, bus: HistoryEventBus) -> Self {
        self.bus = bus;
        self
    }

    /// The bus events are published on
    pub fn event_bus(&self) -> &HistoryEventBus {
        &self.bus
    }

    /// Receive all future history events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<HistoryEvent> {
        self.bus.subscribe()
    }

    /// Active configuration
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Handle on the recording flag shared with replay
    pub fn recording_gate(&self) -> RecordingGate {
        self.gate.clone()
    }

    /// True while observed edits are recorded
    pub fn is_recording(&self) -> bool {
        self.gate.is_open()
    }

    /// Enable or disable recording of observed edits
    pub fn set_recording(&mut self, enabled: bool) {
        debug!(enabled, "Recording toggled");
        self.gate.set(enabled);
    }

    /// Listener for configuration store notifications
    pub fn observe(&mut self, change: ConfigChange) -> Option<ChangeRecord> {
        self.record_change(change.edit, change.description)
    }

    /// Record an edit as a new entry.
    ///
    /// Returns `None` when recording is suspended, or when a batch is open
    /// and the edit was buffered into it instead.
    pub fn record_change(&mut self, edit: Edit, description: Option<String>) -> Option<ChangeRecord> {
        if !self.gate.is_open() {
            debug!(target_path = %edit.target(), "Recording suspended, change not recorded");
            return None;
        }

        if let Some(batch) = self.batch.as_mut() {
            debug!(target_path = %edit.target(), "Change buffered into open batch");
            batch.edits.push(edit);
            return None;
        }

        Some(self.append(ChangeRecord::new(edit.into(), description)))
    }

    /// Append a record at the cursor, dropping the redo branch and evicting
    /// the oldest entries beyond capacity
    pub(crate) fn append(&mut self, record: ChangeRecord) -> ChangeRecord {
        if self.applied < self.entries.len() {
            debug!(
                discarded = self.entries.len() - self.applied,
                "Truncating redo branch"
            );
            self.entries.truncate(self.applied);
        }

        self.entries.push(record.clone());
        self.applied = self.entries.len();
        self.evict_overflow();

        debug!(id = %record.id, kind = %record.kind(), index = self.cursor(), "Change recorded");
        self.persist();
        self.bus.publish(HistoryEvent::Changed {
            record: record.clone(),
            stats: self.stats(),
        });
        record
    }

    pub(crate) fn evict_overflow(&mut self) {
        if self.entries.len() <= self.config.capacity {
            return;
        }
        let overflow = self.entries.len() - self.config.capacity;
        self.entries.drain(..overflow);
        self.applied = self.applied.saturating_sub(overflow);
        debug!(evicted = overflow, "Evicted oldest entries");
    }

    /// Revert the current entry.
    ///
    /// Returns `Ok(false)` when there is nothing to undo. If the target
    /// rejects an instruction the cursor stays where it was and the error is
    /// returned.
    pub fn undo(&mut self, target: &mut dyn ApplyTarget) -> HistoryResult<bool> {
        if self.applied == 0 {
            debug!("Nothing to undo");
            return Ok(false);
        }

        let record = self.entries[self.applied - 1].clone();
        self.replay(target, &record, ApplyDirection::Undo)?;
        self.applied -= 1;

        debug!(id = %record.id, index = self.cursor(), "Undo");
        self.persist();
        self.bus.publish(HistoryEvent::Undo {
            record,
            stats: self.stats(),
        });
        Ok(true)
    }

    /// Reapply the entry after the cursor.
    ///
    /// Returns `Ok(false)` when the cursor is at the tail.
    pub fn redo(&mut self, target: &mut dyn ApplyTarget) -> HistoryResult<bool> {
        if self.applied >= self.entries.len() {
            debug!("Nothing to redo");
            return Ok(false);
        }

        let record = self.entries[self.applied].clone();
        self.replay(target, &record, ApplyDirection::Redo)?;
        self.applied += 1;

        debug!(id = %record.id, index = self.cursor(), "Redo");
        self.persist();
        self.bus.publish(HistoryEvent::Redo {
            record,
            stats: self.stats(),
        });
        Ok(true)
    }

    /// Undo up to `steps` entries, returning how many were undone
    pub fn undo_many(&mut self, target: &mut dyn ApplyTarget, steps: usize) -> HistoryResult<usize> {
        let mut done = 0;
        while done < steps && self.undo(target)? {
            done += 1;
        }
        Ok(done)
    }

    /// Redo up to `steps` entries, returning how many were redone
    pub fn redo_many(&mut self, target: &mut dyn ApplyTarget, steps: usize) -> HistoryResult<usize> {
        let mut done = 0;
        while done < steps && self.redo(target)? {
            done += 1;
        }
        Ok(done)
    }

    fn replay(
        &self,
        target: &mut dyn ApplyTarget,
        record: &ChangeRecord,
        direction: ApplyDirection,
    ) -> HistoryResult<()> {
        let _suspended = self.gate.suspend();
        apply_edits(target, &record.change.edits(), direction)?;
        Ok(())
    }

    /// Change the capacity, evicting the oldest entries if the log is now too long
    pub fn set_capacity(&mut self, capacity: usize) -> HistoryResult<()> {
        if capacity == 0 {
            return Err(HistoryError::InvalidCapacity(capacity));
        }
        self.config.capacity = capacity;
        let before = self.entries.len();
        self.evict_overflow();
        if self.entries.len() != before {
            self.persist();
        }
        Ok(())
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        if self.batch.is_some() {
            warn!("Clearing history with an open batch");
        }
        self.entries.clear();
        self.applied = 0;
        info!("History cleared");
        self.persist();
        self.bus.publish(HistoryEvent::Cleared {
            stats: self.stats(),
        });
    }

    /// Cursor position, -1 when fully undone
    pub fn cursor(&self) -> i64 {
        self.applied as i64 - 1
    }

    /// Index of the most recently applied entry
    pub fn current_index(&self) -> Option<usize> {
        self.applied.checked_sub(1)
    }

    /// All entries in chronological order
    pub fn entries(&self) -> &[ChangeRecord] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the log holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        self.applied < self.entries.len()
    }

    /// Summary of the log
    pub fn stats(&self) -> HistoryStats {
        let mut kind_breakdown = BTreeMap::new();
        for record in &self.entries {
            *kind_breakdown.entry(record.kind()).or_insert(0) += 1;
        }

        HistoryStats {
            total_entries: self.entries.len(),
            current_index: self.cursor(),
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            checkpoint_count: kind_breakdown
                .get(&ChangeKind::Checkpoint)
                .copied()
                .unwrap_or(0),
            kind_breakdown,
        }
    }

    pub(crate) fn entry_at(&self, index: usize) -> HistoryEntry {
        HistoryEntry {
            record: self.entries[index].clone(),
            index,
            is_current: self.current_index() == Some(index),
            is_undone: index >= self.applied,
        }
    }

    /// Get paginated history
    pub fn get_history(&self, limit: usize, offset: usize) -> Vec<HistoryEntry> {
        (0..self.entries.len())
            .skip(offset)
            .take(limit)
            .map(|index| self.entry_at(index))
            .collect()
    }

    /// Get details of a specific entry
    pub fn get_entry(&self, id: &str) -> HistoryResult<HistoryEntry> {
        self.entries
            .iter()
            .position(|r| r.id == id)
            .map(|index| self.entry_at(index))
            .ok_or_else(|| HistoryError::change_not_found(id))
    }

    /// All entries touching `target`, including batch children
    pub fn changes_for_target(&self, target: &ConfigPath) -> Vec<HistoryEntry> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, r)| r.change.edits().iter().any(|e| e.target() == target))
            .map(|(index, _)| self.entry_at(index))
            .collect()
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ApplyInstruction;
    use crate::error::ApplyError;
    use serde_json::{json, Value};

    /// Collects every instruction it receives
    #[derive(Default)]
    struct Recorder {
        applied: Vec<(ApplyInstruction, ApplyDirection)>,
    }

    impl ApplyTarget for Recorder {
        fn apply(
            &mut self,
            instruction: &ApplyInstruction,
            direction: ApplyDirection,
        ) -> Result<(), ApplyError> {
            self.applied.push((instruction.clone(), direction));
            Ok(())
        }
    }

    fn modify(target: &str, old: i64, new: i64) -> ConfigChange {
        ConfigChange::modify(target, Some(json!(old)), json!(new))
    }

    fn adopted_value(instruction: &ApplyInstruction) -> Option<Value> {
        match instruction {
            ApplyInstruction::Modify { value, .. } => value.clone(),
            ApplyInstruction::Add { value, .. } => Some(value.clone()),
            ApplyInstruction::Delete { .. } => None,
        }
    }

    #[test]
    fn test_record_change() {
        let mut history = HistoryManager::in_memory();
        let record = history.observe(modify("x", 1, 2)).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.cursor(), 0);
        assert!(history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(record.description, "Modified x");
    }

    #[test]
    fn test_undo_on_empty_log() {
        let mut history = HistoryManager::in_memory();
        let mut store = Recorder::default();
        assert!(!history.undo(&mut store).unwrap());
        assert_eq!(history.cursor(), -1);
        assert!(store.applied.is_empty());
    }

    #[test]
    fn test_redo_at_tail() {
        let mut history = HistoryManager::in_memory();
        let mut store = Recorder::default();
        history.observe(modify("x", 1, 2));
        assert!(!history.redo(&mut store).unwrap());
        assert_eq!(history.cursor(), 0);
    }

    #[test]
    fn test_undo_redo_adopts_values() {
        let mut history = HistoryManager::in_memory();
        let mut store = Recorder::default();
        history.observe(modify("x", 1, 2));

        assert!(history.undo(&mut store).unwrap());
        assert_eq!(history.cursor(), -1);
        assert!(history.redo(&mut store).unwrap());
        assert_eq!(history.cursor(), 0);

        let values: Vec<Option<Value>> = store.applied.iter().map(|(i, _)| adopted_value(i)).collect();
        assert_eq!(values, vec![Some(json!(1)), Some(json!(2))]);
        assert!(store.applied[0].1.is_undo());
        assert!(!store.applied[1].1.is_undo());
    }

    #[test]
    fn test_branch_truncation() {
        let mut history = HistoryManager::in_memory();
        let mut store = Recorder::default();
        for i in 0..5 {
            history.observe(modify("x", i, i + 1));
        }
        history.undo_many(&mut store, 2).unwrap();
        assert_eq!(history.cursor(), 2);

        history.observe(modify("y", 0, 1));
        assert_eq!(history.len(), 4);
        assert_eq!(history.cursor(), 3);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_capacity_eviction() {
        let mut history =
            HistoryManager::new(HistoryConfig::default().with_capacity(2), Box::new(MemoryStore::new()))
                .unwrap();
        let e1 = history.observe(modify("e", 0, 1)).unwrap();
        let e2 = history.observe(modify("e", 1, 2)).unwrap();
        let e3 = history.observe(modify("e", 2, 3)).unwrap();

        assert_eq!(history.entries(), &[e2, e3]);
        assert_eq!(history.cursor(), 1);
        assert!(history.get_entry(&e1.id).is_err());
    }

    #[test]
    fn test_set_capacity_shrinks() {
        let mut history = HistoryManager::in_memory();
        let mut store = Recorder::default();
        for i in 0..5 {
            history.observe(modify("x", i, i + 1));
        }
        history.undo_many(&mut store, 4).unwrap();
        assert_eq!(history.cursor(), 0);

        history.set_capacity(2).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.cursor(), -1);

        assert!(matches!(
            history.set_capacity(0),
            Err(HistoryError::InvalidCapacity(0))
        ));
    }

    #[test]
    fn test_recording_suspended() {
        let mut history = HistoryManager::in_memory();
        history.set_recording(false);
        assert!(history.observe(modify("x", 1, 2)).is_none());
        assert!(history.is_empty());
        history.set_recording(true);
        assert!(history.observe(modify("x", 1, 2)).is_some());
    }

    #[test]
    fn test_recording_suspended_during_apply() {
        let mut history = HistoryManager::in_memory();
        history.observe(modify("x", 1, 2));
        let gate = history.recording_gate();

        let mut seen_open = Vec::new();
        let mut store = |_: &ApplyInstruction, _: ApplyDirection| -> Result<(), ApplyError> {
            seen_open.push(gate.is_open());
            Ok(())
        };
        history.undo(&mut store).unwrap();

        assert_eq!(seen_open, vec![false]);
        assert!(history.is_recording());
    }

    #[test]
    fn test_apply_failure_keeps_cursor() {
        let mut history = HistoryManager::in_memory();
        history.observe(modify("x", 1, 2));

        let mut store = |i: &ApplyInstruction, _: ApplyDirection| -> Result<(), ApplyError> {
            Err(ApplyError::new(i.target().clone(), "read-only"))
        };
        let result = history.undo(&mut store);

        assert!(matches!(result, Err(HistoryError::Apply(_))));
        assert_eq!(history.cursor(), 0);
        assert_eq!(history.len(), 1);
        assert!(history.is_recording());
    }

    #[test]
    fn test_checkpoint_replay_is_noop() {
        let mut history = HistoryManager::in_memory();
        let mut store = Recorder::default();
        history.create_checkpoint("start").unwrap();
        assert!(history.undo(&mut store).unwrap());
        assert!(store.applied.is_empty());
    }

    #[test]
    fn test_stats() {
        let mut history = HistoryManager::in_memory();
        history.observe(modify("x", 1, 2));
        history.observe(ConfigChange::add("y", json!(true)));
        history.create_checkpoint("cp").unwrap();

        let stats = history.stats();
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.current_index, 2);
        assert_eq!(stats.checkpoint_count, 1);
        assert_eq!(stats.kind_breakdown.get(&ChangeKind::Modify), Some(&1));
        assert_eq!(stats.kind_breakdown.get(&ChangeKind::Add), Some(&1));
    }

    #[test]
    fn test_events_published() {
        let mut history = HistoryManager::in_memory();
        let mut events = history.subscribe();
        let mut store = Recorder::default();

        history.observe(modify("x", 1, 2));
        history.undo(&mut store).unwrap();
        history.redo(&mut store).unwrap();
        history.clear();

        let names: Vec<&str> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|e| e.name())
            .collect();
        assert_eq!(
            names,
            vec!["history-changed", "history-undo", "history-redo", "history-cleared"]
        );
    }

    #[test]
    fn test_get_history_pagination() {
        let mut history = HistoryManager::in_memory();
        for i in 0..5 {
            history.observe(modify("x", i, i + 1));
        }

        let page = history.get_history(2, 1);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].index, 1);
        assert!(!page[0].is_current);

        let last = history.get_history(10, 4);
        assert!(last[0].is_current);
    }

    #[test]
    fn test_changes_for_target() {
        let mut history = HistoryManager::in_memory();
        history.observe(modify("a", 0, 1));
        history.observe(modify("b", 0, 1));
        history.begin_batch("two");
        history.observe(modify("a", 1, 2));
        history.observe(modify("c", 1, 2));
        history.end_batch();

        let touching_a = history.changes_for_target(&ConfigPath::from("a"));
        assert_eq!(touching_a.len(), 2);
        assert_eq!(touching_a[1].record.kind(), ChangeKind::Batch);
    }
}
