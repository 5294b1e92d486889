//! History notifications
//!
//! The history publishes an event after every mutation of the log. Events
//! travel over a tokio broadcast channel; publishing never blocks and never
//! fails when nobody is listening.
//!
//! # Example
//!
//! ```rust
//! use cfgdeck_history::{HistoryEvent, HistoryManager};
//! use cfgdeck_history::change::ConfigChange;
//! use serde_json::json;
//!
//! let mut history = HistoryManager::in_memory();
//! let mut events = history.subscribe();
//!
//! history.observe(ConfigChange::add("events.intro", json!({"scene": 1})));
//!
//! match events.try_recv().unwrap() {
//!     HistoryEvent::Changed { stats, .. } => assert_eq!(stats.total_entries, 1),
//!     other => panic!("unexpected event {}", other.name()),
//! }
//! ```

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::change::{ChangeKind, ChangeRecord};

/// Channel capacity for broadcast events
const CHANNEL_CAPACITY: usize = 256;

/// Summary of the log attached to every event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    /// Number of entries in the log
    pub total_entries: usize,
    /// Cursor position, -1 when fully undone
    pub current_index: i64,
    /// An entry is available to undo
    pub can_undo: bool,
    /// An entry is available to redo
    pub can_redo: bool,
    /// Number of checkpoint entries
    pub checkpoint_count: usize,
    /// Entry count per kind
    pub kind_breakdown: BTreeMap<ChangeKind, usize>,
}

/// Event published by the history
#[derive(Debug, Clone)]
pub enum HistoryEvent {
    /// A new entry was appended
    Changed {
        /// The appended entry
        record: ChangeRecord,
        /// Log summary after the append
        stats: HistoryStats,
    },
    /// An entry was unwound
    Undo {
        /// The unwound entry
        record: ChangeRecord,
        /// Log summary after the undo
        stats: HistoryStats,
    },
    /// An entry was reapplied
    Redo {
        /// The reapplied entry
        record: ChangeRecord,
        /// Log summary after the redo
        stats: HistoryStats,
    },
    /// The log was emptied
    Cleared {
        /// Log summary after clearing
        stats: HistoryStats,
    },
    /// The log was replaced by an import
    Imported {
        /// Log summary after the import
        stats: HistoryStats,
    },
    /// Adjacent entries were merged
    Compacted {
        /// Entries dropped by the merge
        removed: usize,
        /// Log summary after compaction
        stats: HistoryStats,
    },
}

impl HistoryEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            HistoryEvent::Changed { .. } => "history-changed",
            HistoryEvent::Undo { .. } => "history-undo",
            HistoryEvent::Redo { .. } => "history-redo",
            HistoryEvent::Cleared { .. } => "history-cleared",
            HistoryEvent::Imported { .. } => "history-imported",
            HistoryEvent::Compacted { .. } => "history-compacted",
        }
    }

    /// Stats carried by every event
    pub fn stats(&self) -> &HistoryStats {
        match self {
            HistoryEvent::Changed { stats, .. }
            | HistoryEvent::Undo { stats, .. }
            | HistoryEvent::Redo { stats, .. }
            | HistoryEvent::Cleared { stats }
            | HistoryEvent::Imported { stats }
            | HistoryEvent::Compacted { stats, .. } => stats,
        }
    }

    /// The entry this event concerns, if any
    pub fn record(&self) -> Option<&ChangeRecord> {
        match self {
            HistoryEvent::Changed { record, .. }
            | HistoryEvent::Undo { record, .. }
            | HistoryEvent::Redo { record, .. } => Some(record),
            _ => None,
        }
    }
}

/// Broadcast bus for history events.
///
/// Clones share the same channel.
#[derive(Clone, Debug)]
pub struct HistoryEventBus {
    sender: broadcast::Sender<HistoryEvent>,
}

impl HistoryEventBus {
    /// Create a bus with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: HistoryEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Receive all future events
    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for HistoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}
