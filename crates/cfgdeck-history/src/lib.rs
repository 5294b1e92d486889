#![warn(missing_docs)]

//! Change history for cfgdeck configuration edits
//!
//! Records every edit made to an in-memory configuration as an opaque
//! [`ChangeRecord`] and provides linear undo/redo, named checkpoints,
//! grouped batch edits, compaction of near-duplicate edits, persistence and
//! export/import.
//!
//! The history never mutates configuration data. Undo and redo hand
//! [`ApplyInstruction`]s to an [`ApplyTarget`], which is usually the
//! configuration store the edits came from.

pub mod apply;
mod batch;
pub mod change;
pub mod checkpoint;
pub mod compact;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod persistence;
pub mod search;

// Re-export public API
pub use apply::{ApplyTarget, RecordingGate, RecordingSuspension};
pub use change::{
    ApplyDirection, ApplyInstruction, Change, ChangeKind, ChangeRecord, ConfigChange, ConfigPath,
    Edit,
};
pub use checkpoint::CheckpointView;
pub use compact::compact_entries;
pub use config::HistoryConfig;
pub use error::{ApplyError, HistoryError, HistoryResult};
pub use events::{HistoryEvent, HistoryEventBus, HistoryStats};
pub use history::{HistoryEntry, HistoryManager};
pub use persistence::{
    HistoryExport, HistorySnapshot, HistoryStore, MemoryStore, StorageManager, EXPORT_TYPE,
};
pub use search::HistoryQuery;
