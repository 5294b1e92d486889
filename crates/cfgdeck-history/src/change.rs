//! Change records and the notifications that produce them

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{HistoryError, HistoryResult};

/// Dot-delimited path to a configuration field, e.g. `characters.char1.stats.intelligence`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigPath(String);

impl ConfigPath {
    /// Create a path from its dotted form
    pub fn new(path: impl Into<String>) -> Self {
        ConfigPath(path.into())
    }

    /// The dotted form of the path
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the path segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.').filter(|s| !s.is_empty())
    }

    /// True when the path names nothing
    pub fn is_empty(&self) -> bool {
        self.segments().next().is_none()
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConfigPath {
    fn from(path: &str) -> Self {
        ConfigPath::new(path)
    }
}

impl From<String> for ConfigPath {
    fn from(path: String) -> Self {
        ConfigPath(path)
    }
}

impl AsRef<str> for ConfigPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Kind of a change record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChangeKind {
    /// An existing field was given a new value
    Modify,
    /// A field was created
    Add,
    /// A field was removed
    Delete,
    /// Named marker in the log
    Checkpoint,
    /// Several edits applied as one
    Batch,
}

impl ChangeKind {
    /// Name used on the wire and in search
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Modify => "Modify",
            ChangeKind::Add => "Add",
            ChangeKind::Delete => "Delete",
            ChangeKind::Checkpoint => "Checkpoint",
            ChangeKind::Batch => "Batch",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "modify" => Ok(ChangeKind::Modify),
            "add" => Ok(ChangeKind::Add),
            "delete" => Ok(ChangeKind::Delete),
            "checkpoint" => Ok(ChangeKind::Checkpoint),
            "batch" => Ok(ChangeKind::Batch),
            other => Err(HistoryError::validation_error(format!(
                "unknown change kind '{}'",
                other
            ))),
        }
    }
}

/// Which way a record is being replayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyDirection {
    /// Reverting a change
    Undo,
    /// Reapplying a change
    Redo,
}

impl ApplyDirection {
    /// True when reverting
    pub fn is_undo(&self) -> bool {
        matches!(self, ApplyDirection::Undo)
    }

    /// The opposite direction
    pub fn inverse(&self) -> Self {
        match self {
            ApplyDirection::Undo => ApplyDirection::Redo,
            ApplyDirection::Redo => ApplyDirection::Undo,
        }
    }
}

/// Instruction sent to the configuration store during undo/redo.
///
/// The store adopts the value at `target` without emitting a change
/// notification of its own.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyInstruction {
    /// Write `value` at `target`; `None` leaves the field unset
    Modify {
        /// Field to write
        target: ConfigPath,
        /// Value to adopt
        value: Option<Value>,
    },
    /// Create `target` with `value`
    Add {
        /// Field to create
        target: ConfigPath,
        /// Value to adopt
        value: Value,
    },
    /// Remove `target`
    Delete {
        /// Field to remove
        target: ConfigPath,
    },
}

impl ApplyInstruction {
    /// Path this instruction writes
    pub fn target(&self) -> &ConfigPath {
        match self {
            ApplyInstruction::Modify { target, .. }
            | ApplyInstruction::Add { target, .. }
            | ApplyInstruction::Delete { target } => target,
        }
    }

    /// Kind of write, mirroring the record kinds
    pub fn kind(&self) -> ChangeKind {
        match self {
            ApplyInstruction::Modify { .. } => ChangeKind::Modify,
            ApplyInstruction::Add { .. } => ChangeKind::Add,
            ApplyInstruction::Delete { .. } => ChangeKind::Delete,
        }
    }
}

/// A single reversible edit to one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all_fields = "camelCase")]
pub enum Edit {
    /// A field changed value; `old_value` is absent for a first write
    Modify {
        /// Changed field
        target: ConfigPath,
        /// Value before the edit
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old_value: Option<Value>,
        /// Value after the edit
        new_value: Value,
    },
    /// A field was created
    Add {
        /// Created field
        target: ConfigPath,
        /// Initial value
        new_value: Value,
    },
    /// A field was removed
    Delete {
        /// Removed field
        target: ConfigPath,
        /// Value at removal time
        old_value: Value,
    },
}

impl Edit {
    /// Construct a modify edit
    pub fn modify(target: impl Into<ConfigPath>, old_value: Option<Value>, new_value: Value) -> Self {
        Edit::Modify {
            target: target.into(),
            old_value,
            new_value,
        }
    }

    /// Construct an add edit
    pub fn add(target: impl Into<ConfigPath>, new_value: Value) -> Self {
        Edit::Add {
            target: target.into(),
            new_value,
        }
    }

    /// Construct a delete edit
    pub fn delete(target: impl Into<ConfigPath>, old_value: Value) -> Self {
        Edit::Delete {
            target: target.into(),
            old_value,
        }
    }

    /// The edited path
    pub fn target(&self) -> &ConfigPath {
        match self {
            Edit::Modify { target, .. } | Edit::Add { target, .. } | Edit::Delete { target, .. } => {
                target
            }
        }
    }

    /// Kind of this edit
    pub fn kind(&self) -> ChangeKind {
        match self {
            Edit::Modify { .. } => ChangeKind::Modify,
            Edit::Add { .. } => ChangeKind::Add,
            Edit::Delete { .. } => ChangeKind::Delete,
        }
    }

    /// Value before the edit, if any
    pub fn old_value(&self) -> Option<&Value> {
        match self {
            Edit::Modify { old_value, .. } => old_value.as_ref(),
            Edit::Add { .. } => None,
            Edit::Delete { old_value, .. } => Some(old_value),
        }
    }

    /// Value after the edit, if any
    pub fn new_value(&self) -> Option<&Value> {
        match self {
            Edit::Modify { new_value, .. } | Edit::Add { new_value, .. } => Some(new_value),
            Edit::Delete { .. } => None,
        }
    }

    /// Instruction that moves the store across this edit in `direction`
    pub fn instruction(&self, direction: ApplyDirection) -> ApplyInstruction {
        let target = self.target().clone();
        match (self, direction) {
            (Edit::Modify { old_value, .. }, ApplyDirection::Undo) => ApplyInstruction::Modify {
                target,
                value: old_value.clone(),
            },
            (Edit::Modify { new_value, .. }, ApplyDirection::Redo) => ApplyInstruction::Modify {
                target,
                value: Some(new_value.clone()),
            },
            (Edit::Add { .. }, ApplyDirection::Undo) => ApplyInstruction::Delete { target },
            (Edit::Add { new_value, .. }, ApplyDirection::Redo) => ApplyInstruction::Add {
                target,
                value: new_value.clone(),
            },
            (Edit::Delete { old_value, .. }, ApplyDirection::Undo) => ApplyInstruction::Add {
                target,
                value: old_value.clone(),
            },
            (Edit::Delete { .. }, ApplyDirection::Redo) => ApplyInstruction::Delete { target },
        }
    }

    /// Label used when the caller gives none
    pub fn default_description(&self) -> String {
        match self {
            Edit::Modify { target, .. } => format!("Modified {}", target),
            Edit::Add { target, .. } => format!("Added {}", target),
            Edit::Delete { target, .. } => format!("Deleted {}", target),
        }
    }
}

/// Payload of a change record, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all_fields = "camelCase")]
pub enum Change {
    /// See [`Edit::Modify`]
    Modify {
        /// Changed field
        target: ConfigPath,
        /// Value before the edit
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old_value: Option<Value>,
        /// Value after the edit
        new_value: Value,
    },
    /// See [`Edit::Add`]
    Add {
        /// Created field
        target: ConfigPath,
        /// Initial value
        new_value: Value,
    },
    /// See [`Edit::Delete`]
    Delete {
        /// Removed field
        target: ConfigPath,
        /// Value at removal time
        old_value: Value,
    },
    /// Edits replayed together, forward on redo and in reverse on undo
    Batch {
        /// Edits in the order they were observed
        children: Vec<Edit>,
    },
    /// Marker entry with no reversible payload
    Checkpoint {
        /// Handle used for navigation
        checkpoint_id: String,
    },
}

impl Change {
    /// Kind of this change
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Modify { .. } => ChangeKind::Modify,
            Change::Add { .. } => ChangeKind::Add,
            Change::Delete { .. } => ChangeKind::Delete,
            Change::Batch { .. } => ChangeKind::Batch,
            Change::Checkpoint { .. } => ChangeKind::Checkpoint,
        }
    }

    /// The changed path for single-field changes
    pub fn target(&self) -> Option<&ConfigPath> {
        match self {
            Change::Modify { target, .. }
            | Change::Add { target, .. }
            | Change::Delete { target, .. } => Some(target),
            Change::Batch { .. } | Change::Checkpoint { .. } => None,
        }
    }

    /// The edits this change replays, in forward order
    pub fn edits(&self) -> Vec<Edit> {
        match self {
            Change::Modify {
                target,
                old_value,
                new_value,
            } => vec![Edit::modify(target.clone(), old_value.clone(), new_value.clone())],
            Change::Add { target, new_value } => vec![Edit::add(target.clone(), new_value.clone())],
            Change::Delete { target, old_value } => {
                vec![Edit::delete(target.clone(), old_value.clone())]
            }
            Change::Batch { children } => children.clone(),
            Change::Checkpoint { .. } => Vec::new(),
        }
    }
}

impl From<Edit> for Change {
    fn from(edit: Edit) -> Self {
        match edit {
            Edit::Modify {
                target,
                old_value,
                new_value,
            } => Change::Modify {
                target,
                old_value,
                new_value,
            },
            Edit::Add { target, new_value } => Change::Add { target, new_value },
            Edit::Delete { target, old_value } => Change::Delete { target, old_value },
        }
    }
}

/// Immutable description of one state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Unique, time-ordered identifier
    pub id: String,
    /// When the change was recorded
    pub timestamp: DateTime<Utc>,
    /// Human-readable label
    pub description: String,
    /// What changed
    #[serde(flatten)]
    pub change: Change,
}

impl ChangeRecord {
    /// Create a record with a fresh id and timestamp
    pub fn new(change: Change, description: Option<String>) -> Self {
        let description = description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| Self::default_description(&change));

        ChangeRecord {
            id: Uuid::now_v7().to_string(),
            timestamp: Utc::now(),
            description,
            change,
        }
    }

    fn default_description(change: &Change) -> String {
        match change {
            Change::Batch { children } => format!("Batch of {} changes", children.len()),
            Change::Checkpoint { .. } => "Checkpoint".to_string(),
            _ => change
                .edits()
                .first()
                .map(Edit::default_description)
                .unwrap_or_default(),
        }
    }

    /// Kind of this record
    pub fn kind(&self) -> ChangeKind {
        self.change.kind()
    }

    /// The changed path for single-field records
    pub fn target(&self) -> Option<&ConfigPath> {
        self.change.target()
    }

    /// Checkpoint handle, for checkpoint records
    pub fn checkpoint_id(&self) -> Option<&str> {
        match &self.change {
            Change::Checkpoint { checkpoint_id } => Some(checkpoint_id),
            _ => None,
        }
    }

    /// Check structural consistency of a record read from outside
    pub fn validate(&self) -> HistoryResult<()> {
        if self.id.is_empty() {
            return Err(HistoryError::validation_error("record id cannot be empty"));
        }

        match &self.change {
            Change::Batch { children } => {
                if children.is_empty() {
                    return Err(HistoryError::validation_error(
                        "Batch record must contain at least one edit",
                    ));
                }
                if children.iter().any(|c| c.target().is_empty()) {
                    return Err(HistoryError::validation_error(
                        "Batch edit target cannot be empty",
                    ));
                }
            }
            Change::Checkpoint { checkpoint_id } => {
                if checkpoint_id.is_empty() {
                    return Err(HistoryError::validation_error(
                        "checkpoint id cannot be empty",
                    ));
                }
            }
            other => {
                if other.target().map_or(true, ConfigPath::is_empty) {
                    return Err(HistoryError::validation_error("target cannot be empty"));
                }
            }
        }

        Ok(())
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target() {
            Some(target) => write!(
                f,
                "[{}] {} - {} ({})",
                self.timestamp.format("%Y-%m-%d %H:%M:%S"),
                self.kind(),
                target,
                self.description
            ),
            None => write!(
                f,
                "[{}] {} ({})",
                self.timestamp.format("%Y-%m-%d %H:%M:%S"),
                self.kind(),
                self.description
            ),
        }
    }
}

/// Notification emitted by the configuration store when a field is edited
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigChange {
    /// The edit that happened
    pub edit: Edit,
    /// Optional label for the history entry
    pub description: Option<String>,
}

impl ConfigChange {
    /// Wrap an edit without a description
    pub fn new(edit: Edit) -> Self {
        ConfigChange {
            edit,
            description: None,
        }
    }

    /// A field changed value
    pub fn modify(target: impl Into<ConfigPath>, old_value: Option<Value>, new_value: Value) -> Self {
        Self::new(Edit::modify(target, old_value, new_value))
    }

    /// A field was created
    pub fn add(target: impl Into<ConfigPath>, new_value: Value) -> Self {
        Self::new(Edit::add(target, new_value))
    }

    /// A field was removed
    pub fn delete(target: impl Into<ConfigPath>, old_value: Value) -> Self {
        Self::new(Edit::delete(target, old_value))
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
