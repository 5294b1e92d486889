//! Named checkpoints and navigation to them

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::apply::ApplyTarget;
use crate::change::{Change, ChangeRecord};
use crate::error::{HistoryError, HistoryResult};
use crate::history::HistoryManager;

/// A checkpoint entry and where it sits in the log
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointView {
    /// Handle used with [`HistoryManager::jump_to_checkpoint`]
    pub checkpoint_id: String,
    /// Id of the log entry
    pub record_id: String,
    /// Checkpoint label
    pub description: String,
    /// When the checkpoint was created
    pub timestamp: DateTime<Utc>,
    /// Position in the log
    pub index: usize,
    /// True when the cursor sits on this checkpoint
    pub is_current: bool,
}

impl HistoryManager {
    /// Record a checkpoint entry and return its id.
    ///
    /// Checkpoints take part in the linear log like any other entry but
    /// replay as no-ops.
    pub fn create_checkpoint(&mut self, description: impl Into<String>) -> HistoryResult<String> {
        if self.batch.is_some() {
            return Err(HistoryError::BatchInProgress(
                "cannot create a checkpoint while a batch is open".to_string(),
            ));
        }

        let checkpoint_id = Uuid::new_v4().to_string();
        let record = ChangeRecord::new(
            Change::Checkpoint {
                checkpoint_id: checkpoint_id.clone(),
            },
            Some(description.into()),
        );
        let record = self.append(record);
        info!(%checkpoint_id, description = %record.description, "Checkpoint created");
        Ok(checkpoint_id)
    }

    /// Position of the checkpoint entry, if present
    pub fn find_checkpoint(&self, checkpoint_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|r| r.checkpoint_id() == Some(checkpoint_id))
    }

    /// Undo or redo until the cursor sits on the checkpoint.
    ///
    /// Returns `Ok(false)` if the checkpoint is unknown or a step could not
    /// be taken; a store failure is returned as an error with the cursor left
    /// at the last position reached.
    pub fn jump_to_checkpoint(
        &mut self,
        checkpoint_id: &str,
        target: &mut dyn ApplyTarget,
    ) -> HistoryResult<bool> {
        let Some(index) = self.find_checkpoint(checkpoint_id) else {
            warn!(%checkpoint_id, "Checkpoint not found");
            return Ok(false);
        };

        let wanted = index + 1;
        let mut steps = 0usize;
        while self.applied > wanted {
            if !self.undo(target)? {
                warn!(%checkpoint_id, steps, "Checkpoint jump stopped early");
                return Ok(false);
            }
            steps += 1;
        }
        while self.applied < wanted {
            if !self.redo(target)? {
                warn!(%checkpoint_id, steps, "Checkpoint jump stopped early");
                return Ok(false);
            }
            steps += 1;
        }

        debug!(%checkpoint_id, index, steps, "Jumped to checkpoint");
        Ok(true)
    }

    /// All checkpoints in log order
    pub fn get_checkpoints(&self) -> Vec<CheckpointView> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                record.checkpoint_id().map(|checkpoint_id| CheckpointView {
                    checkpoint_id: checkpoint_id.to_string(),
                    record_id: record.id.clone(),
                    description: record.description.clone(),
                    timestamp: record.timestamp,
                    index,
                    is_current: self.current_index() == Some(index),
                })
            })
            .collect()
    }
}
