//! Grouping several edits into one undoable entry

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::apply::{apply_edits, ApplyTarget};
use crate::change::{ApplyDirection, Change, ChangeRecord, Edit};
use crate::error::{HistoryError, HistoryResult};
use crate::history::HistoryManager;

/// State of an open batch
#[derive(Debug, Clone)]
pub(crate) struct BatchContext {
    pub(crate) description: String,
    /// Applied-entry count when the batch opened
    pub(crate) start_applied: usize,
    pub(crate) edits: Vec<Edit>,
    pub(crate) opened_at: DateTime<Utc>,
}

impl HistoryManager {
    /// Open a batch; edits observed until [`end_batch`](Self::end_batch) are
    /// collected instead of recorded one by one.
    ///
    /// Returns `false` if a batch is already open.
    pub fn begin_batch(&mut self, description: impl Into<String>) -> bool {
        if let Some(open) = &self.batch {
            warn!(open = %open.description, "Batch already open");
            return false;
        }

        let description = description.into();
        debug!(%description, cursor = self.cursor(), "Batch opened");
        self.batch = Some(BatchContext {
            description,
            start_applied: self.applied,
            edits: Vec::new(),
            opened_at: Utc::now(),
        });
        true
    }

    /// True while a batch is open
    pub fn is_batch_open(&self) -> bool {
        self.batch.is_some()
    }

    /// Number of edits collected by the open batch
    pub fn pending_batch_len(&self) -> usize {
        self.batch.as_ref().map_or(0, |b| b.edits.len())
    }

    /// Close the batch and record its edits as a single entry.
    ///
    /// Returns `None` when no batch is open or the batch collected nothing.
    pub fn end_batch(&mut self) -> Option<ChangeRecord> {
        let Some(batch) = self.batch.take() else {
            warn!("end_batch called without an open batch");
            return None;
        };

        if batch.edits.is_empty() {
            debug!(description = %batch.description, "Empty batch discarded");
            return None;
        }

        let elapsed_ms = (Utc::now() - batch.opened_at).num_milliseconds();
        info!(
            description = %batch.description,
            edits = batch.edits.len(),
            elapsed_ms,
            "Batch committed"
        );
        let record = ChangeRecord::new(
            Change::Batch {
                children: batch.edits,
            },
            Some(batch.description),
        );
        Some(self.append(record))
    }

    /// Close the batch and roll back everything done since it opened.
    ///
    /// Collected edits are reverted through `target`, then the log is undone
    /// until the cursor is back where it was at [`begin_batch`](Self::begin_batch).
    /// Returns `Ok(false)` when no batch is open; a rollback that stops
    /// partway is reported as [`HistoryError::CancelIncomplete`]. If the
    /// collected edits cannot be reverted the batch stays open, so it can be
    /// cancelled again or committed with `end_batch`.
    pub fn cancel_batch(&mut self, target: &mut dyn ApplyTarget) -> HistoryResult<bool> {
        let Some(batch) = self.batch.take() else {
            warn!("cancel_batch called without an open batch");
            return Ok(false);
        };

        let remaining = self.applied.saturating_sub(batch.start_applied);
        let reverted = {
            let _suspended = self.gate.suspend();
            apply_edits(target, &batch.edits, ApplyDirection::Undo)
        };
        if let Err(e) = reverted {
            warn!(description = %batch.description, "Batch left open after failed rollback");
            self.batch = Some(batch);
            return Err(HistoryError::CancelIncomplete {
                remaining,
                source: Box::new(e.into()),
            });
        }

        while self.applied > batch.start_applied {
            let remaining = self.applied - batch.start_applied;
            match self.undo(target) {
                Ok(true) => {}
                Ok(false) => {
                    return Err(HistoryError::CancelIncomplete {
                        remaining,
                        source: Box::new(HistoryError::validation_error("nothing left to undo")),
                    })
                }
                Err(e) => {
                    return Err(HistoryError::CancelIncomplete {
                        remaining,
                        source: Box::new(e),
                    })
                }
            }
        }

        info!(
            description = %batch.description,
            reverted = batch.edits.len(),
            "Batch cancelled"
        );
        Ok(true)
    }
}
