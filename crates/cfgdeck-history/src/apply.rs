//! Delivery of undo/redo instructions to the configuration store

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::change::{ApplyDirection, ApplyInstruction, Edit};
use crate::error::ApplyError;

/// Receiver of apply instructions, implemented by the configuration store.
///
/// Implementations adopt the value at the instruction's target and must not
/// report the write back to the history as a new change.
pub trait ApplyTarget {
    /// Adopt one instruction
    fn apply(
        &mut self,
        instruction: &ApplyInstruction,
        direction: ApplyDirection,
    ) -> Result<(), ApplyError>;
}

impl<F> ApplyTarget for F
where
    F: FnMut(&ApplyInstruction, ApplyDirection) -> Result<(), ApplyError>,
{
    fn apply(
        &mut self,
        instruction: &ApplyInstruction,
        direction: ApplyDirection,
    ) -> Result<(), ApplyError> {
        self(instruction, direction)
    }
}

/// Shared flag deciding whether observed edits are recorded.
///
/// Clones share the same flag, so a store can check whether the history is
/// currently replaying.
#[derive(Debug, Clone)]
pub struct RecordingGate {
    enabled: Arc<AtomicBool>,
}

impl RecordingGate {
    /// Create an open gate
    pub fn new() -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    /// True while edits are being recorded
    pub fn is_open(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Open or close the gate
    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Close the gate until the returned guard is dropped
    pub fn suspend(&self) -> RecordingSuspension {
        let previous = self.enabled.swap(false, Ordering::SeqCst);
        RecordingSuspension {
            enabled: Arc::clone(&self.enabled),
            previous,
        }
    }
}

impl Default for RecordingGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Restores the gate to its previous state when dropped
#[must_use = "recording resumes as soon as the suspension is dropped"]
#[derive(Debug)]
pub struct RecordingSuspension {
    enabled: Arc<AtomicBool>,
    previous: bool,
}

impl Drop for RecordingSuspension {
    fn drop(&mut self) {
        self.enabled.store(self.previous, Ordering::SeqCst);
    }
}

/// Replay `edits` against `target` in `direction`.
///
/// Undo walks the edits in reverse, redo walks them forward. If an edit is
/// rejected, the edits already applied in this call are walked back before
/// the error is returned.
pub(crate) fn apply_edits(
    target: &mut dyn ApplyTarget,
    edits: &[Edit],
    direction: ApplyDirection,
) -> Result<(), ApplyError> {
    let ordered: Vec<&Edit> = match direction {
        ApplyDirection::Undo => edits.iter().rev().collect(),
        ApplyDirection::Redo => edits.iter().collect(),
    };

    for (done, edit) in ordered.iter().enumerate() {
        let instruction = edit.instruction(direction);
        debug!(target_path = %instruction.target(), kind = %instruction.kind(), undo = direction.is_undo(), "Applying change");

        if let Err(err) = target.apply(&instruction, direction) {
            warn!(error = %err, applied = done, "Apply rejected, compensating");
            let back = direction.inverse();
            for applied in ordered[..done].iter().rev() {
                if let Err(comp) = target.apply(&applied.instruction(back), back) {
                    warn!(error = %comp, "Compensation failed");
                }
            }
            return Err(err);
        }
    }

    Ok(())
}
