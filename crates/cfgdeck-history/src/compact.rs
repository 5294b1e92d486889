//! Lossy merging of adjacent edits to the same field

use tracing::{debug, info};

use crate::change::{Change, ChangeRecord};
use crate::events::HistoryEvent;
use crate::history::HistoryManager;

/// Merge `next` into `kept` if both modify the same field within `window_ms`
fn try_merge(kept: &mut ChangeRecord, next: &ChangeRecord, window_ms: u64) -> bool {
    let (
        Change::Modify {
            target: kept_target,
            new_value: kept_new,
            ..
        },
        Change::Modify {
            target: next_target,
            new_value: next_new,
            ..
        },
    ) = (&mut kept.change, &next.change)
    else {
        return false;
    };

    if kept_target != next_target {
        return false;
    }

    let gap_ms = (next.timestamp - kept.timestamp).num_milliseconds().unsigned_abs();
    if gap_ms >= window_ms {
        return false;
    }

    *kept_new = next_new.clone();
    kept.timestamp = next.timestamp;
    true
}

/// Merge runs of same-target modifications closer than `window_ms`.
///
/// Returns the compacted entries and how many were dropped. The surviving
/// entry keeps its original value and adopts the last merged new value.
pub fn compact_entries(entries: Vec<ChangeRecord>, window_ms: u64) -> (Vec<ChangeRecord>, usize) {
    let before = entries.len();
    let mut compacted: Vec<ChangeRecord> = Vec::with_capacity(before);

    for record in entries {
        if let Some(kept) = compacted.last_mut() {
            if try_merge(kept, &record, window_ms) {
                debug!(merged = %record.id, into = %kept.id, "Merged adjacent modification");
                continue;
            }
        }
        compacted.push(record);
    }

    let removed = before - compacted.len();
    (compacted, removed)
}

impl HistoryManager {
    /// Merge adjacent modifications of the same field recorded within the
    /// configured merge window. Returns the number of entries removed.
    ///
    /// This drops intermediate states from the log for good.
    pub fn compact(&mut self) -> usize {
        let entries = std::mem::take(&mut self.entries);
        let (entries, removed) = compact_entries(entries, self.config.merge_window_ms);
        self.entries = entries;
        self.applied = self.applied.min(self.entries.len());

        info!(removed, remaining = self.entries.len(), "History compacted");
        if removed > 0 {
            self.persist();
        }
        self.bus.publish(HistoryEvent::Compacted {
            removed,
            stats: self.stats(),
        });
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ConfigChange, Edit};
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    fn at(ms: i64, edit: Edit) -> ChangeRecord {
        let mut record = ChangeRecord::new(edit.into(), None);
        record.timestamp = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap() + Duration::milliseconds(ms);
        record
    }

    #[test]
    fn test_close_modifications_merge() {
        let entries = vec![
            at(0, Edit::modify("x", Some(json!(1)), json!(2))),
            at(1000, Edit::modify("x", Some(json!(2)), json!(3))),
        ];
        let (compacted, removed) = compact_entries(entries.clone(), 5000);

        assert_eq!(removed, 1);
        assert_eq!(compacted.len(), 1);
        assert_eq!(compacted[0].id, entries[0].id);
        assert_eq!(
            compacted[0].change,
            Change::Modify {
                target: "x".into(),
                old_value: Some(json!(1)),
                new_value: json!(3),
            }
        );
        assert_eq!(compacted[0].timestamp, entries[1].timestamp);
    }

    #[test]
    fn test_distant_modifications_stay() {
        let entries = vec![
            at(0, Edit::modify("x", Some(json!(1)), json!(2))),
            at(6000, Edit::modify("x", Some(json!(2)), json!(3))),
        ];
        let (compacted, removed) = compact_entries(entries.clone(), 5000);
        assert_eq!(removed, 0);
        assert_eq!(compacted, entries);
    }

    #[test]
    fn test_gap_equal_to_window_does_not_merge() {
        let entries = vec![
            at(0, Edit::modify("x", Some(json!(1)), json!(2))),
            at(5000, Edit::modify("x", Some(json!(2)), json!(3))),
        ];
        assert_eq!(compact_entries(entries, 5000).1, 0);
    }

    #[test]
    fn test_add_and_delete_never_merge() {
        let entries = vec![
            at(0, Edit::add("x", json!(1))),
            at(10, Edit::modify("x", Some(json!(1)), json!(2))),
            at(20, Edit::delete("x", json!(2))),
            at(30, Edit::add("x", json!(3))),
        ];
        let (compacted, removed) = compact_entries(entries, 5000);
        assert_eq!(removed, 0);
        assert_eq!(compacted.len(), 4);
    }

    #[test]
    fn test_different_targets_do_not_merge() {
        let entries = vec![
            at(0, Edit::modify("x", Some(json!(1)), json!(2))),
            at(10, Edit::modify("y", Some(json!(1)), json!(2))),
        ];
        assert_eq!(compact_entries(entries, 5000).1, 0);
    }

    #[test]
    fn test_chain_merges_into_first() {
        let entries = vec![
            at(0, Edit::modify("x", Some(json!(0)), json!(1))),
            at(3000, Edit::modify("x", Some(json!(1)), json!(2))),
            at(6000, Edit::modify("x", Some(json!(2)), json!(3))),
        ];
        let (compacted, removed) = compact_entries(entries, 5000);
        assert_eq!(removed, 2);
        assert_eq!(
            compacted[0].change,
            Change::Modify {
                target: "x".into(),
                old_value: Some(json!(0)),
                new_value: json!(3),
            }
        );
    }

    #[test]
    fn test_compact_clamps_cursor_and_publishes() {
        let mut history = HistoryManager::in_memory();
        history.observe(ConfigChange::modify("x", Some(json!(1)), json!(2)));
        history.observe(ConfigChange::modify("x", Some(json!(2)), json!(3)));
        history.observe(ConfigChange::modify("x", Some(json!(3)), json!(4)));
        assert_eq!(history.cursor(), 2);

        let mut events = history.subscribe();
        assert_eq!(history.compact(), 2);
        assert_eq!(history.len(), 1);
        assert_eq!(history.cursor(), 0);

        match events.try_recv().unwrap() {
            HistoryEvent::Compacted { removed, stats } => {
                assert_eq!(removed, 2);
                assert_eq!(stats.total_entries, 1);
            }
            other => panic!("unexpected event {}", other.name()),
        }
    }

    #[test]
    fn test_compact_keeps_checkpoints_apart() {
        let mut history = HistoryManager::in_memory();
        history.observe(ConfigChange::modify("x", Some(json!(1)), json!(2)));
        history.create_checkpoint("between").unwrap();
        history.observe(ConfigChange::modify("x", Some(json!(2)), json!(3)));
        assert_eq!(history.compact(), 0);
        assert_eq!(history.len(), 3);
    }
}
