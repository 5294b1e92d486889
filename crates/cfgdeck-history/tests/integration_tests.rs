//! Integration tests for end-to-end workflows

use std::collections::BTreeMap;

use cfgdeck_history::{
    ApplyDirection, ApplyError, ApplyInstruction, ApplyTarget, ChangeKind, ConfigChange,
    HistoryConfig, HistoryError, HistoryEvent, HistoryManager, StorageManager,
};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Flat key/value store that reports its edits to the history
#[derive(Default)]
struct FlatStore {
    fields: BTreeMap<String, Value>,
}

impl FlatStore {
    fn set(&mut self, history: &mut HistoryManager, key: &str, value: Value) {
        let change = match self.fields.insert(key.to_string(), value.clone()) {
            Some(old) => ConfigChange::modify(key, Some(old), value),
            None => ConfigChange::add(key, value),
        };
        history.observe(change);
    }

    fn remove(&mut self, history: &mut HistoryManager, key: &str) {
        if let Some(old) = self.fields.remove(key) {
            history.observe(ConfigChange::delete(key, old));
        }
    }
}

impl ApplyTarget for FlatStore {
    fn apply(&mut self, instruction: &ApplyInstruction, _: ApplyDirection) -> Result<(), ApplyError> {
        match instruction {
            ApplyInstruction::Modify { target, value: Some(value) }
            | ApplyInstruction::Add { target, value } => {
                self.fields.insert(target.to_string(), value.clone());
            }
            ApplyInstruction::Modify { target, value: None } | ApplyInstruction::Delete { target } => {
                if self.fields.remove(target.as_str()).is_none() {
                    return Err(ApplyError::new(target.clone(), "field does not exist"));
                }
            }
        }
        Ok(())
    }
}

fn persistent_config() -> HistoryConfig {
    HistoryConfig::default()
}

/// Test complete undo/redo workflow (edit → undo → redo)
#[test]
fn test_complete_undo_redo_workflow() {
    let mut history = HistoryManager::in_memory();
    let mut store = FlatStore::default();

    store.set(&mut history, "hero.name", json!("Ayla"));
    store.set(&mut history, "hero.hp", json!(10));
    store.set(&mut history, "hero.hp", json!(14));
    store.remove(&mut history, "hero.name");
    let final_state = store.fields.clone();

    assert_eq!(history.len(), 4);
    assert_eq!(history.undo_many(&mut store, 4).unwrap(), 4);
    assert!(store.fields.is_empty());
    assert_eq!(history.cursor(), -1);

    assert_eq!(history.redo_many(&mut store, 4).unwrap(), 4);
    assert_eq!(store.fields, final_state);
    assert_eq!(history.len(), 4);
}

#[test]
fn test_apply_does_not_record() {
    let mut history = HistoryManager::in_memory();
    let mut store = FlatStore::default();
    store.set(&mut history, "a", json!(1));

    let gate = history.recording_gate();
    let mut echoing = |i: &ApplyInstruction, d: ApplyDirection| -> Result<(), ApplyError> {
        // A store that always notifies would feed the history here
        assert!(!gate.is_open());
        store.apply(i, d)
    };
    history.undo(&mut echoing).unwrap();
    assert_eq!(history.len(), 1);
}

#[test]
fn test_batch_then_checkpoint_navigation() {
    let mut history = HistoryManager::in_memory();
    let mut store = FlatStore::default();

    store.set(&mut history, "stats.str", json!(5));
    let baseline = history.create_checkpoint("Baseline").unwrap();

    history.begin_batch("Level up");
    store.set(&mut history, "stats.str", json!(8));
    store.set(&mut history, "stats.dex", json!(3));
    history.end_batch();

    store.set(&mut history, "stats.int", json!(1));
    assert_eq!(history.len(), 4);

    assert!(history.jump_to_checkpoint(&baseline, &mut store).unwrap());
    assert_eq!(history.cursor(), 1);
    assert_eq!(store.fields.len(), 1);
    assert_eq!(store.fields["stats.str"], json!(5));

    // Redo brings back the batch as a whole
    assert!(history.redo(&mut store).unwrap());
    assert_eq!(store.fields["stats.str"], json!(8));
    assert_eq!(store.fields["stats.dex"], json!(3));
}

#[test]
fn test_cancel_batch_restores_store() {
    let mut history = HistoryManager::in_memory();
    let mut store = FlatStore::default();
    store.set(&mut history, "volume", json!(3));
    let before = store.fields.clone();
    let entries_before = history.entries().to_vec();

    history.begin_batch("Tweak audio");
    store.set(&mut history, "volume", json!(7));
    store.set(&mut history, "muted", json!(false));
    store.remove(&mut history, "volume");

    assert!(history.cancel_batch(&mut store).unwrap());
    assert_eq!(store.fields, before);
    assert_eq!(history.entries(), entries_before.as_slice());
}

#[test]
fn test_failed_undo_is_surfaced() {
    let mut history = HistoryManager::in_memory();
    let mut store = FlatStore::default();
    store.set(&mut history, "x", json!(1));

    // Field vanished behind the history's back
    store.fields.clear();
    let result = history.undo(&mut store);

    assert!(matches!(result, Err(HistoryError::Apply(_))));
    assert_eq!(history.cursor(), 0);
}

#[test]
fn test_persistence_across_sessions() {
    let dir = TempDir::new().unwrap();
    let mut store = FlatStore::default();
    let checkpoint;

    {
        let mut history =
            HistoryManager::open(persistent_config(), Box::new(StorageManager::new(dir.path()))).unwrap();
        store.set(&mut history, "a", json!(1));
        checkpoint = history.create_checkpoint("saved").unwrap();
        store.set(&mut history, "a", json!(2));
        history.undo(&mut store).unwrap();
    }

    let mut history =
        HistoryManager::open(persistent_config(), Box::new(StorageManager::new(dir.path()))).unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history.cursor(), 1);
    assert_eq!(history.get_checkpoints()[0].checkpoint_id, checkpoint);
    assert!(history.redo(&mut store).unwrap());
    assert_eq!(store.fields["a"], json!(2));
}

#[test]
fn test_export_import_between_histories() {
    let mut source = HistoryManager::in_memory();
    let mut store = FlatStore::default();
    store.set(&mut source, "a", json!(1));
    store.set(&mut source, "b", json!(2));
    source.undo(&mut store).unwrap();
    let exported = source.export_to_string().unwrap();

    let mut target = HistoryManager::in_memory();
    let mut events = target.subscribe();
    assert_eq!(target.import_from_str(&exported).unwrap(), 2);
    assert_eq!(target.entries(), source.entries());
    assert_eq!(target.cursor(), 0);
    assert!(matches!(events.try_recv().unwrap(), HistoryEvent::Imported { .. }));
}

#[test]
fn test_import_rejects_foreign_file() {
    let mut history = HistoryManager::in_memory();
    history.observe(ConfigChange::add("kept", json!(true)));

    let foreign = json!({"type": "theme-export", "entries": []}).to_string();
    assert!(matches!(
        history.import_from_str(&foreign),
        Err(HistoryError::MalformedImport(_))
    ));
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_export_import_files() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history-export.json");

    let mut history = HistoryManager::in_memory();
    history.observe(ConfigChange::add("a", json!(1)));
    history.export_to_path(&path).await.unwrap();

    let mut restored = HistoryManager::in_memory();
    assert_eq!(restored.import_from_path(&path).await.unwrap(), 1);
    assert_eq!(restored.cursor(), 0);
}

#[test]
fn test_compact_then_search() {
    let mut history = HistoryManager::in_memory();
    let mut store = FlatStore::default();
    for hp in 1..=5 {
        store.set(&mut history, "hero.hp", json!(hp));
    }
    store.set(&mut history, "hero.name", json!("Ayla"));

    // The first write is an Add, the rest modify within the merge window
    assert_eq!(history.compact(), 3);
    assert_eq!(history.len(), 3);

    let hits = history.search("HERO.HP");
    assert_eq!(hits.len(), 2);
    assert_eq!(history.by_kind(ChangeKind::Modify).len(), 1);
    assert_eq!(history.by_kind(ChangeKind::Add).len(), 2);

    // The merged entry undoes straight back to the first value
    history.undo_many(&mut store, 2).unwrap();
    assert_eq!(store.fields["hero.hp"], json!(1));
}

#[test]
fn test_stats_and_pagination() {
    let mut history = HistoryManager::in_memory();
    for i in 0..10 {
        history.observe(ConfigChange::add(format!("item{}", i).as_str(), json!(i)));
    }
    let stats = history.stats();
    assert_eq!(stats.total_entries, 10);
    assert_eq!(stats.current_index, 9);
    assert_eq!(history.get_history(3, 8).len(), 2);
    assert!(history.get_history(3, 20).is_empty());
}
