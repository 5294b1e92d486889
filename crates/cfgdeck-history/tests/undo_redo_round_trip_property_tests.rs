//! Property-based tests for undo/redo round trip
//!
//! For any sequence of edits applied to a store, undoing everything restores
//! the initial store and redoing everything restores the final store.

use std::collections::BTreeMap;

use cfgdeck_history::{
    ApplyDirection, ApplyError, ApplyInstruction, ConfigChange, HistoryConfig, HistoryManager,
    MemoryStore,
};
use proptest::prelude::*;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
enum Op {
    Set(String, i64),
    Remove(String),
    Checkpoint,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => ("[a-d]", any::<i64>()).prop_map(|(key, value)| Op::Set(key, value)),
        2 => "[a-d]".prop_map(Op::Remove),
        1 => Just(Op::Checkpoint),
    ]
}

type Fields = BTreeMap<String, Value>;

fn run(history: &mut HistoryManager, fields: &mut Fields, ops: &[Op]) {
    for op in ops {
        match op {
            Op::Set(key, value) => {
                let value = json!(value);
                let change = match fields.insert(key.clone(), value.clone()) {
                    Some(old) => ConfigChange::modify(key.as_str(), Some(old), value),
                    None => ConfigChange::add(key.as_str(), value),
                };
                history.observe(change);
            }
            Op::Remove(key) => {
                if let Some(old) = fields.remove(key) {
                    history.observe(ConfigChange::delete(key.as_str(), old));
                }
            }
            Op::Checkpoint => {
                history.create_checkpoint("cp").unwrap();
            }
        }
    }
}

fn apply(fields: &mut Fields, instruction: &ApplyInstruction) -> Result<(), ApplyError> {
    match instruction {
        ApplyInstruction::Modify { target, value: Some(value) } | ApplyInstruction::Add { target, value } => {
            fields.insert(target.to_string(), value.clone());
        }
        ApplyInstruction::Modify { target, value: None } | ApplyInstruction::Delete { target } => {
            fields.remove(target.as_str());
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_undo_all_then_redo_all_restores_store(ops in prop::collection::vec(arb_op(), 1..40)) {
        let mut history = HistoryManager::in_memory();
        let mut fields = Fields::new();
        run(&mut history, &mut fields, &ops);
        let final_state = fields.clone();
        let n = history.len();

        {
            let mut target = |i: &ApplyInstruction, _: ApplyDirection| apply(&mut fields, i);
            prop_assert_eq!(history.undo_many(&mut target, n).unwrap(), n);
        }
        prop_assert!(fields.is_empty());
        prop_assert_eq!(history.cursor(), -1);

        {
            let mut target = |i: &ApplyInstruction, _: ApplyDirection| apply(&mut fields, i);
            prop_assert_eq!(history.redo_many(&mut target, n).unwrap(), n);
        }
        prop_assert_eq!(fields, final_state);
        prop_assert_eq!(history.cursor(), n as i64 - 1);
    }

    #[test]
    fn prop_batched_ops_undo_in_one_step(
        before in prop::collection::vec(arb_op(), 0..10),
        batched in prop::collection::vec(arb_op().prop_filter("no checkpoints", |op| !matches!(op, Op::Checkpoint)), 1..10),
    ) {
        let mut history = HistoryManager::in_memory();
        let mut fields = Fields::new();
        run(&mut history, &mut fields, &before);
        let snapshot = fields.clone();
        let len_before = history.len();

        history.begin_batch("grouped");
        run(&mut history, &mut fields, &batched);
        let committed = history.end_batch().is_some();
        prop_assert_eq!(history.len(), len_before + usize::from(committed));

        if committed {
            let mut target = |i: &ApplyInstruction, _: ApplyDirection| apply(&mut fields, i);
            prop_assert!(history.undo(&mut target).unwrap());
        }
        prop_assert_eq!(fields, snapshot);
    }

    #[test]
    fn prop_cursor_always_in_bounds(
        capacity in 1usize..8,
        ops in prop::collection::vec(arb_op(), 0..30),
        undo_steps in 0usize..10,
    ) {
        let mut history = HistoryManager::new(
            HistoryConfig::default().with_capacity(capacity),
            Box::new(MemoryStore::new()),
        ).unwrap();
        let mut fields = Fields::new();
        run(&mut history, &mut fields, &ops);

        let mut target = |_: &ApplyInstruction, _: ApplyDirection| -> Result<(), ApplyError> { Ok(()) };
        history.undo_many(&mut target, undo_steps).unwrap();

        prop_assert!(history.len() <= capacity);
        prop_assert!(history.cursor() >= -1);
        prop_assert!(history.cursor() < history.len() as i64);
    }
}
