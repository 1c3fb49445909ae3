//! Property tests for the history's cursor, merge and replay invariants.

use proptest::prelude::*;
use undoredo_history::{
    History, HistoryConfig, MergeMode, Notification, ObjectId, RecordingSink, Value,
};

/// One recorded operation: (is_property, method/property index, argument).
type OpPlan = (bool, u8, i64);

fn op_plan() -> impl Strategy<Value = OpPlan> {
    (any::<bool>(), 0u8..4, -100i64..100)
}

fn action_plan() -> impl Strategy<Value = (Vec<OpPlan>, Vec<OpPlan>)> {
    (
        prop::collection::vec(op_plan(), 0..6),
        prop::collection::vec(op_plan(), 0..6),
    )
}

fn target() -> ObjectId {
    ObjectId::from_raw_parts(0, 0)
}

fn record(
    history: &mut History<RecordingSink>,
    name: &str,
    mode: MergeMode,
    plan: &(Vec<OpPlan>, Vec<OpPlan>),
) {
    history.begin(name, mode);
    for &(is_prop, idx, arg) in &plan.0 {
        if is_prop {
            history
                .append_do_property(target(), format!("p{idx}"), arg)
                .unwrap();
        } else {
            history
                .append_do(target(), format!("m{idx}"), [Value::Int(arg)])
                .unwrap();
        }
    }
    for &(is_prop, idx, arg) in &plan.1 {
        if is_prop {
            history
                .append_undo_property(target(), format!("p{idx}"), arg)
                .unwrap();
        } else {
            history
                .append_undo(target(), format!("m{idx}"), [Value::Int(arg)])
                .unwrap();
        }
    }
    history.commit().unwrap();
}

fn new_history() -> History<RecordingSink> {
    History::with_sink(HistoryConfig::default(), RecordingSink::new())
}

proptest! {
    #[test]
    fn commits_without_merge_count_exactly(plans in prop::collection::vec(action_plan(), 0..20)) {
        let mut history = new_history();
        for (i, plan) in plans.iter().enumerate() {
            record(&mut history, &format!("A{}", i % 2), MergeMode::Disable, plan);
        }
        prop_assert_eq!(history.action_count(), plans.len());
        prop_assert_eq!(history.current_action(), plans.len());
        prop_assert_eq!(history.version(), plans.len() as u64);
        prop_assert!(!history.has_redo());
    }

    #[test]
    fn undo_then_redo_reproduces_commit_replay(plan in action_plan()) {
        let mut history = new_history();
        record(&mut history, "Edit", MergeMode::Disable, &plan);
        let committed = history.sink().replayed();
        prop_assert_eq!(committed.len(), plan.0.len());

        history.sink_mut().take();
        prop_assert!(history.undo());
        history.sink_mut().take();
        prop_assert!(history.redo());
        prop_assert_eq!(history.sink().replayed(), committed);
    }

    #[test]
    fn merge_all_concatenates_do_and_reverses_undo(first in action_plan(), second in action_plan()) {
        let mut history = new_history();
        record(&mut history, "Drag", MergeMode::MergeAll, &first);
        let first_snap = history.action(0).unwrap();
        record(&mut history, "Drag", MergeMode::MergeAll, &second);
        prop_assert_eq!(history.action_count(), 1);

        let mut separate = new_history();
        record(&mut separate, "Drag", MergeMode::Disable, &second);
        let second_snap = separate.action(0).unwrap();

        let merged = history.action(0).unwrap();
        let mut expected_do = first_snap.redo_operations.clone();
        expected_do.extend(second_snap.redo_operations.clone());
        let mut expected_undo = second_snap.undo_operations.clone();
        expected_undo.extend(first_snap.undo_operations.clone());
        prop_assert_eq!(merged.redo_operations, expected_do);
        prop_assert_eq!(merged.undo_operations, expected_undo);
    }

    #[test]
    fn new_commit_after_undos_truncates_redo_branch(
        count in 1usize..10,
        undos in 1usize..10,
    ) {
        let undos = undos.min(count);
        let mut history = new_history();
        let empty = (Vec::new(), Vec::new());
        for i in 0..count {
            record(&mut history, &format!("A{i}"), MergeMode::Disable, &empty);
        }
        for _ in 0..undos {
            prop_assert!(history.undo());
        }
        prop_assert!(history.has_redo());

        record(&mut history, "Branch", MergeMode::Disable, &empty);
        prop_assert!(!history.has_redo());
        prop_assert_eq!(history.action_count(), count - undos + 1);
        prop_assert_eq!(history.current_action_name(), "Branch");
    }

    #[test]
    fn undo_replays_recorded_undos_newest_first(plan in action_plan()) {
        let mut history = new_history();
        record(&mut history, "Edit", MergeMode::Disable, &plan);
        history.sink_mut().take();
        history.undo();

        let replayed = history.sink().replayed();
        prop_assert_eq!(replayed.len(), plan.1.len());
        for (event, &(is_prop, idx, arg)) in replayed.iter().zip(plan.1.iter().rev()) {
            let expected = if is_prop {
                Notification::Property { target: target(), name: format!("p{idx}"), value: Value::Int(arg) }
            } else {
                Notification::Method { target: target(), name: format!("m{idx}"), args: vec![Value::Int(arg)] }
            };
            prop_assert_eq!(event, &expected);
        }
    }
}
