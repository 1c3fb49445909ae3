/// JSON scripts that drive a history against a scene.
///
/// A script is an array of steps tagged by `op`, for example:
///
/// ```json
/// [
///   {"op": "spawn", "name": "node"},
///   {"op": "begin", "name": "Move Node"},
///   {"op": "do_method", "target": "node", "method": "set_position", "args": [10, 10]},
///   {"op": "undo_method", "target": "node", "method": "set_position", "args": [0, 0]},
///   {"op": "commit"},
///   {"op": "undo"}
/// ]
/// ```
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use undoredo_history::{History, HistoryConfig, MergeMode, ObjectId, Value};

use crate::scene::Scene;

fn default_true() -> bool {
    true
}

/// One scripted step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Creates a scene node addressable by `name`.
    Spawn { name: String },
    /// Destroys a scene node. Operations recorded against it are skipped.
    Free { name: String },
    Begin {
        #[serde(default)]
        name: String,
        #[serde(default)]
        merge: MergeMode,
    },
    DoMethod {
        target: String,
        method: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    UndoMethod {
        target: String,
        method: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    DoProperty {
        target: String,
        property: String,
        value: Value,
    },
    UndoProperty {
        target: String,
        property: String,
        value: Value,
    },
    /// Keeps a copy of the node's current state alive while redoable.
    DoReference { target: String },
    /// Keeps a copy of the node's current state alive while undoable.
    UndoReference { target: String },
    Commit,
    Undo,
    Redo,
    Clear {
        #[serde(default = "default_true")]
        increase_version: bool,
    },
}

/// Parses a script from JSON text.
pub fn parse(json: &str) -> Result<Vec<Step>> {
    serde_json::from_str(json).context("Failed to parse script")
}

/// Reads and parses a script file.
pub fn load(path: &Path) -> Result<Vec<Step>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script at {}", path.display()))?;
    parse(&contents).with_context(|| format!("Invalid script {}", path.display()))
}

/// Executes steps against a history whose sink is a [`Scene`].
#[derive(Debug)]
pub struct Runner {
    history: History<Scene>,
    names: HashMap<String, ObjectId>,
}

impl Runner {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            history: History::with_sink(config, Scene::default()),
            names: HashMap::new(),
        }
    }

    pub fn history(&self) -> &History<Scene> {
        &self.history
    }

    /// Runs a single step, returning the output lines it produced.
    ///
    /// # Errors
    ///
    /// Fails on unknown object names and on history precondition violations.
    pub fn step(&mut self, step: &Step) -> Result<Vec<String>> {
        match step {
            Step::Spawn { name } => {
                if self.names.contains_key(name) {
                    bail!("object {name:?} already exists");
                }
                let id = self.history.sink_mut().spawn(name);
                self.names.insert(name.clone(), id);
                self.history.sink_mut().note(format!("spawn {name} {id}"));
            }
            Step::Free { name } => {
                let id = self.lookup(name)?;
                self.names.remove(name);
                self.history.sink_mut().free(id);
                self.history.sink_mut().note(format!("free {name}"));
            }
            Step::Begin { name, merge } => self.history.begin(name.as_str(), *merge),
            Step::DoMethod {
                target,
                method,
                args,
            } => {
                let id = self.lookup(target)?;
                self.history
                    .append_do(id, method.as_str(), args.iter().cloned())?;
            }
            Step::UndoMethod {
                target,
                method,
                args,
            } => {
                let id = self.lookup(target)?;
                self.history
                    .append_undo(id, method.as_str(), args.iter().cloned())?;
            }
            Step::DoProperty {
                target,
                property,
                value,
            } => {
                let id = self.lookup(target)?;
                self.history
                    .append_do_property(id, property.as_str(), value.clone())?;
            }
            Step::UndoProperty {
                target,
                property,
                value,
            } => {
                let id = self.lookup(target)?;
                self.history
                    .append_undo_property(id, property.as_str(), value.clone())?;
            }
            Step::DoReference { target } => {
                let id = self.lookup(target)?;
                let state = self.node_state(id);
                self.history.hold_do_reference(id, Arc::new(state))?;
            }
            Step::UndoReference { target } => {
                let id = self.lookup(target)?;
                let state = self.node_state(id);
                self.history.hold_undo_reference(id, Arc::new(state))?;
            }
            Step::Commit => self.history.commit()?,
            Step::Undo => {
                if !self.history.undo() {
                    self.history.sink_mut().note("nothing to undo");
                }
            }
            Step::Redo => {
                if !self.history.redo() {
                    self.history.sink_mut().note("nothing to redo");
                }
            }
            Step::Clear { increase_version } => {
                self.history.clear_history(*increase_version);
                self.history.sink_mut().note("clear");
            }
        }
        Ok(self.history.sink_mut().drain_log())
    }

    /// Runs every step in order, collecting their output lines.
    ///
    /// # Errors
    ///
    /// Stops at the first failing step, reporting its position.
    pub fn run(&mut self, steps: &[Step]) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        for (i, step) in steps.iter().enumerate() {
            let out = self
                .step(step)
                .with_context(|| format!("Step {} ({step:?}) failed", i + 1))?;
            lines.extend(out);
        }
        tracing::info!(
            "Ran {} step(s): {} action(s), cursor at {}, version {}",
            steps.len(),
            self.history.action_count(),
            self.history.current_action(),
            self.history.version()
        );
        Ok(lines)
    }

    fn lookup(&self, name: &str) -> Result<ObjectId> {
        self.names
            .get(name)
            .copied()
            .with_context(|| format!("unknown object {name:?}"))
    }

    fn node_state(&self, id: ObjectId) -> crate::scene::Node {
        self.history.sink().node(id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOVE_NODE: &str = r#"[
        {"op": "spawn", "name": "node"},
        {"op": "begin", "name": "Move Node", "merge": "disable"},
        {"op": "do_method", "target": "node", "method": "set_position", "args": [10, 10]},
        {"op": "undo_method", "target": "node", "method": "set_position", "args": [0, 0]},
        {"op": "commit"},
        {"op": "undo"},
        {"op": "redo"},
        {"op": "redo"}
    ]"#;

    #[test]
    fn test_parse_steps() {
        let steps = parse(MOVE_NODE).expect("parse");
        assert_eq!(steps.len(), 8);
        assert_eq!(
            steps[1],
            Step::Begin {
                name: "Move Node".to_string(),
                merge: MergeMode::Disable,
            }
        );
        assert_eq!(steps[4], Step::Commit);
    }

    #[test]
    fn test_begin_defaults() {
        let steps = parse(r#"[{"op": "begin"}, {"op": "clear"}]"#).expect("parse");
        assert_eq!(
            steps[0],
            Step::Begin {
                name: String::new(),
                merge: MergeMode::Disable,
            }
        );
        assert_eq!(
            steps[1],
            Step::Clear {
                increase_version: true
            }
        );
    }

    #[test]
    fn test_unknown_op_rejected() {
        assert!(parse(r#"[{"op": "explode"}]"#).is_err());
    }

    #[test]
    fn test_run_move_node_scenario() {
        let steps = parse(MOVE_NODE).expect("parse");
        let mut runner = Runner::new(HistoryConfig::default());
        let lines = runner.run(&steps).expect("run");

        assert_eq!(
            lines,
            vec![
                "spawn node #0v0",
                "commit \"Move Node\"",
                "call node.set_position(10, 10)",
                "call node.set_position(0, 0)",
                "call node.set_position(10, 10)",
                "nothing to redo",
            ]
        );
        assert!(runner.history().has_undo());
        assert!(!runner.history().has_redo());
    }

    #[test]
    fn test_freed_target_skipped_on_undo() {
        let script = r#"[
            {"op": "spawn", "name": "a"},
            {"op": "spawn", "name": "b"},
            {"op": "begin", "name": "Color"},
            {"op": "do_property", "target": "a", "property": "color", "value": "red"},
            {"op": "do_property", "target": "b", "property": "color", "value": "red"},
            {"op": "undo_property", "target": "a", "property": "color", "value": "white"},
            {"op": "undo_property", "target": "b", "property": "color", "value": "white"},
            {"op": "commit"},
            {"op": "free", "name": "a"},
            {"op": "undo"}
        ]"#;
        let mut runner = Runner::new(HistoryConfig::default());
        let lines = runner.run(&parse(script).expect("parse")).expect("run");

        assert_eq!(lines.last().map(String::as_str), Some("set b.color = \"white\""));
        assert!(!lines.iter().any(|l| l == "set a.color = \"white\""));
        assert_eq!(runner.history().current_action(), 0);
    }

    #[test]
    fn test_merge_script() {
        let script = r#"[
            {"op": "spawn", "name": "n"},
            {"op": "begin", "name": "Drag", "merge": "merge_all"},
            {"op": "do_property", "target": "n", "property": "x", "value": 1},
            {"op": "undo_property", "target": "n", "property": "x", "value": 0},
            {"op": "commit"},
            {"op": "begin", "name": "Drag", "merge": "merge_all"},
            {"op": "do_property", "target": "n", "property": "x", "value": 2},
            {"op": "undo_property", "target": "n", "property": "x", "value": 1},
            {"op": "commit"}
        ]"#;
        let mut runner = Runner::new(HistoryConfig::default());
        runner.run(&parse(script).expect("parse")).expect("run");
        assert_eq!(runner.history().action_count(), 1);
        let snap = runner.history().action(0).expect("action");
        assert_eq!(snap.redo_operations.len(), 2);
        assert_eq!(snap.undo_operations[0].args, vec![Value::Int(1)]);
    }

    #[test]
    fn test_errors_carry_step_position() {
        let script = r#"[{"op": "do_method", "target": "ghost", "method": "m"}]"#;
        let mut runner = Runner::new(HistoryConfig::default());
        let err = runner.run(&parse(script).expect("parse")).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("Step 1"));
        assert!(msg.contains("unknown object \"ghost\""));
    }

    #[test]
    fn test_append_outside_action_is_an_error() {
        let script = r#"[
            {"op": "spawn", "name": "n"},
            {"op": "do_property", "target": "n", "property": "x", "value": 1}
        ]"#;
        let mut runner = Runner::new(HistoryConfig::default());
        let err = runner.run(&parse(script).expect("parse")).unwrap_err();
        assert!(format!("{err:#}").contains("no action is open"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("script.json");
        std::fs::write(&path, MOVE_NODE).expect("write");
        assert_eq!(load(&path).expect("load").len(), 8);
        assert!(load(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_reference_steps_record_operations() {
        let script = r#"[
            {"op": "spawn", "name": "n"},
            {"op": "begin", "name": "Delete"},
            {"op": "undo_reference", "target": "n"},
            {"op": "commit"}
        ]"#;
        let mut runner = Runner::new(HistoryConfig::default());
        let lines = runner.run(&parse(script).expect("parse")).expect("run");
        assert_eq!(lines, vec!["spawn n #0v0", "commit \"Delete\""]);
        let snap = runner.history().action(0).expect("action");
        assert_eq!(snap.undo_operations.len(), 1);
    }
}
