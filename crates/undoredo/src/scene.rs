/// In-memory scene driven by the history.
///
/// The scene owns its nodes in an `ObjectRegistry` and acts as the history's
/// sink: property operations are applied to the node, method operations are
/// logged, and every notification becomes one output line.
use std::collections::BTreeMap;

use undoredo_history::{HistorySink, ObjectId, ObjectRegistry, Value};

/// A scene node: a display name and its properties.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: String,
    pub props: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
pub struct Scene {
    nodes: ObjectRegistry<Node>,
    log: Vec<String>,
}

impl Scene {
    pub fn spawn(&mut self, name: &str) -> ObjectId {
        self.nodes.insert(Node {
            name: name.to_string(),
            props: BTreeMap::new(),
        })
    }

    pub fn free(&mut self, id: ObjectId) -> Option<Node> {
        self.nodes.remove(id)
    }

    pub fn node(&self, id: ObjectId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Appends a line to the output log.
    pub fn note(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    /// Returns and clears the output log.
    pub fn drain_log(&mut self) -> Vec<String> {
        std::mem::take(&mut self.log)
    }

    fn label(&self, id: ObjectId) -> String {
        self.nodes
            .get(id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

impl HistorySink for Scene {
    fn is_alive(&self, target: ObjectId) -> bool {
        self.nodes.contains(target)
    }

    fn action_committed(&mut self, name: &str) {
        self.note(format!("commit {name:?}"));
    }

    fn method_called(&mut self, target: ObjectId, method: &str, args: &[Value]) {
        let args: Vec<String> = args.iter().map(Value::to_string).collect();
        let line = format!("call {}.{method}({})", self.label(target), args.join(", "));
        self.note(line);
    }

    fn property_set(&mut self, target: ObjectId, property: &str, value: &Value) {
        let line = format!("set {}.{property} = {value}", self.label(target));
        if let Some(node) = self.nodes.get_mut(target) {
            node.props.insert(property.to_string(), value.clone());
        }
        self.note(line);
    }
}
