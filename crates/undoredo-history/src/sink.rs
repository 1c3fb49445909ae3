/// Notification contract between the history and the object layer it drives.
///
/// The history only records requests; a [`HistorySink`] is what actually
/// performs them. Every hook runs synchronously on the caller's thread.
use std::collections::HashSet;

use crate::target::ObjectId;
use crate::value::Value;

/// Receives replayed operations and commit notifications.
///
/// All methods have no-op defaults so a sink only implements what it needs.
pub trait HistorySink {
    /// Whether `target` still exists. Operations on dead targets are skipped.
    fn is_alive(&self, target: ObjectId) -> bool {
        let _ = target;
        true
    }

    /// Fired once per outermost commit, before its operations are replayed.
    ///
    /// Every method or property notification until the matching
    /// [`commit_finished`](Self::commit_finished) belongs to the commit replay,
    /// so side effects that would begin another action must be deferred.
    fn action_committed(&mut self, name: &str) {
        let _ = name;
    }

    /// Fired once the commit replay announced by `action_committed` is done.
    fn commit_finished(&mut self, name: &str) {
        let _ = name;
    }

    /// Fired for each replayed method operation.
    fn method_called(&mut self, target: ObjectId, method: &str, args: &[Value]) {
        let _ = (target, method, args);
    }

    /// Fired for each replayed property operation.
    fn property_set(&mut self, target: ObjectId, property: &str, value: &Value) {
        let _ = (target, property, value);
    }
}

/// Sink that ignores everything and treats every target as alive.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl HistorySink for NullSink {}

/// One notification observed by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Committed(String),
    Method {
        target: ObjectId,
        name: String,
        args: Vec<Value>,
    },
    Property {
        target: ObjectId,
        name: String,
        value: Value,
    },
}

/// Sink that records every notification in order.
///
/// Targets are alive unless explicitly marked dead with [`kill`](Self::kill).
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Vec<Notification>,
    dead: HashSet<ObjectId>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `target` as destroyed.
    pub fn kill(&mut self, target: ObjectId) {
        self.dead.insert(target);
    }

    /// Everything recorded so far.
    pub fn events(&self) -> &[Notification] {
        &self.events
    }

    /// Returns and clears the recorded notifications.
    pub fn take(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.events)
    }

    /// Recorded notifications other than commit markers.
    pub fn replayed(&self) -> Vec<Notification> {
        self.events
            .iter()
            .filter(|n| !matches!(n, Notification::Committed(_)))
            .cloned()
            .collect()
    }
}

impl HistorySink for RecordingSink {
    fn is_alive(&self, target: ObjectId) -> bool {
        !self.dead.contains(&target)
    }

    fn action_committed(&mut self, name: &str) {
        self.events.push(Notification::Committed(name.to_string()));
    }

    fn method_called(&mut self, target: ObjectId, method: &str, args: &[Value]) {
        self.events.push(Notification::Method {
            target,
            name: method.to_string(),
            args: args.to_vec(),
        });
    }

    fn property_set(&mut self, target: ObjectId, property: &str, value: &Value) {
        self.events.push(Notification::Property {
            target,
            name: property.to_string(),
            value: value.clone(),
        });
    }
}
