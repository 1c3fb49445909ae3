/// Core types for recorded operations and the actions that group them.
use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;

use serde::Serialize;

use crate::target::ObjectId;
use crate::value::{Args, Value};

/// Strong reference kept alive for as long as the owning action exists.
pub type HeldRef = Arc<dyn Any + Send + Sync>;

/// Discriminant of an [`Operation`], used in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Method,
    Property,
    Reference,
}

/// One recorded request against a target object.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Invoke `name` on `target` with positional `args`.
    Method {
        target: ObjectId,
        name: String,
        args: Args,
    },
    /// Assign `value` to the property `name` on `target`.
    Property {
        target: ObjectId,
        name: String,
        value: Value,
    },
    /// Keep `held` alive for the lifetime of the action. Never replayed.
    Reference { target: ObjectId, held: HeldRef },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Method { .. } => OperationKind::Method,
            Operation::Property { .. } => OperationKind::Property,
            Operation::Reference { .. } => OperationKind::Reference,
        }
    }

    /// The object this operation addresses.
    pub fn target(&self) -> ObjectId {
        match self {
            Operation::Method { target, .. }
            | Operation::Property { target, .. }
            | Operation::Reference { target, .. } => *target,
        }
    }

    /// Method or property name. Empty for references.
    pub fn name(&self) -> &str {
        match self {
            Operation::Method { name, .. } | Operation::Property { name, .. } => name,
            Operation::Reference { .. } => "",
        }
    }

    /// Read-only projection for diagnostics and external tooling.
    pub fn snapshot(&self) -> OperationSnapshot {
        let args = match self {
            Operation::Method { args, .. } => args.to_vec(),
            Operation::Property { value, .. } => vec![value.clone()],
            Operation::Reference { .. } => Vec::new(),
        };
        OperationSnapshot {
            kind: self.kind(),
            target: self.target(),
            name: self.name().to_string(),
            args,
        }
    }
}

/// A named, timestamped pair of operation lists that undo/redo as one step.
#[derive(Debug, Clone)]
pub struct Action {
    name: String,
    /// Forward replay order.
    do_ops: Vec<Operation>,
    /// Backward replay order: the most recently recorded undo runs first.
    undo_ops: VecDeque<Operation>,
    timestamp_ms: u64,
}

impl Action {
    pub fn new(name: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            name: name.into(),
            do_ops: Vec::new(),
            undo_ops: VecDeque::new(),
            timestamp_ms,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Milliseconds since the owning history was created, refreshed on merge.
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Operations replayed by redo, in replay order.
    pub fn do_ops(&self) -> &[Operation] {
        &self.do_ops
    }

    /// Operations replayed by undo, in replay order.
    pub fn undo_ops(&self) -> impl Iterator<Item = &Operation> {
        self.undo_ops.iter()
    }

    /// Whether the action records nothing at all.
    pub fn is_empty(&self) -> bool {
        self.do_ops.is_empty() && self.undo_ops.is_empty()
    }

    pub(crate) fn push_do(&mut self, op: Operation) {
        self.do_ops.push(op);
    }

    pub(crate) fn push_undo(&mut self, op: Operation) {
        self.undo_ops.push_front(op);
    }

    /// Splices a later action with the same name into this one.
    ///
    /// Do operations are appended; undo operations are prepended so the later
    /// action's undos still run before this action's.
    pub(crate) fn absorb(&mut self, later: Action) {
        let Action {
            do_ops,
            undo_ops,
            timestamp_ms,
            ..
        } = later;
        self.do_ops.extend(do_ops);
        for op in undo_ops.into_iter().rev() {
            self.undo_ops.push_front(op);
        }
        self.timestamp_ms = timestamp_ms;
    }

    pub fn snapshot(&self) -> ActionSnapshot {
        ActionSnapshot {
            name: self.name.clone(),
            redo_operations: self.do_ops.iter().map(Operation::snapshot).collect(),
            undo_operations: self.undo_ops.iter().map(Operation::snapshot).collect(),
            timestamp_ms: self.timestamp_ms,
        }
    }
}

/// Serializable description of one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationSnapshot {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub target: ObjectId,
    pub name: String,
    /// Method arguments, or the single assigned value for a property.
    pub args: Vec<Value>,
}

/// Serializable description of one action, operations in replay order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionSnapshot {
    pub name: String,
    pub redo_operations: Vec<OperationSnapshot>,
    pub undo_operations: Vec<OperationSnapshot>,
    #[serde(rename = "time")]
    pub timestamp_ms: u64,
}
