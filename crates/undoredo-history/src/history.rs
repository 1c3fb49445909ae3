/// Transactional undo/redo history.
///
/// Callers open an action with `begin`, record do/undo operations against
/// target handles, and close it with `commit`. Commit either appends the
/// action at the cursor or merges it into the previous one, then replays its
/// do operations through the sink. `undo` and `redo` move the cursor one step
/// and replay the matching operation list.
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::HistoryConfig;
use crate::error::HistoryError;
use crate::operation::{Action, ActionSnapshot, HeldRef, Operation};
use crate::sink::{HistorySink, NullSink};
use crate::target::ObjectId;
use crate::value::{Args, Value, MAX_ARGS};

/// Merge policy requested when an action is opened.
///
/// `MergeEnds` and `MergeAll` splice identically. The difference is in when
/// callers ask for them: `MergeEnds` for the first and last step of a rapid
/// sequence such as a drag, `MergeAll` for every intermediate step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    #[default]
    Disable,
    MergeEnds,
    MergeAll,
}

/// Undo/redo history over a list of committed actions and a cursor.
///
/// `current` is the number of actions in effect: `actions[current - 1]` is
/// the next one undo reverts, `actions[current]` the next one redo applies.
pub struct History<S = NullSink> {
    /// Committed actions, oldest first.
    actions: Vec<Action>,
    /// Cursor into `actions`, in `0..=actions.len()`.
    current: usize,
    /// Action under construction between the outermost begin and commit.
    pending: Option<Action>,
    /// Nesting depth of begin/commit pairs.
    action_level: usize,
    /// Merge policy requested by the outermost begin.
    merge_mode: MergeMode,
    /// Bumped on every structural change.
    version: u64,
    /// True while a commit is replaying its do operations.
    committing: bool,
    config: HistoryConfig,
    sink: S,
    /// Origin for action timestamps.
    epoch: Instant,
}

impl<S> std::fmt::Debug for History<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History")
            .field("actions_len", &self.actions.len())
            .field("current", &self.current)
            .field("action_level", &self.action_level)
            .field("merge_mode", &self.merge_mode)
            .field("version", &self.version)
            .field("committing", &self.committing)
            .finish()
    }
}

impl Default for History<NullSink> {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl History<NullSink> {
    /// Creates an empty history whose replays go nowhere.
    pub fn new(config: HistoryConfig) -> Self {
        Self::with_sink(config, NullSink)
    }
}

impl<S: HistorySink> History<S> {
    /// Creates an empty history that replays through `sink`.
    pub fn with_sink(config: HistoryConfig, sink: S) -> Self {
        Self {
            actions: Vec::new(),
            current: 0,
            pending: None,
            action_level: 0,
            merge_mode: MergeMode::Disable,
            version: 0,
            committing: false,
            config,
            sink,
            epoch: Instant::now(),
        }
    }

    /// Replaces the sink, returning the previous one.
    pub fn set_sink(&mut self, sink: S) -> S {
        std::mem::replace(&mut self.sink, sink)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    // --- Transactions ---

    /// Opens an action, or nests inside the one already open.
    ///
    /// Only the outermost call takes effect: it starts a fresh pending action,
    /// records the merge mode, and discards every redoable action past the
    /// cursor. Nested calls only deepen the nesting level.
    pub fn begin(&mut self, name: impl Into<String>, mode: MergeMode) {
        self.action_level += 1;
        if self.action_level > 1 {
            return;
        }

        let name = name.into();
        let discarded = self.actions.len() - self.current;
        self.actions.truncate(self.current);
        if discarded > 0 {
            tracing::debug!("Discarded {discarded} redoable action(s)");
        }
        tracing::debug!("Begin action {name:?} ({mode:?})");
        self.pending = Some(Action::new(name, self.elapsed_ms()));
        self.merge_mode = mode;
    }

    /// Records a method call replayed by redo.
    ///
    /// # Errors
    ///
    /// Fails if no action is open or `args` exceeds [`MAX_ARGS`].
    pub fn append_do(
        &mut self,
        target: ObjectId,
        method: impl Into<String>,
        args: impl IntoIterator<Item = Value>,
    ) -> Result<(), HistoryError> {
        let op = method_op(target, method.into(), args)?;
        self.pending_mut()?.push_do(op);
        Ok(())
    }

    /// Records a method call replayed by undo.
    ///
    /// # Errors
    ///
    /// Fails if no action is open or `args` exceeds [`MAX_ARGS`].
    pub fn append_undo(
        &mut self,
        target: ObjectId,
        method: impl Into<String>,
        args: impl IntoIterator<Item = Value>,
    ) -> Result<(), HistoryError> {
        let op = method_op(target, method.into(), args)?;
        self.pending_mut()?.push_undo(op);
        Ok(())
    }

    /// Records a property assignment replayed by redo.
    ///
    /// # Errors
    ///
    /// Fails if no action is open.
    pub fn append_do_property(
        &mut self,
        target: ObjectId,
        property: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), HistoryError> {
        let op = Operation::Property {
            target,
            name: property.into(),
            value: value.into(),
        };
        self.pending_mut()?.push_do(op);
        Ok(())
    }

    /// Records a property assignment replayed by undo.
    ///
    /// # Errors
    ///
    /// Fails if no action is open.
    pub fn append_undo_property(
        &mut self,
        target: ObjectId,
        property: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), HistoryError> {
        let op = Operation::Property {
            target,
            name: property.into(),
            value: value.into(),
        };
        self.pending_mut()?.push_undo(op);
        Ok(())
    }

    /// Keeps `held` alive alongside the do operations of the open action.
    ///
    /// Typically used for an object the action creates, so it survives while
    /// the action can still be redone.
    ///
    /// # Errors
    ///
    /// Fails if no action is open.
    pub fn hold_do_reference(
        &mut self,
        target: ObjectId,
        held: HeldRef,
    ) -> Result<(), HistoryError> {
        self.pending_mut()?.push_do(Operation::Reference { target, held });
        Ok(())
    }

    /// Keeps `held` alive alongside the undo operations of the open action.
    ///
    /// Typically used for an object the action removes, so undo can restore it.
    ///
    /// # Errors
    ///
    /// Fails if no action is open.
    pub fn hold_undo_reference(
        &mut self,
        target: ObjectId,
        held: HeldRef,
    ) -> Result<(), HistoryError> {
        self.pending_mut()?.push_undo(Operation::Reference { target, held });
        Ok(())
    }

    /// Whether a commit is currently replaying its operations.
    ///
    /// Sinks observe the same window through `action_committed` and
    /// `commit_finished`.
    pub fn is_committing(&self) -> bool {
        self.committing
    }

    /// Whether `begin` has been called without its matching `commit`.
    pub fn is_action_open(&self) -> bool {
        self.action_level > 0
    }

    /// Closes the innermost open action.
    ///
    /// The outermost commit merges the pending action into the previous one
    /// when the merge mode allows it, or appends it otherwise. It then bumps
    /// the version, notifies the sink, and replays the resulting action's do
    /// operations.
    ///
    /// # Errors
    ///
    /// Fails if no action is open.
    pub fn commit(&mut self) -> Result<(), HistoryError> {
        if self.action_level == 0 {
            return Err(HistoryError::NoOpenAction);
        }
        self.action_level -= 1;
        if self.action_level > 0 {
            return Ok(());
        }

        let pending = self.pending.take().ok_or(HistoryError::NoOpenAction)?;
        let index = if self.should_merge(&pending) {
            let index = self.current - 1;
            tracing::debug!("Merging into action {:?} ({:?})", pending.name(), self.merge_mode);
            self.actions[index].absorb(pending);
            index
        } else {
            if pending.is_empty() {
                tracing::debug!("Committing empty action {:?}", pending.name());
            } else {
                tracing::debug!("Committing action {:?}", pending.name());
            }
            self.actions.truncate(self.current);
            self.actions.push(pending);
            self.current += 1;
            self.enforce_max_steps();
            self.current - 1
        };
        self.merge_mode = MergeMode::Disable;
        self.version += 1;

        self.committing = true;
        let action = &self.actions[index];
        self.sink.action_committed(action.name());
        replay(&mut self.sink, action.do_ops().iter());
        self.sink.commit_finished(action.name());
        self.committing = false;
        Ok(())
    }

    // --- Traversal ---

    /// Reverts the action before the cursor.
    ///
    /// Returns `false` without changing anything if there is nothing to undo
    /// or an action is open.
    pub fn undo(&mut self) -> bool {
        if self.action_level > 0 {
            tracing::warn!("Ignoring undo while an action is open");
            return false;
        }
        if self.current == 0 {
            return false;
        }
        self.current -= 1;
        let action = &self.actions[self.current];
        tracing::debug!("Undo {:?}", action.name());
        replay(&mut self.sink, action.undo_ops());
        self.version += 1;
        true
    }

    /// Re-applies the action at the cursor.
    ///
    /// Returns `false` without changing anything if there is nothing to redo
    /// or an action is open.
    pub fn redo(&mut self) -> bool {
        if self.action_level > 0 {
            tracing::warn!("Ignoring redo while an action is open");
            return false;
        }
        if self.current == self.actions.len() {
            return false;
        }
        let action = &self.actions[self.current];
        tracing::debug!("Redo {:?}", action.name());
        replay(&mut self.sink, action.do_ops().iter());
        self.current += 1;
        self.version += 1;
        true
    }

    /// Drops every committed action and resets the cursor.
    ///
    /// Pass `increase_version: false` when the clear is part of a larger
    /// reset that must not look like a change to observers. Ignored while an
    /// action is open.
    pub fn clear_history(&mut self, increase_version: bool) {
        if self.action_level > 0 {
            tracing::warn!("Ignoring clear_history while an action is open");
            return;
        }
        tracing::debug!("Clearing {} action(s)", self.actions.len());
        self.actions.clear();
        self.current = 0;
        if increase_version {
            self.version += 1;
        }
    }

    // --- Inspection ---

    /// Name of the action undo would revert, or `""` if there is none.
    pub fn current_action_name(&self) -> &str {
        match self.current {
            0 => "",
            n => self.actions[n - 1].name(),
        }
    }

    /// The cursor: how many actions are currently in effect.
    pub fn current_action(&self) -> usize {
        self.current
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Snapshot of the action at `index`, if any.
    pub fn action(&self, index: usize) -> Option<ActionSnapshot> {
        self.actions.get(index).map(Action::snapshot)
    }

    /// Snapshots of every committed action, oldest first.
    pub fn all_actions(&self) -> Vec<ActionSnapshot> {
        self.actions.iter().map(Action::snapshot).collect()
    }

    pub fn has_undo(&self) -> bool {
        self.current > 0
    }

    pub fn has_redo(&self) -> bool {
        self.current < self.actions.len()
    }

    /// Counter bumped on every commit, merge, undo, redo and (by default) clear.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether an action named `name` begun now would be a continuation of
    /// the action at the tip, per the configured merge window.
    ///
    /// Commit never consults this. Callers use it to pick a merge mode.
    pub fn is_mergeable_with_tip(&self, name: &str) -> bool {
        if self.current == 0 || self.current != self.actions.len() {
            return false;
        }
        let tip = &self.actions[self.current - 1];
        tip.name() == name
            && self.elapsed_ms().saturating_sub(tip.timestamp_ms()) <= self.config.merge_window_ms
    }

    // --- Internals ---

    fn pending_mut(&mut self) -> Result<&mut Action, HistoryError> {
        if self.action_level == 0 {
            return Err(HistoryError::NoOpenAction);
        }
        self.pending.as_mut().ok_or(HistoryError::NoOpenAction)
    }

    fn should_merge(&self, pending: &Action) -> bool {
        self.merge_mode != MergeMode::Disable
            && self.current > 0
            && self.current == self.actions.len()
            && self.actions[self.current - 1].name() == pending.name()
    }

    /// Evicts the oldest actions beyond `max_steps`.
    fn enforce_max_steps(&mut self) {
        let max = self.config.max_steps;
        if max == 0 || self.actions.len() <= max {
            return;
        }
        let excess = self.actions.len() - max;
        self.actions.drain(..excess);
        self.current = self.current.saturating_sub(excess);
        tracing::debug!("Evicted {excess} oldest action(s)");
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Builds a method operation, enforcing the argument bound.
fn method_op(
    target: ObjectId,
    name: String,
    args: impl IntoIterator<Item = Value>,
) -> Result<Operation, HistoryError> {
    let args: Args = args.into_iter().collect();
    if args.len() > MAX_ARGS {
        return Err(HistoryError::TooManyArguments {
            given: args.len(),
            max: MAX_ARGS,
        });
    }
    Ok(Operation::Method { target, name, args })
}

/// Replays `ops` in iteration order, skipping dead targets and references.
fn replay<'a, S: HistorySink>(sink: &mut S, ops: impl Iterator<Item = &'a Operation>) {
    for op in ops {
        if matches!(op, Operation::Reference { .. }) {
            continue;
        }
        if !sink.is_alive(op.target()) {
            tracing::trace!("Skipping {:?} on dead target {}", op.name(), op.target());
            continue;
        }
        match op {
            Operation::Method { target, name, args } => sink.method_called(*target, name, args),
            Operation::Property {
                target,
                name,
                value,
            } => sink.property_set(*target, name, value),
            Operation::Reference { .. } => {}
        }
    }
}
