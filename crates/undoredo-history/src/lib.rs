/// Transactional undo/redo action history.
///
/// Provides a `History` that groups recorded method calls and property
/// assignments into named actions, merges consecutive same-named actions on
/// request, and replays them forward (redo) or backward (undo) through a
/// `HistorySink`. Targets are weak `ObjectId` handles; operations on targets
/// that no longer exist are skipped during replay.
pub mod config;
pub mod error;
pub mod history;
pub mod operation;
pub mod sink;
pub mod target;
pub mod value;

pub use config::HistoryConfig;
pub use error::HistoryError;
pub use history::{History, MergeMode};
pub use operation::{Action, ActionSnapshot, HeldRef, Operation, OperationKind, OperationSnapshot};
pub use sink::{HistorySink, Notification, NullSink, RecordingSink};
pub use target::{ObjectId, ObjectRegistry};
pub use value::{Args, Value, MAX_ARGS};
