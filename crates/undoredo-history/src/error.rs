/// Errors reported by the history when it is driven incorrectly.
///
/// These signal programming errors in the embedding code. Expected, frequent
/// outcomes such as "nothing to undo" are reported as `false`, not as errors.
use thiserror::Error;

/// Precondition violations raised by [`History`](crate::History).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// An operation was appended, or `commit` was called, with no open action.
    #[error("no action is open; call begin() first")]
    NoOpenAction,
    /// A method operation was given more positional arguments than allowed.
    #[error("too many arguments for method operation: {given} given, at most {max} allowed")]
    TooManyArguments { given: usize, max: usize },
}
