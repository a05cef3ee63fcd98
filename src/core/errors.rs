/*!
 * Error Types
 * Synchronization and work-queue errors with thiserror and miette support
 */

use miette::Diagnostic;
use thiserror::Error;

/// Result type for synchronization operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised by lock primitives and the work queue
///
/// Timeouts are never errors (they surface as `false`), and cancellation is a
/// normal terminal work state. Everything here is a contract violation or a
/// resource failure and is logged by the primitive that detected it.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum SyncError {
    #[error("Deadlock: {0} lock would block its own holder")]
    #[diagnostic(
        code(sync::deadlock),
        help("Error-checked mutexes refuse a second lock from the holder, and a condition wait needs a recursive mutex held exactly once. Unlock the extra levels first.")
    )]
    Deadlock(&'static str),

    #[error("Unlock of {0} lock from a thread that does not own it")]
    #[diagnostic(
        code(sync::not_owner),
        help("Lock and unlock must be paired on the same thread.")
    )]
    NotOwner(&'static str),

    #[error("Unlock of {0} lock that is not held")]
    #[diagnostic(
        code(sync::not_locked),
        help("Every unlock must match a preceding lock.")
    )]
    NotLocked(&'static str),

    #[error("Demote requires the exclusive writer lock")]
    #[diagnostic(
        code(sync::not_writer),
        help("Only the thread holding the writer lock may demote it to a reader lock.")
    )]
    NotWriter,

    #[error("Recursive lock depth overflow")]
    #[diagnostic(
        code(sync::recursion_overflow),
        help("A recursive mutex was locked more times than its counter can represent.")
    )]
    RecursionOverflow,

    #[error("Invalid slot capacity: {0}")]
    #[diagnostic(
        code(sync::invalid_capacity),
        help("Slotted locks and condition maps need at least one slot.")
    )]
    InvalidCapacity(usize),

    #[error("Invalid worker count {requested} (allowed 1..={max})")]
    #[diagnostic(
        code(sync::invalid_worker_count),
        help("Start the work queue with at least one and at most the platform maximum of workers.")
    )]
    InvalidWorkerCount { requested: usize, max: usize },

    #[error("Invalid work queue transition: {from} -> {to}")]
    #[diagnostic(
        code(sync::invalid_state),
        help("A work queue is started once and stopped once.")
    )]
    InvalidState { from: &'static str, to: &'static str },

    #[error("Work queue is closed to new submissions")]
    #[diagnostic(
        code(sync::queue_closed),
        help("Submit work before calling cancel, finish or exit.")
    )]
    QueueClosed,

    #[error("Failed to spawn worker thread: {0}")]
    #[diagnostic(
        code(sync::spawn_failed),
        help("The OS refused a new thread. Check thread limits and available memory.")
    )]
    Spawn(String),
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Spawn(err.to_string())
    }
}

/// Escalate a contract violation into a fatal, logged failure
///
/// Used by components whose internal locks can only fail through a bug; the
/// instance cannot continue after such a failure.
pub trait OrFatal<T> {
    fn or_fatal(self, context: &'static str) -> T;
}

impl<T> OrFatal<T> for SyncResult<T> {
    #[inline]
    #[track_caller]
    fn or_fatal(self, context: &'static str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(error = %err, context, "fatal synchronization failure");
                panic!("{context}: {err}");
            }
        }
    }
}
