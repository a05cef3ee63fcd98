/*!
 * RAII Lock Guards
 *
 * Scoped acquire/release over any `Lockable`. The lock is taken when the guard
 * is built and released on every exit path: normal scope end, early return,
 * `?` propagation, or unwinding.
 *
 * ## Guard Types
 *
 * - **ScopedLock**: exclusive hold of any `Lockable`
 * - **ScopedReadLock** / **ScopedWriteLock**: shared or exclusive hold of a
 *   reader/writer lock
 * - **ScopedSlot**: one slot of a `Slotted` lock array
 * - **ScopedAllSlots**: every slot of a `Slotted` lock array, in ascending
 *   order
 *
 * ## Example
 *
 * ```rust
 * use ai_os_sync::{Mutex, ScopedLock};
 *
 * let mutex = Mutex::fast();
 * {
 *     let _guard = ScopedLock::new(&mutex)?;
 *     assert!(mutex.is_locked());
 * }
 * assert!(!mutex.is_locked());
 * # Ok::<(), ai_os_sync::GuardError>(())
 * ```
 */

mod lock;
mod traits;

pub use lock::{ScopedAllSlots, ScopedLock, ScopedReadLock, ScopedSlot, ScopedWriteLock};
pub use traits::{Guard, GuardDrop};

use crate::core::errors::SyncError;
use miette::Diagnostic;

/// Result type for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

/// Errors that can occur during guard operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Diagnostic)]
pub enum GuardError {
    #[error("Resource already released")]
    #[diagnostic(code(guard::already_released))]
    AlreadyReleased,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lock(#[from] SyncError),
}

/// Guard metadata for observability
#[derive(Debug, Clone)]
pub struct GuardMetadata {
    pub resource_type: &'static str,
    pub creation_time: std::time::Instant,
    /// Slot index for guards over a slotted lock
    pub slot: Option<usize>,
}

impl GuardMetadata {
    #[inline]
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            creation_time: std::time::Instant::now(),
            slot: None,
        }
    }

    #[inline]
    pub fn with_slot(mut self, slot: usize) -> Self {
        self.slot = Some(slot);
        self
    }

    /// How long the guard has held its lock
    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        self.creation_time.elapsed().as_micros() as u64
    }
}
