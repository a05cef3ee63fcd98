/*!
 * AI-OS Sync Library
 * Portable locks, condition variables and worker pools exposed as a library
 */

pub mod core;
pub mod monitoring;
pub mod work;

// Re-exports
pub use crate::core::sync::{
    Backoff, BackendKind, ConditionVariable, ConditionVariableMap, KeyedWait, Lockable, Mutex,
    MutexCell, MutexCellGuard, MutexKind, ReadWriteLock, RwLockBackend, Semaphore, SharedLockable,
    Slotted, SlottedMutex, SlottedReadWriteLock, SlottedSpinLock, SlottedSpinReadWriteLock,
    SpinLock, SpinReadWriteLock, SyncConfig, WakeResult,
};
pub use crate::core::{
    Guard, GuardError, GuardResult, OrFatal, ScopedAllSlots, ScopedLock, ScopedReadLock,
    ScopedSlot, ScopedWriteLock, ShardManager, SyncError, SyncResult, WorkloadProfile,
};
pub use monitoring::init_tracing;
pub use work::{
    QueueState, Runnable, SlotId, WorkId, WorkItem, WorkQueue, WorkQueueConfig, WorkStatus,
};
