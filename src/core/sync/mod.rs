/*!
 * Synchronization Primitives
 *
 * Portable locks, condition variables and keyed waits:
 * - `locks`: Mutex (fast/robust/recursive), SpinLock, Semaphore, reader/writer
 *   locks and their slotted (sharded) variants
 * - `wait`: ConditionVariable and ConditionVariableMap
 * - `backoff`: spin, yield, then nap
 *
 * # Use Cases
 *
 * - **Work queues**: block idle workers until work or shutdown
 * - **Per-resource locking**: hash a resource id onto a slotted lock
 * - **Completion waits**: block on a key until its producer signals
 */

pub mod backoff;
pub mod config;
pub mod locks;
pub mod wait;

pub use backoff::Backoff;
pub use config::{BackendKind, SyncConfig};
pub use locks::{
    Lockable, Mutex, MutexCell, MutexCellGuard, MutexKind, ReadWriteLock, RwLockBackend,
    Semaphore, SharedLockable, Slotted, SlottedMutex, SlottedReadWriteLock, SlottedSpinLock,
    SlottedSpinReadWriteLock, SpinLock, SpinReadWriteLock,
};
pub use wait::{ConditionVariable, ConditionVariableMap, KeyedWait, WakeResult};
