/*!
 * Lock Primitives
 *
 * - Mutex (fast, error-checked, recursive) over parking_lot's raw mutex
 * - SpinLock and SpinReadWriteLock in pure user space
 * - ReadWriteLock with native or spin backend
 * - Semaphore
 * - Slotted arrays of any of the above
 * - MutexCell for data guarded by a Mutex
 */

mod cell;
mod mutex;
mod rwlock;
mod semaphore;
mod slotted;
mod spin;
mod spin_rwlock;
mod traits;

pub use cell::{MutexCell, MutexCellGuard};
pub use mutex::{Mutex, MutexKind};
pub use rwlock::{ReadWriteLock, RwLockBackend};
pub use semaphore::Semaphore;
pub use slotted::{
    Slotted, SlottedMutex, SlottedReadWriteLock, SlottedSpinLock, SlottedSpinReadWriteLock,
};
pub use spin::SpinLock;
pub use spin_rwlock::{SpinReadWriteLock, WRITER};
pub use traits::{Lockable, SharedLockable};
