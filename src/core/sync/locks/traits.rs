/*!
 * Lock Traits
 *
 * Common acquire/release seam shared by every lock primitive. Scoped guards,
 * slotted arrays and `ConditionVariable::wait` are generic over these.
 */

use crate::core::errors::SyncResult;
use std::time::Duration;

/// A lock with an exclusive mode
///
/// `release` drops whichever mode the caller holds; reader/writer locks track
/// that themselves.
pub trait Lockable: Send + Sync {
    /// Block until the lock is held
    fn acquire(&self) -> SyncResult<()>;

    /// Take the lock if it is free right now
    fn try_acquire(&self) -> bool;

    /// Retry with backoff until `timeout` elapses
    fn try_acquire_for(&self, timeout: Duration) -> bool;

    /// Release the held mode
    fn release(&self) -> SyncResult<()>;

    /// Refuse a condition-variable wait that `release` could not fully unlock
    fn check_wait(&self) -> SyncResult<()> {
        Ok(())
    }

    /// Short name used in logs and errors
    fn kind_name(&self) -> &'static str;
}

/// A lock that also grants shared (reader) access
pub trait SharedLockable: Lockable {
    /// Block until shared access is held
    fn acquire_shared(&self) -> SyncResult<()>;

    /// Take shared access if no writer holds the lock
    fn try_acquire_shared(&self) -> bool;
}
