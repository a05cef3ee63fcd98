/*!
 * Spin Reader/Writer Lock
 *
 * Pure user-space reader/writer lock: a counter guarded by a `SpinLock`.
 * The counter holds the number of readers, or `WRITER` (the largest `usize`)
 * while a writer holds the lock. Both sides wait with spin backoff.
 */

use super::spin::SpinLock;
use super::traits::{Lockable, SharedLockable};
use crate::core::errors::{SyncError, SyncResult};
use crate::core::sync::backoff::Backoff;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::error;

/// Counter value meaning "a writer holds exclusive access"
pub const WRITER: usize = usize::MAX;

/// Spin-based reader/writer lock with promote/demote
#[derive(Debug, Default)]
pub struct SpinReadWriteLock {
    guard: SpinLock,
    /// Reader count or `WRITER`; only touched while `guard` is held
    state: AtomicUsize,
}

impl SpinReadWriteLock {
    pub const fn new() -> Self {
        Self {
            guard: SpinLock::new(),
            state: AtomicUsize::new(0),
        }
    }

    /// Run `f` on the counter under the spin guard
    #[inline]
    fn with_state<R>(&self, f: impl FnOnce(&mut usize) -> R) -> R {
        self.guard.lock();
        let mut state = self.state.load(Ordering::Relaxed);
        let result = f(&mut state);
        self.state.store(state, Ordering::Relaxed);
        self.guard.unlock();
        result
    }

    pub fn try_lock_reader(&self) -> bool {
        self.with_state(|state| {
            // Stay strictly below the sentinel
            if *state < WRITER - 1 {
                *state += 1;
                true
            } else {
                false
            }
        })
    }

    pub fn try_lock_writer(&self) -> bool {
        self.with_state(|state| {
            if *state == 0 {
                *state = WRITER;
                true
            } else {
                false
            }
        })
    }

    pub fn lock_reader(&self) {
        let mut backoff = Backoff::new();
        while !self.try_lock_reader() {
            backoff.snooze();
        }
    }

    pub fn lock_writer(&self) {
        self.lock_writer_with(Backoff::new());
    }

    /// `lock_writer` with caller-tuned backoff
    pub fn lock_writer_with(&self, mut backoff: Backoff) {
        while !self.try_lock_writer() {
            backoff.snooze();
        }
    }

    /// Retry the writer lock with backoff until `timeout` elapses
    pub fn try_lock_writer_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut backoff = Backoff::new();
        loop {
            if self.try_lock_writer() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            backoff.snooze_until(deadline);
        }
    }

    /// Release the writer lock or one reader
    pub fn unlock(&self) -> SyncResult<()> {
        self.with_state(|state| match *state {
            0 => {
                error!(kind = "spin_rw", "unlock of free lock");
                Err(SyncError::NotLocked("spin_rw"))
            }
            WRITER => {
                *state = 0;
                Ok(())
            }
            _ => {
                *state -= 1;
                Ok(())
            }
        })
    }

    /// Upgrade the caller's read lock to the writer lock
    ///
    /// Succeeds only when the caller is the sole reader; otherwise nothing
    /// changes and `false` is returned.
    pub fn promote(&self) -> bool {
        self.with_state(|state| {
            if *state == 1 {
                *state = WRITER;
                true
            } else {
                false
            }
        })
    }

    /// Downgrade the caller's writer lock to a single read lock
    pub fn demote(&self) -> SyncResult<()> {
        self.with_state(|state| {
            if *state == WRITER {
                *state = 1;
                Ok(())
            } else {
                error!(kind = "spin_rw", "demote without writer lock");
                Err(SyncError::NotWriter)
            }
        })
    }

    /// Current reader count (0 while a writer holds the lock)
    pub fn readers(&self) -> usize {
        match self.state.load(Ordering::Relaxed) {
            WRITER => 0,
            n => n,
        }
    }

    pub fn is_write_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) == WRITER
    }

    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) != 0
    }
}

impl Lockable for SpinReadWriteLock {
    fn acquire(&self) -> SyncResult<()> {
        self.lock_writer();
        Ok(())
    }

    fn try_acquire(&self) -> bool {
        self.try_lock_writer()
    }

    fn try_acquire_for(&self, timeout: Duration) -> bool {
        self.try_lock_writer_for(timeout)
    }

    fn release(&self) -> SyncResult<()> {
        self.unlock()
    }

    fn kind_name(&self) -> &'static str {
        "spin_rw"
    }
}

impl SharedLockable for SpinReadWriteLock {
    fn acquire_shared(&self) -> SyncResult<()> {
        self.lock_reader();
        Ok(())
    }

    fn try_acquire_shared(&self) -> bool {
        self.try_lock_reader()
    }
}
