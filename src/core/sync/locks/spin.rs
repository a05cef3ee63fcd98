/*!
 * Spin Lock
 *
 * One memory word, `0 = free`, `1 = held`. No OS handle. Contended lockers
 * escalate through `Backoff` (spin, yield, nap). No fairness: a fresh locker
 * can overtake one that has been napping.
 */

use super::traits::Lockable;
use crate::core::errors::SyncResult;
use crate::core::sync::backoff::Backoff;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

const FREE: u32 = 0;
const HELD: u32 = 1;

/// Test-and-test-and-set spin lock
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct SpinLock {
    word: AtomicU32,
}

impl SpinLock {
    pub const fn new() -> Self {
        Self {
            word: AtomicU32::new(FREE),
        }
    }

    /// Spin until the lock is ours
    #[inline]
    pub fn lock(&self) {
        self.lock_with(Backoff::new());
    }

    /// `lock` with caller-tuned backoff, e.g. `Backoff::with_config`
    pub fn lock_with(&self, mut backoff: Backoff) {
        if self.try_lock() {
            return;
        }

        loop {
            // Read-only wait keeps the cache line shared until it frees up
            while self.word.load(Ordering::Relaxed) == HELD {
                backoff.snooze();
            }
            if self.try_lock() {
                return;
            }
        }
    }

    /// Single compare-and-swap attempt
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.word
            .compare_exchange(FREE, HELD, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Retry with backoff until `timeout` elapses
    pub fn try_lock_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut backoff = Backoff::new();
        loop {
            if self.try_lock() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            backoff.snooze_until(deadline);
        }
    }

    /// Release unconditionally
    ///
    /// Unlocking a free spin lock is a caller bug and is not detected.
    #[inline]
    pub fn unlock(&self) {
        self.word.store(FREE, Ordering::Release);
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.word.load(Ordering::Relaxed) == HELD
    }
}

impl Lockable for SpinLock {
    #[inline]
    fn acquire(&self) -> SyncResult<()> {
        self.lock();
        Ok(())
    }

    #[inline]
    fn try_acquire(&self) -> bool {
        self.try_lock()
    }

    fn try_acquire_for(&self, timeout: Duration) -> bool {
        self.try_lock_for(timeout)
    }

    #[inline]
    fn release(&self) -> SyncResult<()> {
        self.unlock();
        Ok(())
    }

    fn kind_name(&self) -> &'static str {
        "spin"
    }
}
