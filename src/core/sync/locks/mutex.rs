/*!
 * Mutex
 *
 * Blocking mutual exclusion over one parking_lot raw mutex, in three kinds
 * fixed at construction:
 *
 * - **Fast**: no ownership tracking. A second lock by the holder deadlocks;
 *   unlocking from another thread releases the holder's lock.
 * - **Robust**: error-checked. Relock by the holder and unlock by a
 *   non-holder are refused and logged.
 * - **Recursive**: the holder may lock N times and must unlock N times.
 *
 * The raw handle lives and dies with the `Mutex`; there is no separate
 * create/destroy.
 */

use super::traits::Lockable;
use crate::core::errors::{SyncError, SyncResult};
use crate::core::sync::backoff::Backoff;
use parking_lot::lock_api::RawMutex as RawMutexApi;
use parking_lot::RawMutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, warn};

/// Mutex behaviour, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutexKind {
    #[default]
    Fast,
    Robust,
    Recursive,
}

impl MutexKind {
    pub const fn name(self) -> &'static str {
        match self {
            MutexKind::Fast => "fast",
            MutexKind::Robust => "robust",
            MutexKind::Recursive => "recursive",
        }
    }
}

/// Nonzero identifier for the calling thread
///
/// The address of a thread-local is unique among live threads.
#[inline]
fn thread_token() -> usize {
    thread_local!(static TOKEN: u8 = const { 0 });
    TOKEN.with(|t| t as *const u8 as usize)
}

const NO_OWNER: usize = 0;

/// Blocking mutex with a construction-time kind
pub struct Mutex {
    raw: RawMutex,
    kind: MutexKind,
    /// Holder's thread token (Robust and Recursive only)
    owner: AtomicUsize,
    /// Recursion depth, written only by the holder
    depth: AtomicUsize,
}

impl Mutex {
    pub const fn new(kind: MutexKind) -> Self {
        Self {
            raw: <RawMutex as RawMutexApi>::INIT,
            kind,
            owner: AtomicUsize::new(NO_OWNER),
            depth: AtomicUsize::new(0),
        }
    }

    pub const fn fast() -> Self {
        Self::new(MutexKind::Fast)
    }

    pub const fn robust() -> Self {
        Self::new(MutexKind::Robust)
    }

    pub const fn recursive() -> Self {
        Self::new(MutexKind::Recursive)
    }

    #[inline]
    pub fn kind(&self) -> MutexKind {
        self.kind
    }

    /// Block until the mutex is held by the caller
    pub fn lock(&self) -> SyncResult<()> {
        match self.kind {
            MutexKind::Fast => {
                self.raw.lock();
                Ok(())
            }
            MutexKind::Robust => {
                let me = thread_token();
                if self.owner.load(Ordering::Relaxed) == me {
                    error!(kind = "robust", "relock by owning thread refused");
                    return Err(SyncError::Deadlock("robust"));
                }
                self.raw.lock();
                self.owner.store(me, Ordering::Relaxed);
                Ok(())
            }
            MutexKind::Recursive => {
                let me = thread_token();
                if self.owner.load(Ordering::Relaxed) == me {
                    return self.bump_depth();
                }
                self.raw.lock();
                self.owner.store(me, Ordering::Relaxed);
                self.depth.store(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }

    /// Take the mutex only if it is free right now
    ///
    /// A Robust mutex already held by the caller reports `false`.
    pub fn try_lock(&self) -> bool {
        match self.kind {
            MutexKind::Fast => self.raw.try_lock(),
            MutexKind::Robust => {
                let me = thread_token();
                if self.owner.load(Ordering::Relaxed) == me {
                    return false;
                }
                if self.raw.try_lock() {
                    self.owner.store(me, Ordering::Relaxed);
                    true
                } else {
                    false
                }
            }
            MutexKind::Recursive => {
                let me = thread_token();
                if self.owner.load(Ordering::Relaxed) == me {
                    return self.bump_depth().is_ok();
                }
                if self.raw.try_lock() {
                    self.owner.store(me, Ordering::Relaxed);
                    self.depth.store(1, Ordering::Relaxed);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Retry `try_lock` with spin backoff until `timeout` elapses
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

    /// Release one level of the caller's hold
    pub fn unlock(&self) -> SyncResult<()> {
        match self.kind {
            MutexKind::Fast => {
                if !self.raw.is_locked() {
                    error!(kind = "fast", "unlock of free mutex");
                    return Err(SyncError::NotLocked("fast"));
                }
                // SAFETY: the mutex is held. Pairing with the locking thread is
                // the caller's contract for this kind; the raw mutex keeps no
                // per-owner state, so a mismatch only releases early.
                unsafe { self.raw.unlock() };
                Ok(())
            }
            MutexKind::Robust => {
                self.check_owner("robust")?;
                self.owner.store(NO_OWNER, Ordering::Relaxed);
                // SAFETY: ownership verified above.
                unsafe { self.raw.unlock() };
                Ok(())
            }
            MutexKind::Recursive => {
                self.check_owner("recursive")?;
                let depth = self.depth.load(Ordering::Relaxed);
                if depth > 1 {
                    self.depth.store(depth - 1, Ordering::Relaxed);
                    return Ok(());
                }
                self.depth.store(0, Ordering::Relaxed);
                self.owner.store(NO_OWNER, Ordering::Relaxed);
                // SAFETY: ownership verified above and this was the last level.
                unsafe { self.raw.unlock() };
                Ok(())
            }
        }
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    /// Whether the caller holds this mutex (always `false` for Fast)
    #[inline]
    pub fn is_owned_by_current_thread(&self) -> bool {
        self.kind != MutexKind::Fast && self.owner.load(Ordering::Relaxed) == thread_token()
    }

    /// Current recursion depth (Recursive only, 0 otherwise)
    #[inline]
    pub fn depth(&self) -> usize {
        if self.kind == MutexKind::Recursive {
            self.depth.load(Ordering::Relaxed)
        } else {
            0
        }
    }

    fn bump_depth(&self) -> SyncResult<()> {
        let depth = self.depth.load(Ordering::Relaxed);
        let next = depth.checked_add(1).ok_or(SyncError::RecursionOverflow)?;
        self.depth.store(next, Ordering::Relaxed);
        Ok(())
    }

    fn check_owner(&self, kind: &'static str) -> SyncResult<()> {
        if self.owner.load(Ordering::Relaxed) == thread_token() {
            return Ok(());
        }
        if self.raw.is_locked() {
            error!(kind, "unlock from non-owning thread");
            Err(SyncError::NotOwner(kind))
        } else {
            error!(kind, "unlock of free mutex");
            Err(SyncError::NotLocked(kind))
        }
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::fast()
    }
}

impl std::fmt::Debug for Mutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutex")
            .field("kind", &self.kind)
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        if self.raw.is_locked() {
            warn!(kind = self.kind.name(), "mutex dropped while held");
        }
    }
}

impl Lockable for Mutex {
    #[inline]
    fn acquire(&self) -> SyncResult<()> {
        self.lock()
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
        self.unlock()
    }

    /// A recursive holder must be at depth 1, or the wait would sleep on a
    /// mutex it still holds
    fn check_wait(&self) -> SyncResult<()> {
        if self.kind == MutexKind::Recursive
            && self.owner.load(Ordering::Relaxed) == thread_token()
            && self.depth.load(Ordering::Relaxed) > 1
        {
            error!(
                kind = "recursive",
                depth = self.depth.load(Ordering::Relaxed),
                "condition wait on nested recursive lock refused"
            );
            return Err(SyncError::Deadlock("recursive"));
        }
        Ok(())
    }

    fn kind_name(&self) -> &'static str {
        self.kind.name()
    }
}
