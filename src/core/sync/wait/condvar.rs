/*!
 * Condition Variable
 *
 * Couples a wait queue to a caller-owned lock. `wait` atomically releases the
 * lock, blocks until a signal, and reacquires the lock before returning.
 *
 * # Design: Backend Chosen Once
 *
 * The wait primitive (futex-style or counted handshake) is picked from
 * `SyncConfig` at construction and dispatched through a two-variant enum,
 * never re-decided per call.
 */

use super::futex::FutexWait;
use super::handshake::HandshakeWait;
use super::traits::{WaitPrimitive, WaitTicket};
use crate::core::errors::SyncResult;
use crate::core::sync::config::{BackendKind, SyncConfig};
use crate::core::sync::locks::Lockable;
use std::time::{Duration, Instant};

/// Wait backend (enum dispatch for zero overhead)
enum Backend {
    Futex(FutexWait),
    Handshake(HandshakeWait),
}

impl Backend {
    #[inline(always)]
    fn prepare(&self) -> WaitTicket {
        match self {
            Backend::Futex(b) => b.prepare(),
            Backend::Handshake(b) => b.prepare(),
        }
    }

    #[inline(always)]
    fn block(&self, ticket: WaitTicket, deadline: Option<Instant>) -> bool {
        match self {
            Backend::Futex(b) => b.block(ticket, deadline),
            Backend::Handshake(b) => b.block(ticket, deadline),
        }
    }

    fn cancel(&self, ticket: WaitTicket) {
        match self {
            Backend::Futex(b) => b.cancel(ticket),
            Backend::Handshake(b) => b.cancel(ticket),
        }
    }

    #[inline(always)]
    fn notify_one(&self) -> usize {
        match self {
            Backend::Futex(b) => b.notify_one(),
            Backend::Handshake(b) => b.notify_one(),
        }
    }

    #[inline(always)]
    fn notify_all(&self) -> usize {
        match self {
            Backend::Futex(b) => b.notify_all(),
            Backend::Handshake(b) => b.notify_all(),
        }
    }

    fn waiters(&self) -> usize {
        match self {
            Backend::Futex(b) => b.waiters(),
            Backend::Handshake(b) => b.waiters(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Backend::Futex(b) => b.name(),
            Backend::Handshake(b) => b.name(),
        }
    }
}

/// Condition variable usable with any exclusive `Lockable`
///
/// Spurious wakeups are possible; callers re-check their predicate.
pub struct ConditionVariable {
    backend: Backend,
}

impl ConditionVariable {
    /// Condition variable on the platform's default backend
    pub fn new() -> Self {
        Self::with_config(&SyncConfig::default())
    }

    pub fn with_config(config: &SyncConfig) -> Self {
        Self::with_backend(config.select_backend())
    }

    pub fn with_backend(kind: BackendKind) -> Self {
        let backend = match kind {
            BackendKind::Handshake => Backend::Handshake(HandshakeWait::new()),
            BackendKind::Futex => Backend::Futex(FutexWait::new()),
            BackendKind::Auto => return Self::new(),
        };
        Self { backend }
    }

    /// Release `lock`, block until signalled, reacquire `lock`
    ///
    /// A recursive mutex must be held exactly once; deeper holds are refused
    /// with `SyncError::Deadlock` before blocking.
    pub fn wait<L: Lockable + ?Sized>(&self, lock: &L) -> SyncResult<()> {
        self.wait_inner(lock, None).map(|_| ())
    }

    /// Like `wait`, giving up after `timeout`
    ///
    /// Returns `false` on timeout. The lock is held again either way.
    pub fn wait_for<L: Lockable + ?Sized>(&self, lock: &L, timeout: Duration) -> SyncResult<bool> {
        self.wait_inner(lock, Some(Instant::now() + timeout))
    }

    pub fn wait_until<L: Lockable + ?Sized>(&self, lock: &L, deadline: Instant) -> SyncResult<bool> {
        self.wait_inner(lock, Some(deadline))
    }

    fn wait_inner<L: Lockable + ?Sized>(
        &self,
        lock: &L,
        deadline: Option<Instant>,
    ) -> SyncResult<bool> {
        lock.check_wait()?;
        let ticket = self.backend.prepare();

        if let Err(err) = lock.release() {
            self.backend.cancel(ticket);
            return Err(err);
        }

        let woken = self.backend.block(ticket, deadline);
        lock.acquire()?;
        Ok(woken)
    }

    /// Wake at most one waiter
    #[inline]
    pub fn signal(&self) -> usize {
        self.backend.notify_one()
    }

    /// Wake every waiter
    #[inline]
    pub fn broadcast(&self) -> usize {
        self.backend.notify_all()
    }

    /// Approximate number of blocked waiters
    pub fn waiters(&self) -> usize {
        self.backend.waiters()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

impl Default for ConditionVariable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConditionVariable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionVariable")
            .field("backend", &self.backend_name())
            .field("waiters", &self.waiters())
            .finish()
    }
}
