/*!
 * Wait Traits
 *
 * Two seams:
 *
 * - `WaitPrimitive`: the backend under `ConditionVariable`. A waiter registers
 *   while it still holds the caller's lock, releases the lock, then blocks.
 *   Any notify issued after registration must end the block.
 * - `KeyedWait`: wait/wake on integer-like keys, implemented by
 *   `ConditionVariableMap`.
 */

use std::time::{Duration, Instant};

/// Result of a wake operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeResult {
    /// Successfully woke N waiters (N >= 1)
    Woken(usize),
    /// No waiters were waiting
    NoWaiters,
}

impl WakeResult {
    #[inline(always)]
    pub fn from_count(n: usize) -> Self {
        if n == 0 {
            WakeResult::NoWaiters
        } else {
            WakeResult::Woken(n)
        }
    }

    /// Check if any waiters were woken
    #[inline(always)]
    pub fn is_woken(&self) -> bool {
        matches!(self, WakeResult::Woken(_))
    }

    /// Get number of woken waiters (0 if none)
    #[inline(always)]
    pub fn count(&self) -> usize {
        match self {
            WakeResult::Woken(n) => *n,
            WakeResult::NoWaiters => 0,
        }
    }
}

/// Opaque registration handed from `prepare` to `block`/`cancel`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTicket(pub(crate) usize);

/// Backend for a condition variable
///
/// Implementations must be:
/// - **Thread-safe**: callable from any thread
/// - **Lossless**: a notify after `prepare` wakes that waiter or another
///   registered one; never none
pub trait WaitPrimitive: Send + Sync {
    /// Register the caller as a waiter (caller's lock still held)
    fn prepare(&self) -> WaitTicket;

    /// Block until notified or `deadline` passes
    ///
    /// Returns `true` if woken, `false` on timeout. Spurious `true` is allowed.
    fn block(&self, ticket: WaitTicket, deadline: Option<Instant>) -> bool;

    /// Withdraw a registration that will never block
    fn cancel(&self, ticket: WaitTicket);

    /// Wake at most one registered waiter, returning how many were woken
    fn notify_one(&self) -> usize;

    /// Wake every registered waiter, returning how many were woken
    fn notify_all(&self) -> usize;

    /// Approximate number of registered waiters (diagnostics)
    fn waiters(&self) -> usize;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// Wait/wake keyed by an integer-like value
pub trait KeyedWait<K>: Send + Sync
where
    K: Eq + std::hash::Hash + Copy + Send + Sync,
{
    /// Wait for `key`; `true` if woken, `false` on timeout
    fn wait(&self, key: K, timeout: Option<Duration>) -> bool;

    /// Wake one waiter on `key`
    fn wake_one(&self, key: K) -> WakeResult;

    /// Wake every waiter on `key`
    fn wake_all(&self, key: K) -> WakeResult;

    /// Approximate count of waiters for a key (diagnostics)
    fn waiter_count(&self, key: K) -> usize;

    fn name(&self) -> &'static str;
}
