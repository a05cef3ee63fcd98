/*!
 * Spin Backoff
 *
 * Escalating wait used by every spin primitive under contention:
 *
 * 1. **Spin phase**: `2^n` `spin_loop()` hints, doubling per step
 * 2. **Yield phase**: `yield_now()` to let the holder run
 * 3. **Nap phase**: fixed `sleep` to bound CPU burn
 *
 * `yield_now` and `nap` are free functions with no state, callable from any
 * thread at any time. `Backoff` only counts how far a single waiter has
 * escalated and lives on that waiter's stack.
 */

use super::config::SyncConfig;
use crate::core::limits::{BACKOFF_NAP, BACKOFF_SPIN_LIMIT, BACKOFF_YIELD_LIMIT};
use std::thread;
use std::time::{Duration, Instant};

/// Give the rest of this time slice to another runnable thread
#[inline]
pub fn yield_now() {
    thread::yield_now();
}

/// Sleep for the default nap length
#[inline]
pub fn nap() {
    thread::sleep(BACKOFF_NAP);
}

/// Per-waiter escalation counter
#[derive(Debug, Clone)]
pub struct Backoff {
    step: u32,
    spin_limit: u32,
    yield_limit: u32,
    nap: Duration,
}

impl Backoff {
    /// Backoff with the compiled-in thresholds
    #[inline]
    pub const fn new() -> Self {
        Self {
            step: 0,
            spin_limit: BACKOFF_SPIN_LIMIT,
            yield_limit: BACKOFF_YIELD_LIMIT,
            nap: BACKOFF_NAP,
        }
    }

    /// Backoff with thresholds taken from a `SyncConfig`
    pub fn with_config(config: &SyncConfig) -> Self {
        Self {
            step: 0,
            spin_limit: config.spin_limit,
            yield_limit: config.yield_limit.max(config.spin_limit),
            nap: config.nap,
        }
    }

    /// Wait a little longer than last time
    #[inline]
    pub fn snooze(&mut self) {
        if self.step < self.spin_limit {
            for _ in 0..(1u32 << self.step) {
                std::hint::spin_loop();
            }
        } else if self.step < self.yield_limit {
            yield_now();
        } else {
            thread::sleep(self.nap);
        }

        self.step = self.step.saturating_add(1);
    }

    /// Like `snooze`, but never sleeps past `deadline`
    #[inline]
    pub fn snooze_until(&mut self, deadline: Instant) {
        if self.step >= self.yield_limit {
            let remaining = deadline.saturating_duration_since(Instant::now());
            thread::sleep(self.nap.min(remaining));
            self.step = self.step.saturating_add(1);
        } else {
            self.snooze();
        }
    }

    /// True once this waiter has escalated to sleeping
    #[inline]
    pub fn is_napping(&self) -> bool {
        self.step >= self.yield_limit
    }

    /// Start over from the spin phase
    #[inline]
    pub fn reset(&mut self) {
        self.step = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
