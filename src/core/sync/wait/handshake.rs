/*!
 * Counted Handshake Wait Backend
 *
 * Condition-variable emulation for platforms without a native one, built from
 * two counting semaphores:
 *
 * - `wake`: credits. A waiter blocks until it takes one.
 * - `done`: acknowledgements. A notifier blocks until every credit it handed
 *   out has been taken, so it never returns before its waiters observed the
 *   wake.
 *
 * `waiting` counts registrations that have not yet been turned into credits.
 * Registrations and credits are interchangeable between waiters: a waiter
 * whose wait times out either withdraws one registration, or, when none are
 * left, takes the credit that was issued in its place.
 */

use super::traits::{WaitPrimitive, WaitTicket};
use crate::core::sync::locks::Semaphore;
use parking_lot::Mutex;
use std::time::Instant;

/// Semaphore handshake wait backend
#[derive(Debug, Default)]
pub struct HandshakeWait {
    /// Registered waiters not yet granted a credit
    waiting: Mutex<usize>,
    wake: Semaphore,
    done: Semaphore,
}

impl HandshakeWait {
    pub const fn new() -> Self {
        Self {
            waiting: Mutex::new(0),
            wake: Semaphore::new(0),
            done: Semaphore::new(0),
        }
    }

    /// Settle a registration that stopped waiting without a credit
    ///
    /// Returns `true` when a credit had already been issued for it, in which
    /// case the credit is consumed and acknowledged.
    fn withdraw(&self) -> bool {
        {
            let mut waiting = self.waiting.lock();
            if *waiting > 0 {
                *waiting -= 1;
                return false;
            }
        }

        // Our registration became a credit; it is in `wake` or about to be
        self.wake.acquire();
        self.done.release(1);
        true
    }

    /// Hand out `n` credits and wait for all `n` acknowledgements
    fn grant(&self, n: usize) {
        self.wake.release(n);
        for _ in 0..n {
            self.done.acquire();
        }
    }
}

impl WaitPrimitive for HandshakeWait {
    fn prepare(&self) -> WaitTicket {
        *self.waiting.lock() += 1;
        WaitTicket(0)
    }

    fn block(&self, _ticket: WaitTicket, deadline: Option<Instant>) -> bool {
        let credited = match deadline {
            Some(deadline) => self.wake.acquire_until(deadline),
            None => {
                self.wake.acquire();
                true
            }
        };

        if credited {
            self.done.release(1);
            true
        } else {
            self.withdraw()
        }
    }

    fn cancel(&self, _ticket: WaitTicket) {
        self.withdraw();
    }

    fn notify_one(&self) -> usize {
        {
            let mut waiting = self.waiting.lock();
            if *waiting == 0 {
                return 0;
            }
            *waiting -= 1;
        }
        self.grant(1);
        1
    }

    fn notify_all(&self) -> usize {
        let n = std::mem::take(&mut *self.waiting.lock());
        if n > 0 {
            self.grant(n);
        }
        n
    }

    fn waiters(&self) -> usize {
        *self.waiting.lock()
    }

    fn name(&self) -> &'static str {
        "handshake"
    }
}
