/*!
 * Futex-Style Wait Backend
 *
 * Uses parking_lot_core to park on the address of a sequence word. On Linux
 * this maps onto futex syscalls.
 *
 * # Design
 *
 * A waiter records the sequence value while the caller's lock is still held.
 * Every notify bumps the sequence before unparking, so a notify that lands
 * between lock release and `park` makes the park's validation fail and the
 * waiter returns at once. No wakeup is lost.
 *
 * The flip side: `notify_one` invalidates every ticket taken before it, so
 * each waiter that has prepared but not yet parked also returns. One signal
 * may therefore release more than one waiter; callers re-check their
 * predicate as they would after any spurious wakeup.
 */

use super::traits::{WaitPrimitive, WaitTicket};
use parking_lot_core::{park, unpark_all, unpark_one, ParkResult, ParkToken, UnparkToken};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Sequence-word wait backend
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct FutexWait {
    sequence: AtomicUsize,
    waiters: AtomicUsize,
}

impl FutexWait {
    pub const fn new() -> Self {
        Self {
            sequence: AtomicUsize::new(0),
            waiters: AtomicUsize::new(0),
        }
    }

    /// Stable parking address
    #[inline]
    fn key(&self) -> usize {
        &self.sequence as *const AtomicUsize as usize
    }
}

impl WaitPrimitive for FutexWait {
    fn prepare(&self) -> WaitTicket {
        self.waiters.fetch_add(1, Ordering::SeqCst);
        WaitTicket(self.sequence.load(Ordering::SeqCst))
    }

    fn block(&self, ticket: WaitTicket, deadline: Option<Instant>) -> bool {
        // SAFETY: the key is the address of our own sequence word, which
        // outlives the park; the callbacks take no parking_lot locks.
        let result = unsafe {
            park(
                self.key(),
                || self.sequence.load(Ordering::SeqCst) == ticket.0,
                || {},
                |_key, _was_last| {},
                ParkToken(0),
                deadline,
            )
        };

        self.waiters.fetch_sub(1, Ordering::SeqCst);

        match result {
            ParkResult::Unparked(_) => true,
            // Sequence moved before we parked: a notify already happened
            ParkResult::Invalid => true,
            ParkResult::TimedOut => false,
        }
    }

    fn cancel(&self, _ticket: WaitTicket) {
        self.waiters.fetch_sub(1, Ordering::SeqCst);
    }

    /// Unpark one parked waiter
    ///
    /// Waiters between `prepare` and `park` also return, so more than one
    /// caller can observe this wakeup.
    fn notify_one(&self) -> usize {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        if self.waiters.load(Ordering::SeqCst) == 0 {
            return 0;
        }
        // SAFETY: same key as `block`; the callback takes no locks.
        let result = unsafe { unpark_one(self.key(), |_| UnparkToken(0)) };
        result.unparked_threads
    }

    fn notify_all(&self) -> usize {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        if self.waiters.load(Ordering::SeqCst) == 0 {
            return 0;
        }
        // SAFETY: same key as `block`.
        unsafe { unpark_all(self.key(), UnparkToken(0)) }
    }

    fn waiters(&self) -> usize {
        self.waiters.load(Ordering::Relaxed)
    }

    fn name(&self) -> &'static str {
        "futex"
    }
}
