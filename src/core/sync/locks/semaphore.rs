/*!
 * Counting Semaphore
 *
 * A permit counter guarded by one parking_lot mutex/condvar pair.
 */

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Counting semaphore
#[derive(Debug, Default)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    pub const fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Block until one permit is taken
    pub fn acquire(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.available.wait(&mut permits);
        }
        *permits -= 1;
    }

    /// Take a permit if one is available right now
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Block until a permit is taken or `timeout` elapses
    pub fn acquire_for(&self, timeout: Duration) -> bool {
        self.acquire_until(Instant::now() + timeout)
    }

    /// Block until a permit is taken or `deadline` passes
    pub fn acquire_until(&self, deadline: Instant) -> bool {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            if self.available.wait_until(&mut permits, deadline).timed_out() {
                break;
            }
        }
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Return `n` permits and wake up to `n` blocked acquirers
    pub fn release(&self, n: usize) {
        if n == 0 {
            return;
        }
        let mut permits = self.permits.lock();
        *permits += n;
        drop(permits);

        if n == 1 {
            self.available.notify_one();
        } else {
            self.available.notify_all();
        }
    }

    /// Permits currently available
    pub fn available(&self) -> usize {
        *self.permits.lock()
    }
}
