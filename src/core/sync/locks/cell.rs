/*!
 * Mutex-Protected Data
 *
 * `MutexCell<T>` pairs a Fast `Mutex` with the data it protects. The guard
 * derefs to `T` and can wait on a `ConditionVariable`, releasing and
 * reacquiring the same mutex.
 */

use super::mutex::Mutex;
use crate::core::errors::OrFatal;
use crate::core::sync::wait::ConditionVariable;
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

/// Data guarded by a `Mutex`
pub struct MutexCell<T> {
    mutex: Mutex,
    data: UnsafeCell<T>,
}

// SAFETY: `data` is only reachable through a guard, which holds `mutex`.
unsafe impl<T: Send> Send for MutexCell<T> {}
unsafe impl<T: Send> Sync for MutexCell<T> {}

impl<T> MutexCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            mutex: Mutex::fast(),
            data: UnsafeCell::new(value),
        }
    }

    /// Block until the data is ours
    pub fn lock(&self) -> MutexCellGuard<'_, T> {
        self.mutex.lock().or_fatal("MutexCell::lock");
        MutexCellGuard { cell: self }
    }

    pub fn try_lock(&self) -> Option<MutexCellGuard<'_, T>> {
        self.mutex
            .try_lock()
            .then(|| MutexCellGuard { cell: self })
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

impl<T: Default> Default for MutexCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Scoped access to a `MutexCell`
pub struct MutexCellGuard<'a, T> {
    cell: &'a MutexCell<T>,
}

impl<T> MutexCellGuard<'_, T> {
    /// Release the mutex, block on `cv`, reacquire
    ///
    /// `&mut self` guarantees no borrow of the data survives the wait.
    /// Returns `false` when `timeout` elapsed without a wake.
    pub fn wait(&mut self, cv: &ConditionVariable, timeout: Option<Duration>) -> bool {
        match timeout {
            Some(timeout) => cv
                .wait_for(&self.cell.mutex, timeout)
                .or_fatal("MutexCellGuard::wait"),
            None => {
                cv.wait(&self.cell.mutex).or_fatal("MutexCellGuard::wait");
                true
            }
        }
    }
}

impl<T> Deref for MutexCellGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard holds the mutex.
        unsafe { &*self.cell.data.get() }
    }
}

impl<T> DerefMut for MutexCellGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard holds the mutex and is borrowed uniquely.
        unsafe { &mut *self.cell.data.get() }
    }
}

impl<T> Drop for MutexCellGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(err) = self.cell.mutex.unlock() {
            tracing::error!(error = %err, "MutexCell guard failed to unlock");
        }
    }
}
