/*!
 * Reader/Writer Lock
 *
 * Native reader/writer lock over parking_lot's raw rwlock, falling back to
 * `SpinReadWriteLock` where a native lock is unavailable or unwanted.
 *
 * # Design: Enum Dispatch
 *
 * The backend is chosen once at construction; every call is a `match` on a
 * two-variant enum, no vtable.
 */

use super::spin_rwlock::SpinReadWriteLock;
use super::traits::{Lockable, SharedLockable};
use crate::core::errors::{SyncError, SyncResult};
use parking_lot::lock_api::{
    RawRwLock as RawRwLockApi, RawRwLockDowngrade, RawRwLockTimed, RawRwLockUpgrade,
    RawRwLockUpgradeDowngrade,
};
use parking_lot::RawRwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::error;

/// Which implementation backs a `ReadWriteLock`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RwLockBackend {
    #[default]
    Native,
    Spin,
}

/// parking_lot raw rwlock plus the bookkeeping that `unlock`, `promote` and
/// `demote` need
struct NativeRwLock {
    raw: RawRwLock,
    readers: AtomicUsize,
    writer: AtomicBool,
}

impl NativeRwLock {
    const fn new() -> Self {
        Self {
            raw: <RawRwLock as RawRwLockApi>::INIT,
            readers: AtomicUsize::new(0),
            writer: AtomicBool::new(false),
        }
    }

    fn lock_reader(&self) {
        self.raw.lock_shared();
        self.readers.fetch_add(1, Ordering::AcqRel);
    }

    fn try_lock_reader(&self) -> bool {
        if self.raw.try_lock_shared() {
            self.readers.fetch_add(1, Ordering::AcqRel);
            true
        } else {
            false
        }
    }

    fn lock_writer(&self) {
        self.raw.lock_exclusive();
        self.writer.store(true, Ordering::Release);
    }

    fn try_lock_writer(&self) -> bool {
        if self.raw.try_lock_exclusive() {
            self.writer.store(true, Ordering::Release);
            true
        } else {
            false
        }
    }

    fn try_lock_writer_for(&self, timeout: Duration) -> bool {
        if self.raw.try_lock_exclusive_for(timeout) {
            self.writer.store(true, Ordering::Release);
            true
        } else {
            false
        }
    }

    fn unlock(&self) -> SyncResult<()> {
        if self.writer.swap(false, Ordering::AcqRel) {
            // SAFETY: the writer flag is only set while the exclusive lock is held.
            unsafe { self.raw.unlock_exclusive() };
            return Ok(());
        }

        let released = self
            .readers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if !released {
            error!(kind = "native_rw", "unlock of free lock");
            return Err(SyncError::NotLocked("native_rw"));
        }
        // SAFETY: a reader count was outstanding, so a shared lock is held.
        unsafe { self.raw.unlock_shared() };
        Ok(())
    }

    fn promote(&self) -> bool {
        if self.readers.load(Ordering::Acquire) != 1 {
            return false;
        }
        // Upgradable hold: writers and other promoters stay out, readers may
        // still enter
        if !self.raw.try_lock_upgradable() {
            return false;
        }
        // SAFETY: the caller holds a shared lock, now covered by the
        // upgradable hold taken above.
        unsafe { self.raw.unlock_shared() };

        // SAFETY: the upgradable lock is held by this thread.
        if unsafe { self.raw.try_upgrade() } {
            self.readers.fetch_sub(1, Ordering::AcqRel);
            self.writer.store(true, Ordering::Release);
            true
        } else {
            // Another reader got in: go back to a plain shared hold
            // SAFETY: the upgradable lock is still held.
            unsafe { self.raw.downgrade_upgradable() };
            false
        }
    }

    fn demote(&self) -> SyncResult<()> {
        if !self.writer.load(Ordering::Acquire) {
            error!(kind = "native_rw", "demote without writer lock");
            return Err(SyncError::NotWriter);
        }
        self.readers.fetch_add(1, Ordering::AcqRel);
        self.writer.store(false, Ordering::Release);
        // SAFETY: the writer flag proved the exclusive lock is held.
        unsafe { self.raw.downgrade() };
        Ok(())
    }

    fn readers(&self) -> usize {
        self.readers.load(Ordering::Acquire)
    }

    fn is_write_locked(&self) -> bool {
        self.writer.load(Ordering::Acquire)
    }
}

enum Backend {
    Native(NativeRwLock),
    Spin(SpinReadWriteLock),
}

/// Reader/writer lock with promote/demote
///
/// `unlock` releases whichever mode the caller holds.
pub struct ReadWriteLock {
    backend: Backend,
}

impl ReadWriteLock {
    /// Native-backed lock
    pub const fn new() -> Self {
        Self {
            backend: Backend::Native(NativeRwLock::new()),
        }
    }

    pub const fn with_backend(backend: RwLockBackend) -> Self {
        match backend {
            RwLockBackend::Native => Self::new(),
            RwLockBackend::Spin => Self {
                backend: Backend::Spin(SpinReadWriteLock::new()),
            },
        }
    }

    pub fn backend(&self) -> RwLockBackend {
        match self.backend {
            Backend::Native(_) => RwLockBackend::Native,
            Backend::Spin(_) => RwLockBackend::Spin,
        }
    }

    pub fn lock_reader(&self) {
        match &self.backend {
            Backend::Native(l) => l.lock_reader(),
            Backend::Spin(l) => l.lock_reader(),
        }
    }

    pub fn try_lock_reader(&self) -> bool {
        match &self.backend {
            Backend::Native(l) => l.try_lock_reader(),
            Backend::Spin(l) => l.try_lock_reader(),
        }
    }

    pub fn lock_writer(&self) {
        match &self.backend {
            Backend::Native(l) => l.lock_writer(),
            Backend::Spin(l) => l.lock_writer(),
        }
    }

    pub fn try_lock_writer(&self) -> bool {
        match &self.backend {
            Backend::Native(l) => l.try_lock_writer(),
            Backend::Spin(l) => l.try_lock_writer(),
        }
    }

    pub fn try_lock_writer_for(&self, timeout: Duration) -> bool {
        match &self.backend {
            Backend::Native(l) => l.try_lock_writer_for(timeout),
            Backend::Spin(l) => l.try_lock_writer_for(timeout),
        }
    }

    pub fn unlock(&self) -> SyncResult<()> {
        match &self.backend {
            Backend::Native(l) => l.unlock(),
            Backend::Spin(l) => l.unlock(),
        }
    }

    /// Upgrade a sole read lock to the writer lock
    ///
    /// Returns `false` when other readers are present or a writer is pending;
    /// the caller still holds its read lock and no writer has run meanwhile.
    pub fn promote(&self) -> bool {
        match &self.backend {
            Backend::Native(l) => l.promote(),
            Backend::Spin(l) => l.promote(),
        }
    }

    /// Downgrade the writer lock to a single read lock
    pub fn demote(&self) -> SyncResult<()> {
        match &self.backend {
            Backend::Native(l) => l.demote(),
            Backend::Spin(l) => l.demote(),
        }
    }

    pub fn readers(&self) -> usize {
        match &self.backend {
            Backend::Native(l) => l.readers(),
            Backend::Spin(l) => l.readers(),
        }
    }

    pub fn is_write_locked(&self) -> bool {
        match &self.backend {
            Backend::Native(l) => l.is_write_locked(),
            Backend::Spin(l) => l.is_write_locked(),
        }
    }
}

impl Default for ReadWriteLock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReadWriteLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadWriteLock")
            .field("backend", &self.backend())
            .field("readers", &self.readers())
            .field("writer", &self.is_write_locked())
            .finish()
    }
}

impl Lockable for ReadWriteLock {
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
        match self.backend {
            Backend::Native(_) => "native_rw",
            Backend::Spin(_) => "spin_rw",
        }
    }
}

impl SharedLockable for ReadWriteLock {
    fn acquire_shared(&self) -> SyncResult<()> {
        self.lock_reader();
        Ok(())
    }

    fn try_acquire_shared(&self) -> bool {
        self.try_lock_reader()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn both() -> [ReadWriteLock; 2] {
        [
            ReadWriteLock::with_backend(RwLockBackend::Native),
            ReadWriteLock::with_backend(RwLockBackend::Spin),
        ]
    }

    #[test]
    fn test_shared_then_exclusive() {
        for lock in both() {
            lock.lock_reader();
            assert!(lock.try_lock_reader());
            assert_eq!(lock.readers(), 2);
            assert!(!lock.try_lock_writer());

            lock.unlock().unwrap();
            lock.unlock().unwrap();
            assert!(lock.try_lock_writer());
            assert!(lock.is_write_locked());
            lock.unlock().unwrap();
            assert!(!lock.is_write_locked());
        }
    }

    #[test]
    fn test_promote_and_demote() {
        for lock in both() {
            lock.lock_reader();
            assert!(lock.promote(), "{:?}", lock.backend());
            assert!(lock.is_write_locked());

            lock.demote().unwrap();
            assert_eq!(lock.readers(), 1);
            assert!(!lock.is_write_locked());
            lock.unlock().unwrap();
        }
    }

    #[test]
    fn test_promote_refused_with_two_readers() {
        for lock in both() {
            lock.lock_reader();
            lock.lock_reader();
            assert!(!lock.promote());
            assert_eq!(lock.readers(), 2);
            lock.unlock().unwrap();
            lock.unlock().unwrap();
        }
    }

    #[test]
    fn test_unlock_free_is_reported() {
        for lock in both() {
            assert!(matches!(lock.unlock(), Err(SyncError::NotLocked(_))));
        }
    }

    #[test]
    fn test_writer_excludes_readers_across_threads() {
        let lock = Arc::new(ReadWriteLock::new());
        lock.lock_writer();

        let other = lock.clone();
        let got = thread::spawn(move || other.try_lock_reader()).join().unwrap();
        assert!(!got);

        lock.unlock().unwrap();
        let other = lock.clone();
        let got = thread::spawn(move || {
            let ok = other.try_lock_reader();
            other.unlock().unwrap();
            ok
        })
        .join()
        .unwrap();
        assert!(got);
    }

    #[test]
    fn test_failed_promote_lets_no_writer_through() {
        for _ in 0..200 {
            let lock = Arc::new(ReadWriteLock::new());
            let wrote = Arc::new(AtomicBool::new(false));
            lock.lock_reader();

            let writer = {
                let lock = lock.clone();
                let wrote = wrote.clone();
                thread::spawn(move || {
                    lock.lock_writer();
                    wrote.store(true, Ordering::SeqCst);
                    lock.unlock().unwrap();
                })
            };
            thread::yield_now();

            let promoted = lock.promote();
            assert!(!wrote.load(Ordering::SeqCst));
            if promoted {
                assert!(lock.is_write_locked());
                assert_eq!(lock.readers(), 0);
            } else {
                assert_eq!(lock.readers(), 1);
                assert!(!lock.is_write_locked());
            }
            lock.unlock().unwrap();
            writer.join().unwrap();
            assert!(wrote.load(Ordering::SeqCst));
        }
    }

    #[test]
    fn test_promote_races_with_readers() {
        let lock = Arc::new(ReadWriteLock::new());
        let reader = {
            let lock = lock.clone();
            thread::spawn(move || {
                for _ in 0..2000 {
                    lock.lock_reader();
                    lock.unlock().unwrap();
                }
            })
        };

        for _ in 0..2000 {
            lock.lock_reader();
            if lock.promote() {
                assert!(lock.is_write_locked());
                lock.demote().unwrap();
            }
            assert!(!lock.is_write_locked());
            lock.unlock().unwrap();
        }
        reader.join().unwrap();
        assert_eq!(lock.readers(), 0);
        assert!(!lock.is_write_locked());
    }
}
