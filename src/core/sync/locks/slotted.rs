/*!
 * Slotted Locks
 *
 * Fixed arrays of independent locks addressed by slot index. Callers hash
 * their keys into the array; index `i` selects slot `i % capacity`, so many
 * logical resources share a bounded number of lock instances.
 *
 * `lock_all` / `unlock_all` walk the slots in ascending order. Any caller
 * holding more than one slot must take them in ascending order too, or two
 * multi-slot lockers can deadlock.
 */

use super::mutex::{Mutex, MutexKind};
use super::rwlock::{ReadWriteLock, RwLockBackend};
use super::spin::SpinLock;
use super::spin_rwlock::SpinReadWriteLock;
use super::traits::{Lockable, SharedLockable};
use crate::core::errors::{SyncError, SyncResult};
use crate::core::limits::DEFAULT_LOCK_SLOTS;
use crate::core::shard_manager::{ShardManager, WorkloadProfile};
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tracing::error;

/// Array of `capacity` independent locks
pub struct Slotted<L> {
    slots: Box<[L]>,
}

pub type SlottedMutex = Slotted<Mutex>;
pub type SlottedSpinLock = Slotted<SpinLock>;
pub type SlottedReadWriteLock = Slotted<ReadWriteLock>;
pub type SlottedSpinReadWriteLock = Slotted<SpinReadWriteLock>;

impl<L> Slotted<L> {
    /// Build `capacity` slots with `make`
    pub fn with_factory(capacity: usize, make: impl FnMut() -> L) -> SyncResult<Self> {
        if capacity == 0 {
            return Err(SyncError::InvalidCapacity(capacity));
        }
        let slots: Vec<L> = std::iter::repeat_with(make).take(capacity).collect();
        Ok(Self {
            slots: slots.into_boxed_slice(),
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slot index for an already-hashed integer
    #[inline]
    pub fn index(&self, idx: usize) -> usize {
        idx % self.slots.len()
    }

    /// Slot index for any hashable key
    #[inline]
    pub fn index_of<K: Hash + ?Sized>(&self, key: &K) -> usize {
        let mut hasher = ahash::AHasher::default();
        key.hash(&mut hasher);
        self.index(hasher.finish() as usize)
    }

    /// The lock serving index `idx`
    #[inline]
    pub fn slot(&self, idx: usize) -> &L {
        &self.slots[self.index(idx)]
    }
}

impl<L: Default> Slotted<L> {
    pub fn new(capacity: usize) -> SyncResult<Self> {
        Self::with_factory(capacity, L::default)
    }

    /// Capacity derived from CPU count and contention profile
    pub fn for_profile(profile: WorkloadProfile) -> Self {
        let capacity = ShardManager::slots(profile);
        let slots: Vec<L> = std::iter::repeat_with(L::default).take(capacity).collect();
        Self {
            slots: slots.into_boxed_slice(),
        }
    }
}

impl<L: Default> Default for Slotted<L> {
    /// `DEFAULT_LOCK_SLOTS` default-constructed locks
    fn default() -> Self {
        Self {
            slots: std::iter::repeat_with(L::default)
                .take(DEFAULT_LOCK_SLOTS)
                .collect(),
        }
    }
}

impl Slotted<Mutex> {
    pub fn with_kind(capacity: usize, kind: MutexKind) -> SyncResult<Self> {
        Self::with_factory(capacity, || Mutex::new(kind))
    }
}

impl Slotted<ReadWriteLock> {
    pub fn with_backend(capacity: usize, backend: RwLockBackend) -> SyncResult<Self> {
        Self::with_factory(capacity, || ReadWriteLock::with_backend(backend))
    }
}

impl<L: Lockable> Slotted<L> {
    #[inline]
    pub fn lock(&self, idx: usize) -> SyncResult<()> {
        self.slot(idx).acquire()
    }

    #[inline]
    pub fn try_lock(&self, idx: usize) -> bool {
        self.slot(idx).try_acquire()
    }

    pub fn try_lock_for(&self, idx: usize, timeout: Duration) -> bool {
        self.slot(idx).try_acquire_for(timeout)
    }

    #[inline]
    pub fn unlock(&self, idx: usize) -> SyncResult<()> {
        self.slot(idx).release()
    }

    /// Acquire every slot in ascending order
    ///
    /// On failure the slots taken so far are released again, highest first.
    pub fn lock_all(&self) -> SyncResult<()> {
        for (i, slot) in self.slots.iter().enumerate() {
            if let Err(err) = slot.acquire() {
                error!(slot = i, error = %err, "lock_all failed, rolling back");
                for held in self.slots[..i].iter().rev() {
                    // Rollback of locks this call just took cannot be refused
                    let _ = held.release();
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Release every slot in ascending order
    ///
    /// Keeps going after a failure and reports the first one.
    pub fn unlock_all(&self) -> SyncResult<()> {
        let mut first_err = None;
        for slot in self.slots.iter() {
            if let Err(err) = slot.release() {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl<L: SharedLockable> Slotted<L> {
    #[inline]
    pub fn lock_reader(&self, idx: usize) -> SyncResult<()> {
        self.slot(idx).acquire_shared()
    }

    #[inline]
    pub fn try_lock_reader(&self, idx: usize) -> bool {
        self.slot(idx).try_acquire_shared()
    }

    /// Writer lock on one slot (same as `lock`)
    #[inline]
    pub fn lock_writer(&self, idx: usize) -> SyncResult<()> {
        self.slot(idx).acquire()
    }

    #[inline]
    pub fn try_lock_writer(&self, idx: usize) -> bool {
        self.slot(idx).try_acquire()
    }
}

impl Slotted<ReadWriteLock> {
    pub fn promote(&self, idx: usize) -> bool {
        self.slot(idx).promote()
    }

    pub fn demote(&self, idx: usize) -> SyncResult<()> {
        self.slot(idx).demote()
    }
}

impl Slotted<SpinReadWriteLock> {
    pub fn promote(&self, idx: usize) -> bool {
        self.slot(idx).promote()
    }

    pub fn demote(&self, idx: usize) -> SyncResult<()> {
        self.slot(idx).demote()
    }
}

impl<L> std::fmt::Debug for Slotted<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slotted")
            .field("capacity", &self.capacity())
            .finish()
    }
}
