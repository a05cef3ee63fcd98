/*!
 * Scoped Lock Guards
 *
 * Each guard borrows its lock, acquires it on construction and releases it
 * exactly once: either through `Guard::release` or on drop.
 */

use super::traits::{Guard, GuardDrop};
use super::{GuardError, GuardMetadata, GuardResult};
use crate::core::sync::locks::{Lockable, SharedLockable, Slotted};
use std::time::Duration;

/// Exclusive hold of any `Lockable`
pub struct ScopedLock<'a, L: Lockable + ?Sized> {
    lock: &'a L,
    metadata: GuardMetadata,
    held: bool,
}

impl<'a, L: Lockable + ?Sized> ScopedLock<'a, L> {
    /// Block until `lock` is acquired
    pub fn new(lock: &'a L) -> GuardResult<Self> {
        lock.acquire()?;
        Ok(Self::held(lock))
    }

    /// Acquire without blocking
    pub fn try_new(lock: &'a L) -> Option<Self> {
        lock.try_acquire().then(|| Self::held(lock))
    }

    /// Acquire within `timeout`
    pub fn try_new_for(lock: &'a L, timeout: Duration) -> Option<Self> {
        lock.try_acquire_for(timeout).then(|| Self::held(lock))
    }

    fn held(lock: &'a L) -> Self {
        Self {
            lock,
            metadata: GuardMetadata::new(lock.kind_name()),
            held: true,
        }
    }

    /// The guarded lock, e.g. to wait on a condition variable with it
    #[inline]
    pub fn lock(&self) -> &'a L {
        self.lock
    }
}

impl<L: Lockable + ?Sized> Guard for ScopedLock<'_, L> {
    fn resource_type(&self) -> &'static str {
        "scoped_lock"
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.held
    }

    fn release(&mut self) -> GuardResult<()> {
        if !self.held {
            return Err(GuardError::AlreadyReleased);
        }
        self.held = false;
        self.lock.release()?;
        Ok(())
    }
}

impl<L: Lockable + ?Sized> Drop for ScopedLock<'_, L> {
    fn drop(&mut self) {
        self.on_drop();
    }
}

/// Shared hold of a reader/writer lock
pub struct ScopedReadLock<'a, L: SharedLockable + ?Sized> {
    lock: &'a L,
    metadata: GuardMetadata,
    held: bool,
}

impl<'a, L: SharedLockable + ?Sized> ScopedReadLock<'a, L> {
    pub fn new(lock: &'a L) -> GuardResult<Self> {
        lock.acquire_shared()?;
        Ok(Self::held(lock))
    }

    pub fn try_new(lock: &'a L) -> Option<Self> {
        lock.try_acquire_shared().then(|| Self::held(lock))
    }

    fn held(lock: &'a L) -> Self {
        Self {
            lock,
            metadata: GuardMetadata::new(lock.kind_name()),
            held: true,
        }
    }
}

impl<L: SharedLockable + ?Sized> Guard for ScopedReadLock<'_, L> {
    fn resource_type(&self) -> &'static str {
        "scoped_read_lock"
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.held
    }

    fn release(&mut self) -> GuardResult<()> {
        if !self.held {
            return Err(GuardError::AlreadyReleased);
        }
        self.held = false;
        self.lock.release()?;
        Ok(())
    }
}

impl<L: SharedLockable + ?Sized> Drop for ScopedReadLock<'_, L> {
    fn drop(&mut self) {
        self.on_drop();
    }
}

/// Exclusive hold of a reader/writer lock
pub struct ScopedWriteLock<'a, L: SharedLockable + ?Sized> {
    lock: &'a L,
    metadata: GuardMetadata,
    held: bool,
}

impl<'a, L: SharedLockable + ?Sized> ScopedWriteLock<'a, L> {
    pub fn new(lock: &'a L) -> GuardResult<Self> {
        lock.acquire()?;
        Ok(Self::held(lock))
    }

    pub fn try_new(lock: &'a L) -> Option<Self> {
        lock.try_acquire().then(|| Self::held(lock))
    }

    pub fn try_new_for(lock: &'a L, timeout: Duration) -> Option<Self> {
        lock.try_acquire_for(timeout).then(|| Self::held(lock))
    }

    fn held(lock: &'a L) -> Self {
        Self {
            lock,
            metadata: GuardMetadata::new(lock.kind_name()),
            held: true,
        }
    }
}

impl<L: SharedLockable + ?Sized> Guard for ScopedWriteLock<'_, L> {
    fn resource_type(&self) -> &'static str {
        "scoped_write_lock"
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.held
    }

    fn release(&mut self) -> GuardResult<()> {
        if !self.held {
            return Err(GuardError::AlreadyReleased);
        }
        self.held = false;
        self.lock.release()?;
        Ok(())
    }
}

impl<L: SharedLockable + ?Sized> Drop for ScopedWriteLock<'_, L> {
    fn drop(&mut self) {
        self.on_drop();
    }
}

/// Exclusive hold of one slot of a `Slotted` array
pub struct ScopedSlot<'a, L: Lockable> {
    slots: &'a Slotted<L>,
    index: usize,
    metadata: GuardMetadata,
    held: bool,
}

impl<'a, L: Lockable> ScopedSlot<'a, L> {
    /// Lock slot `idx % capacity`
    pub fn new(slots: &'a Slotted<L>, idx: usize) -> GuardResult<Self> {
        let index = slots.index(idx);
        slots.lock(index)?;
        Ok(Self {
            slots,
            index,
            metadata: GuardMetadata::new("slot").with_slot(index),
            held: true,
        })
    }

    /// Slot actually locked after reduction modulo capacity
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<L: Lockable> Guard for ScopedSlot<'_, L> {
    fn resource_type(&self) -> &'static str {
        "scoped_slot"
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.held
    }

    fn release(&mut self) -> GuardResult<()> {
        if !self.held {
            return Err(GuardError::AlreadyReleased);
        }
        self.held = false;
        self.slots.unlock(self.index)?;
        Ok(())
    }
}

impl<L: Lockable> Drop for ScopedSlot<'_, L> {
    fn drop(&mut self) {
        self.on_drop();
    }
}

/// Exclusive hold of every slot of a `Slotted` array
pub struct ScopedAllSlots<'a, L: Lockable> {
    slots: &'a Slotted<L>,
    metadata: GuardMetadata,
    held: bool,
}

impl<'a, L: Lockable> ScopedAllSlots<'a, L> {
    /// Lock all slots in ascending order
    pub fn new(slots: &'a Slotted<L>) -> GuardResult<Self> {
        slots.lock_all()?;
        Ok(Self {
            slots,
            metadata: GuardMetadata::new("all_slots"),
            held: true,
        })
    }
}

impl<L: Lockable> Guard for ScopedAllSlots<'_, L> {
    fn resource_type(&self) -> &'static str {
        "scoped_all_slots"
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.held
    }

    fn release(&mut self) -> GuardResult<()> {
        if !self.held {
            return Err(GuardError::AlreadyReleased);
        }
        self.held = false;
        self.slots.unlock_all()?;
        Ok(())
    }
}

impl<L: Lockable> Drop for ScopedAllSlots<'_, L> {
    fn drop(&mut self) {
        self.on_drop();
    }
}
