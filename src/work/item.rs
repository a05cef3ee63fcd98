/*!
 * Work Items
 *
 * A unit of work submitted to a `WorkQueue`. The producer owns the payload
 * through an `Arc`; the queue only moves the item between states:
 *
 * ```text
 * Invalid --submit--> Queued --dequeue--> Running --> Complete
 *                        |                   |
 *                        +--> Cancelled <----+ (cancel requested while running)
 * ```
 *
 * Complete and Cancelled are terminal. Producers can block on a terminal
 * state with `wait`, which parks on the address of the status word.
 */

use parking_lot_core::{park, unpark_all, ParkResult, ParkToken, UnparkToken};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Submission order, assigned by the queue (first item is 1)
pub type WorkId = u64;

/// Index of the worker thread that dequeued an item
pub type SlotId = usize;

const NO_SLOT: usize = usize::MAX;

/// Work item lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum WorkStatus {
    /// Not yet submitted
    Invalid = 0,
    Queued = 1,
    Running = 2,
    Cancelled = 3,
    Complete = 4,
}

impl WorkStatus {
    #[inline]
    fn from_u8(value: u8) -> Self {
        match value {
            1 => WorkStatus::Queued,
            2 => WorkStatus::Running,
            3 => WorkStatus::Cancelled,
            4 => WorkStatus::Complete,
            _ => WorkStatus::Invalid,
        }
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkStatus::Cancelled | WorkStatus::Complete)
    }

    pub fn name(self) -> &'static str {
        match self {
            WorkStatus::Invalid => "invalid",
            WorkStatus::Queued => "queued",
            WorkStatus::Running => "running",
            WorkStatus::Cancelled => "cancelled",
            WorkStatus::Complete => "complete",
        }
    }
}

/// Work item carrying a producer payload
pub struct WorkItem<P> {
    payload: P,
    work_id: AtomicU64,
    slot_id: AtomicUsize,
    status: AtomicU8,
    cancel_requested: AtomicBool,
}

impl<P> WorkItem<P> {
    pub fn new(payload: P) -> Self {
        Self {
            payload,
            work_id: AtomicU64::new(0),
            slot_id: AtomicUsize::new(NO_SLOT),
            status: AtomicU8::new(WorkStatus::Invalid as u8),
            cancel_requested: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Submission sequence number, `None` before submission
    #[inline]
    pub fn work_id(&self) -> Option<WorkId> {
        match self.work_id.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    /// Worker that dequeued this item, `None` while still queued
    #[inline]
    pub fn slot_id(&self) -> Option<SlotId> {
        match self.slot_id.load(Ordering::Acquire) {
            NO_SLOT => None,
            slot => Some(slot),
        }
    }

    #[inline]
    pub fn status(&self) -> WorkStatus {
        WorkStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Cancelled, or cancellation requested while running
    ///
    /// Long-running `on_run` implementations poll this to stop early.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire) || self.status() == WorkStatus::Cancelled
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.status() == WorkStatus::Complete
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Request cancellation
    ///
    /// A queued (or never submitted) item becomes Cancelled at once and will
    /// never run. A running item is flagged and becomes Cancelled when its
    /// `on_run` returns. Returns `false` if the item was already terminal.
    pub fn cancel(&self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.cancel_requested.store(true, Ordering::Release);
        if self.transition(WorkStatus::Queued, WorkStatus::Cancelled)
            || self.transition(WorkStatus::Invalid, WorkStatus::Cancelled)
        {
            return true;
        }
        // Running: the worker settles the final status
        self.status() != WorkStatus::Complete
    }

    /// Block until the item reaches a terminal state
    ///
    /// Returns `false` if `timeout` elapses first. `None` waits indefinitely.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if self.is_terminal() {
                return true;
            }
            // SAFETY: the key is the address of our own status word, valid for
            // the duration of the park; the callbacks take no locks.
            let result = unsafe {
                park(
                    self.key(),
                    || !self.is_terminal(),
                    || {},
                    |_key, _was_last| {},
                    ParkToken(0),
                    deadline,
                )
            };
            if result == ParkResult::TimedOut {
                return self.is_terminal();
            }
        }
    }

    // =========================================================================
    // Queue-side transitions
    // =========================================================================

    /// Invalid -> Queued with a fresh work id
    pub(crate) fn enqueue(&self, work_id: WorkId) -> Result<(), WorkStatus> {
        match self.status.compare_exchange(
            WorkStatus::Invalid as u8,
            WorkStatus::Queued as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                self.work_id.store(work_id, Ordering::Release);
                Ok(())
            }
            Err(actual) => Err(WorkStatus::from_u8(actual)),
        }
    }

    /// Queued -> Running on `slot`; `false` if the item was cancelled first
    pub(crate) fn begin(&self, slot: SlotId) -> bool {
        self.slot_id.store(slot, Ordering::Release);
        self.transition(WorkStatus::Queued, WorkStatus::Running)
    }

    /// Running -> Complete, or Cancelled if cancellation was requested
    pub(crate) fn finish(&self) -> WorkStatus {
        let target = if self.cancel_requested.load(Ordering::Acquire) {
            WorkStatus::Cancelled
        } else {
            WorkStatus::Complete
        };
        self.transition(WorkStatus::Running, target);
        self.status()
    }

    /// Running -> Cancelled after `on_run` panicked
    pub(crate) fn abort(&self) {
        self.cancel_requested.store(true, Ordering::Release);
        self.transition(WorkStatus::Running, WorkStatus::Cancelled);
    }

    /// Queued (or never submitted) -> Cancelled, by the queue
    pub(crate) fn revoke(&self) -> bool {
        self.transition(WorkStatus::Queued, WorkStatus::Cancelled)
            || self.transition(WorkStatus::Invalid, WorkStatus::Cancelled)
    }

    fn transition(&self, from: WorkStatus, to: WorkStatus) -> bool {
        let swapped = self
            .status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if swapped && to.is_terminal() {
            // SAFETY: same key as `wait`.
            unsafe {
                unpark_all(self.key(), UnparkToken(0));
            }
        }
        swapped
    }

    #[inline]
    fn key(&self) -> usize {
        &self.status as *const AtomicU8 as usize
    }
}

impl<P: std::fmt::Debug> std::fmt::Debug for WorkItem<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItem")
            .field("work_id", &self.work_id())
            .field("slot_id", &self.slot_id())
            .field("status", &self.status())
            .field("payload", &self.payload)
            .finish()
    }
}
