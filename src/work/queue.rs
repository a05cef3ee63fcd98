/*!
 * Work Queue
 *
 * A fixed pool of OS threads draining an unbounded FIFO of `WorkItem`s.
 *
 * # Architecture
 *
 * - **One lock**: the FIFO, its sequence counter and the shutdown flags live
 *   in a single `MutexCell`
 * - **One condition**: idle workers wait on `not_empty` with a timeout, so the
 *   shutdown flag is re-checked even when no work arrives
 * - **Run outside the lock**: a worker pops an item, drops the lock, then
 *   calls `Runnable::on_run`
 *
 * # Lifecycle
 *
 * ```text
 * Unstarted --start--> Running --cancel/finish/exit--> Draining --> Stopped
 * ```
 *
 * `cancel` revokes everything still queued; `finish` lets queued work run to
 * completion. Both then stop and join the workers. Only the caller that moves
 * the queue to Draining performs the shutdown; any concurrent or later
 * terminal call blocks until the queue is Stopped.
 *
 * Liveness is tracked by a counter each worker holds for its whole loop, not
 * by the join handles, which `wait` may be consuming at the same moment.
 * Terminal calls must not be made from inside `Runnable::on_run`.
 */

use super::config::WorkQueueConfig;
use super::item::{SlotId, WorkId, WorkItem, WorkStatus};
use super::traits::Runnable;
use crate::core::errors::{SyncError, SyncResult};
use crate::core::shard_manager::ShardManager;
use crate::core::sync::locks::MutexCell;
use crate::core::sync::wait::ConditionVariable;
use crate::monitoring::WorkSpan;
use parking_lot_core::{park, unpark_all, ParkToken, UnparkToken};
use serde::Serialize;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Work queue lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum QueueState {
    Unstarted = 0,
    Running = 1,
    Draining = 2,
    Stopped = 3,
}

impl QueueState {
    #[inline]
    fn from_u8(value: u8) -> Self {
        match value {
            1 => QueueState::Running,
            2 => QueueState::Draining,
            3 => QueueState::Stopped,
            _ => QueueState::Unstarted,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            QueueState::Unstarted => "unstarted",
            QueueState::Running => "running",
            QueueState::Draining => "draining",
            QueueState::Stopped => "stopped",
        }
    }
}

/// How queued items are treated while draining
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drain {
    /// Revoke queued items
    Cancel,
    /// Let workers run queued items
    Complete,
}

/// State guarded by the queue lock
struct Fifo<P> {
    items: VecDeque<Arc<WorkItem<P>>>,
    sequence: WorkId,
    /// No further submissions
    closed: bool,
    /// Workers exit at their next check
    done: bool,
}

struct Shared<R: Runnable> {
    runner: R,
    config: WorkQueueConfig,
    fifo: MutexCell<Fifo<R::Payload>>,
    not_empty: ConditionVariable,
    /// Workers spawned and not yet out of `worker_loop`
    live: AtomicUsize,
}

/// Counts one worker as live until dropped, even if a callback panics
struct LiveWorker<'a>(&'a AtomicUsize);

impl Drop for LiveWorker<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<R: Runnable> Shared<R> {
    /// Next item for a worker, `None` once shutdown is requested
    fn next_item(&self) -> Option<Arc<WorkItem<R::Payload>>> {
        let mut fifo = self.fifo.lock();
        loop {
            if fifo.done {
                return None;
            }
            if let Some(item) = fifo.items.pop_front() {
                return Some(item);
            }
            fifo.wait(&self.not_empty, Some(self.config.idle_wait));
        }
    }

    fn worker_loop(&self, slot: SlotId) {
        let _live = LiveWorker(&self.live);
        debug!(queue = %self.config.name, slot, "worker started");
        self.runner.on_start(slot);

        while let Some(item) = self.next_item() {
            if !item.begin(slot) {
                continue;
            }
            let work_id = item.work_id().unwrap_or_default();
            let span = WorkSpan::new(&self.config.name, work_id, slot);
            let outcome = {
                let _entered = span.enter();
                catch_unwind(AssertUnwindSafe(|| self.runner.on_run(&item, slot)))
            };
            match outcome {
                Ok(()) => {
                    span.record_status(item.finish());
                }
                Err(_) => {
                    error!(queue = %self.config.name, work_id, slot, "work item panicked");
                    item.abort();
                    span.record_status(WorkStatus::Cancelled);
                }
            }
        }

        self.runner.on_finish(slot);
        debug!(queue = %self.config.name, slot, "worker exiting");
    }
}

/// Thread pool over a FIFO of work items
pub struct WorkQueue<R: Runnable> {
    shared: Arc<Shared<R>>,
    workers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    state: AtomicU8,
}

impl<R: Runnable> WorkQueue<R> {
    pub fn new(runner: R) -> Self {
        Self::with_config(runner, WorkQueueConfig::default())
    }

    pub fn with_config(runner: R, config: WorkQueueConfig) -> Self {
        let not_empty = ConditionVariable::with_config(&config.sync);
        Self {
            shared: Arc::new(Shared {
                runner,
                config,
                fifo: MutexCell::new(Fifo {
                    items: VecDeque::new(),
                    sequence: 0,
                    closed: false,
                    done: false,
                }),
                not_empty,
                live: AtomicUsize::new(0),
            }),
            workers: parking_lot::Mutex::new(Vec::new()),
            state: AtomicU8::new(QueueState::Unstarted as u8),
        }
    }

    /// The shared `Runnable`, e.g. to read counters it keeps
    #[inline]
    pub fn runner(&self) -> &R {
        &self.shared.runner
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    #[inline]
    pub fn state(&self) -> QueueState {
        QueueState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: QueueState, to: QueueState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Spawn `workers` threads
    ///
    /// Valid once, with `1 <= workers <= ShardManager::max_workers()`.
    pub fn start(&self, workers: usize) -> SyncResult<()> {
        let max = ShardManager::max_workers();
        if workers == 0 || workers > max {
            error!(queue = %self.name(), requested = workers, max, "invalid worker count");
            return Err(SyncError::InvalidWorkerCount {
                requested: workers,
                max,
            });
        }
        if !self.transition(QueueState::Unstarted, QueueState::Running) {
            return Err(SyncError::InvalidState {
                from: self.state().name(),
                to: QueueState::Running.name(),
            });
        }

        let mut handles = self.workers.lock();
        for slot in 0..workers {
            let shared = Arc::clone(&self.shared);
            self.shared.live.fetch_add(1, Ordering::AcqRel);
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", self.name(), slot))
                .spawn(move || shared.worker_loop(slot));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    self.shared.live.fetch_sub(1, Ordering::AcqRel);
                    error!(queue = %self.name(), slot, error = %err, "failed to spawn worker");
                    drop(handles);
                    self.stop(Drain::Cancel);
                    return Err(err.into());
                }
            }
        }

        info!(queue = %self.name(), workers, "work queue started");
        Ok(())
    }

    /// Append `item` to the FIFO and wake one worker
    ///
    /// Returns the queue length after the append. Once draining has begun the
    /// item is cancelled instead and `QueueClosed` is returned.
    pub fn submit(&self, item: Arc<WorkItem<R::Payload>>) -> SyncResult<usize> {
        let mut fifo = self.shared.fifo.lock();
        if fifo.closed {
            drop(fifo);
            item.revoke();
            warn!(queue = %self.name(), "submit after close");
            return Err(SyncError::QueueClosed);
        }

        let work_id = fifo.sequence + 1;
        item.enqueue(work_id).map_err(|status| SyncError::InvalidState {
            from: status.name(),
            to: WorkStatus::Queued.name(),
        })?;
        fifo.sequence = work_id;
        fifo.items.push_back(item);
        let size = fifo.items.len();
        self.shared.not_empty.signal();
        drop(fifo);

        debug!(queue = %self.name(), work_id, size, "work submitted");
        Ok(size)
    }

    /// Wrap `payload` in a new item and submit it
    pub fn submit_payload(&self, payload: R::Payload) -> SyncResult<Arc<WorkItem<R::Payload>>> {
        let item = Arc::new(WorkItem::new(payload));
        self.submit(Arc::clone(&item))?;
        Ok(item)
    }

    /// Items waiting in the FIFO
    pub fn len(&self) -> usize {
        self.shared.fifo.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items ever accepted by `submit`
    pub fn submitted(&self) -> u64 {
        self.shared.fifo.lock().sequence
    }

    /// Worker threads that have not yet left their loop
    pub fn worker_count(&self) -> usize {
        self.shared.live.load(Ordering::Acquire)
    }

    /// Revoke queued work, stop the workers and join them
    pub fn cancel(&self) {
        self.stop(Drain::Cancel);
    }

    /// Join every worker without forcing shutdown
    ///
    /// Returns once the workers have exited, which requires some other caller
    /// to request shutdown. Concurrent callers all block until the joins are
    /// done.
    pub fn wait(&self) {
        let mut handles = self.workers.lock();
        for handle in handles.drain(..) {
            if handle.join().is_err() {
                error!(queue = %self.name(), "worker thread panicked");
            }
        }
    }

    /// Run all queued work to completion, then stop and join the workers
    pub fn finish(&self) {
        self.stop(Drain::Complete);
        self.wait();
        self.destroy();
    }

    /// `cancel` followed by `destroy`
    pub fn exit(&self) {
        self.cancel();
        self.destroy();
    }

    /// Release the worker array
    ///
    /// Idempotent. Workers still alive are told to stop and joined.
    pub fn destroy(&self) {
        if self.state() == QueueState::Stopped {
            return;
        }
        self.stop(Drain::Cancel);
        self.wait();
    }

    fn stop(&self, mode: Drain) {
        if !self.transition(QueueState::Running, QueueState::Draining)
            && !self.transition(QueueState::Unstarted, QueueState::Draining)
        {
            // Someone else owns the shutdown
            if mode == Drain::Cancel {
                self.revoke_queued();
            }
            self.await_stopped();
            return;
        }
        info!(queue = %self.name(), mode = ?mode, "work queue draining");

        {
            let mut fifo = self.shared.fifo.lock();
            fifo.closed = true;
            if mode == Drain::Cancel {
                for item in fifo.items.drain(..) {
                    item.revoke();
                }
            }
            self.shared.not_empty.broadcast();
        }

        self.drain_poll();

        {
            let mut fifo = self.shared.fifo.lock();
            fifo.done = true;
            self.shared.not_empty.broadcast();
        }
        self.wait();

        self.state.store(QueueState::Stopped as u8, Ordering::Release);
        // SAFETY: same key as `await_stopped`.
        unsafe {
            unpark_all(self.state_key(), UnparkToken(0));
        }
        info!(queue = %self.name(), "work queue stopped");
    }

    fn revoke_queued(&self) {
        let mut fifo = self.shared.fifo.lock();
        for item in fifo.items.drain(..) {
            item.revoke();
        }
    }

    /// Block until the shutdown owner marks the queue Stopped
    fn await_stopped(&self) {
        while self.state() != QueueState::Stopped {
            // SAFETY: the key is the address of our own state word; the
            // callbacks take no locks.
            unsafe {
                park(
                    self.state_key(),
                    || self.state() != QueueState::Stopped,
                    || {},
                    |_key, _was_last| {},
                    ParkToken(0),
                    None,
                );
            }
        }
    }

    #[inline]
    fn state_key(&self) -> usize {
        &self.state as *const AtomicU8 as usize
    }

    /// Poll with exponential backoff until the FIFO is empty
    fn drain_poll(&self) {
        let config = &self.shared.config;
        let mut backoff = config.drain_backoff_initial;
        loop {
            {
                let mut fifo = self.shared.fifo.lock();
                if fifo.items.is_empty() {
                    return;
                }
                if self.shared.live.load(Ordering::Acquire) == 0 {
                    // Nobody will ever dequeue these
                    let revoked = fifo.items.len();
                    for item in fifo.items.drain(..) {
                        item.revoke();
                    }
                    warn!(queue = %config.name, revoked, "no workers left to drain queue");
                    return;
                }
            }
            thread::sleep(backoff);
            backoff = config.next_backoff(backoff);
        }
    }
}

impl<R: Runnable> Drop for WorkQueue<R> {
    fn drop(&mut self) {
        if matches!(self.state(), QueueState::Running | QueueState::Draining) {
            warn!(queue = %self.name(), "work queue dropped without shutdown");
        }
        self.exit();
    }
}

impl<R: Runnable> std::fmt::Debug for WorkQueue<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("name", &self.name())
            .field("state", &self.state())
            .field("workers", &self.worker_count())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    const TEST_IDLE_WAIT: Duration = Duration::from_millis(10);

    #[derive(Default)]
    struct Counter {
        runs: AtomicUsize,
        starts: AtomicUsize,
        finishes: AtomicUsize,
    }

    impl Runnable for Counter {
        type Payload = u32;

        fn on_run(&self, _item: &WorkItem<u32>, _slot: SlotId) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }

        fn on_start(&self, _slot: SlotId) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_finish(&self, _slot: SlotId) {
            self.finishes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn queue() -> WorkQueue<Counter> {
        WorkQueue::with_config(
            Counter::default(),
            WorkQueueConfig::named("test").with_idle_wait(TEST_IDLE_WAIT),
        )
    }

    #[test]
    fn test_start_validates_worker_count() {
        let q = queue();
        assert!(matches!(
            q.start(0),
            Err(SyncError::InvalidWorkerCount { requested: 0, .. })
        ));
        assert_eq!(q.state(), QueueState::Unstarted);
        q.start(2).unwrap();
        assert!(matches!(q.start(2), Err(SyncError::InvalidState { .. })));
        q.exit();
    }

    #[test]
    fn test_finish_runs_everything() {
        let q = queue();
        q.start(2).unwrap();
        let items: Vec<_> = (0..3).map(|i| q.submit_payload(i).unwrap()).collect();
        q.finish();

        assert_eq!(q.runner().runs.load(Ordering::SeqCst), 3);
        assert!(items.iter().all(|item| item.is_complete()));
        assert_eq!(q.state(), QueueState::Stopped);
        assert_eq!(q.worker_count(), 0);
    }

    #[test]
    fn test_work_ids_follow_submission_order() {
        let q = queue();
        let a = q.submit_payload(1).unwrap();
        let b = q.submit_payload(2).unwrap();
        assert_eq!(a.work_id(), Some(1));
        assert_eq!(b.work_id(), Some(2));
        assert_eq!(q.len(), 2);
        assert_eq!(q.submitted(), 2);
        q.exit();
        assert!(a.status() == WorkStatus::Cancelled && b.status() == WorkStatus::Cancelled);
    }

    #[test]
    fn test_submit_after_close() {
        let q = queue();
        q.start(1).unwrap();
        q.exit();
        let item = Arc::new(WorkItem::new(9));
        assert_eq!(q.submit(item.clone()), Err(SyncError::QueueClosed));
        assert_eq!(item.status(), WorkStatus::Cancelled);
    }

    #[test]
    fn test_terminal_calls_are_idempotent() {
        let q = queue();
        q.start(2).unwrap();
        q.finish();
        q.finish();
        q.exit();
        q.destroy();
        assert_eq!(q.runner().starts.load(Ordering::SeqCst), 2);
        assert_eq!(q.runner().finishes.load(Ordering::SeqCst), 2);
    }
}
