/*!
 * Work Queue Traits
 *
 * The capability a `WorkQueue` is built around: what each worker does with a
 * dequeued item, plus optional per-worker setup and teardown.
 */

use super::item::{SlotId, WorkItem};

/// Work executed by queue workers
///
/// One `Runnable` is shared by every worker of a queue, so implementations
/// keep their own state behind atomics or locks.
pub trait Runnable: Send + Sync + 'static {
    /// Producer data carried by each item
    type Payload: Send + Sync + 'static;

    /// Run one item on worker `slot`
    ///
    /// Called outside the queue lock. Never called for an item that was
    /// cancelled before it was dequeued.
    fn on_run(&self, item: &WorkItem<Self::Payload>, slot: SlotId);

    /// Runs on each worker thread before its first item
    fn on_start(&self, _slot: SlotId) {}

    /// Runs on each worker thread after its last item
    fn on_finish(&self, _slot: SlotId) {}
}
