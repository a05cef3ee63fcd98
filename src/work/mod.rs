/*!
 * Work Queues
 *
 * N-thread worker pools with FIFO dispatch, cooperative cancellation and
 * idempotent shutdown.
 */

mod config;
mod item;
mod queue;
mod traits;

pub use config::WorkQueueConfig;
pub use item::{SlotId, WorkId, WorkItem, WorkStatus};
pub use queue::{QueueState, WorkQueue};
pub use traits::Runnable;
