/*!
 * Core Module
 * Synchronization primitives, guards, errors and system limits
 */

pub mod errors;
pub mod guard;
pub mod limits;
pub mod shard_manager;
pub mod sync;

// Re-export for convenience
pub use errors::*;
pub use guard::{
    Guard, GuardDrop, GuardError, GuardMetadata, GuardResult, ScopedAllSlots, ScopedLock,
    ScopedReadLock, ScopedSlot, ScopedWriteLock,
};
pub use shard_manager::{ShardManager, WorkloadProfile};
