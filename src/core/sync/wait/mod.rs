/*!
 * Wait/Notify Primitives
 *
 * Condition variables over any `Lockable`, with two interchangeable backends:
 * - Futex-style (parking on a sequence word, default on Linux)
 * - Counted handshake (two semaphores, portable fallback)
 *
 * # Architecture
 *
 * `ConditionVariable` owns one backend chosen from `SyncConfig`.
 * `ConditionVariableMap` shards keyed waits over a fixed set of
 * `ConditionVariable`s so memory is bounded by live keys, not by key space.
 */

mod condvar;
mod futex;
mod handshake;
mod map;
mod traits;

pub use condvar::ConditionVariable;
pub use map::ConditionVariableMap;
pub use traits::{KeyedWait, WaitPrimitive, WaitTicket, WakeResult};

// Re-export specific backends for advanced users
pub use futex::FutexWait;
pub use handshake::HandshakeWait;
