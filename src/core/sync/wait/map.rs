/*!
 * Condition Variable Map
 *
 * Keyed wait/signal over a fixed array of shards. Each shard pairs one
 * `MutexCell` (holding a per-key waiter table) with one `ConditionVariable`.
 *
 * # Design: Shard Broadcast, Per-Key Credit
 *
 * There is no condition variable per key. A signal grants a `running` credit
 * to its key and broadcasts the whole shard; every woken waiter re-checks its
 * own key and goes back to sleep unless a credit is there for it. Memory stays
 * bounded by the keys that currently have waiters: an entry whose `queued`
 * count drops to zero is removed.
 */

use super::condvar::ConditionVariable;
use super::traits::{KeyedWait, WakeResult};
use crate::core::errors::{SyncError, SyncResult};
use crate::core::limits::CONDVAR_MAP_SLOTS;
use crate::core::shard_manager::{ShardManager, WorkloadProfile};
use crate::core::sync::config::SyncConfig;
use crate::core::sync::locks::MutexCell;
use ahash::AHashMap;
use std::time::{Duration, Instant};
use tracing::trace;

/// Waiter bookkeeping for one key
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct KeyCounts {
    /// Waiters registered on the key
    queued: usize,
    /// Wake credits not yet claimed; never exceeds `queued`
    running: usize,
}

struct Shard {
    table: MutexCell<AHashMap<u64, KeyCounts>>,
    cv: ConditionVariable,
}

impl Shard {
    fn new(config: &SyncConfig) -> Self {
        Self {
            table: MutexCell::new(AHashMap::new()),
            cv: ConditionVariable::with_config(config),
        }
    }
}

/// Sharded keyed condition variable
pub struct ConditionVariableMap {
    shards: Box<[Shard]>,
}

impl ConditionVariableMap {
    pub fn new(slot_count: usize) -> SyncResult<Self> {
        Self::with_config(slot_count, &SyncConfig::default())
    }

    pub fn with_config(slot_count: usize, config: &SyncConfig) -> SyncResult<Self> {
        if slot_count == 0 {
            return Err(SyncError::InvalidCapacity(slot_count));
        }
        let shards: Vec<Shard> = (0..slot_count).map(|_| Shard::new(config)).collect();
        Ok(Self {
            shards: shards.into_boxed_slice(),
        })
    }

    /// `CONDVAR_MAP_SLOTS` shards on the default backend
    pub fn with_defaults() -> Self {
        Self::sized(CONDVAR_MAP_SLOTS, &SyncConfig::default())
    }

    /// Shard count derived from CPU count and contention profile
    pub fn for_profile(profile: WorkloadProfile) -> Self {
        Self::sized(ShardManager::slots(profile), &SyncConfig::default())
    }

    fn sized(slot_count: usize, config: &SyncConfig) -> Self {
        let shards: Vec<Shard> = (0..slot_count.max(1))
            .map(|_| Shard::new(config))
            .collect();
        Self {
            shards: shards.into_boxed_slice(),
        }
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.shards.len()
    }

    #[inline]
    fn shard(&self, key: u64) -> &Shard {
        &self.shards[(key % self.shards.len() as u64) as usize]
    }

    /// Wait for a signal on `key`
    ///
    /// Returns `true` once a signal credit for `key` is claimed, `false` if
    /// `timeout` elapses first. `None` waits indefinitely.
    pub fn wait(&self, key: u64, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let shard = self.shard(key);
        let mut table = shard.table.lock();

        loop {
            table.entry(key).or_default().queued += 1;

            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            if remaining != Some(Duration::ZERO) {
                table.wait(&shard.cv, remaining);
            }

            let (claimed, drained) = match table.get_mut(&key) {
                Some(counts) => {
                    counts.queued -= 1;
                    let claimed = counts.running > 0;
                    if claimed {
                        counts.running -= 1;
                    }
                    (claimed, counts.queued == 0)
                }
                None => (false, false),
            };
            if drained {
                table.remove(&key);
            }

            if claimed {
                trace!(key, "condvar map wait claimed signal");
                return true;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return false;
            }
        }
    }

    /// Grant one wake credit to `key` and wake its shard
    ///
    /// Returns 0 (and does nothing) when no credit can be granted.
    pub fn signal(&self, key: u64) -> usize {
        let shard = self.shard(key);
        let mut table = shard.table.lock();

        let granted = match table.get_mut(&key) {
            Some(counts) if counts.running < counts.queued => {
                counts.running += 1;
                1
            }
            _ => 0,
        };

        if granted > 0 {
            shard.cv.broadcast();
        }
        drop(table);
        granted
    }

    /// Grant a credit to every waiter on `key`
    ///
    /// Returns the number of newly granted credits.
    pub fn broadcast(&self, key: u64) -> usize {
        let shard = self.shard(key);
        let mut table = shard.table.lock();

        let granted = match table.get_mut(&key) {
            Some(counts) => {
                let granted = counts.queued - counts.running;
                counts.running = counts.queued;
                granted
            }
            None => 0,
        };

        if granted > 0 {
            shard.cv.broadcast();
        }
        drop(table);
        granted
    }

    /// `broadcast` for every key in every shard
    pub fn broadcast_to_all(&self) -> usize {
        let mut total = 0;
        for shard in self.shards.iter() {
            let mut table = shard.table.lock();
            let mut granted = 0;
            for counts in table.values_mut() {
                granted += counts.queued - counts.running;
                counts.running = counts.queued;
            }
            if granted > 0 {
                shard.cv.broadcast();
            }
            total += granted;
        }
        total
    }

    /// Registered waiters on `key`
    pub fn waiter_count(&self, key: u64) -> usize {
        self.shard(key)
            .table
            .lock()
            .get(&key)
            .map_or(0, |counts| counts.queued)
    }

    /// Keys that currently have at least one waiter
    pub fn tracked_keys(&self) -> usize {
        self.shards.iter().map(|shard| shard.table.lock().len()).sum()
    }
}

impl Default for ConditionVariableMap {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ConditionVariableMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionVariableMap")
            .field("slot_count", &self.slot_count())
            .finish()
    }
}

impl KeyedWait<u64> for ConditionVariableMap {
    fn wait(&self, key: u64, timeout: Option<Duration>) -> bool {
        ConditionVariableMap::wait(self, key, timeout)
    }

    fn wake_one(&self, key: u64) -> WakeResult {
        WakeResult::from_count(self.signal(key))
    }

    fn wake_all(&self, key: u64) -> WakeResult {
        WakeResult::from_count(self.broadcast(key))
    }

    fn waiter_count(&self, key: u64) -> usize {
        ConditionVariableMap::waiter_count(self, key)
    }

    fn name(&self) -> &'static str {
        "condvar_map"
    }
}
