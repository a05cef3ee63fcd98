/*!
 * Slot Configuration
 *
 * CPU-topology-aware slot counts for slotted locks and condition maps, and the
 * platform maximum for work-queue workers.
 *
 * # Design: Pure Functions Over Singleton
 *
 * Everything here is a pure function of the CPU count, which the standard
 * library already caches. No lifecycle, callable from any thread.
 */

use super::limits::{MAX_SLOTS, MAX_WORKERS_CEILING, MIN_SLOTS, WORKERS_PER_CPU};

/// Hardware-aware slot configuration (pure functions)
pub struct ShardManager;

impl ShardManager {
    /// Number of CPUs available to this process
    #[inline]
    pub fn cpu_count() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or_else(|_| {
                tracing::warn!("Failed to detect CPU count, defaulting to 8");
                8
            })
    }

    /// Slot count for a given contention profile
    ///
    /// Always a power of two, clamped to `[MIN_SLOTS, MAX_SLOTS]`.
    #[inline]
    pub fn slots(profile: WorkloadProfile) -> usize {
        Self::slots_with_multiplier(profile.multiplier())
    }

    /// Slot count with a custom CPU multiplier
    #[inline]
    pub fn slots_with_multiplier(multiplier: usize) -> usize {
        (Self::cpu_count() * multiplier.max(1))
            .next_power_of_two()
            .clamp(MIN_SLOTS, MAX_SLOTS)
    }

    /// Largest worker count `WorkQueue::start` accepts on this machine
    #[inline]
    pub fn max_workers() -> usize {
        (Self::cpu_count() * WORKERS_PER_CPU).min(MAX_WORKERS_CEILING)
    }
}

/// Workload characterization for slot count calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadProfile {
    /// Many threads hammering many keys (4x CPU slots)
    HighContention,
    /// Moderate access (2x CPU slots)
    MediumContention,
    /// Rare contention (1x CPU slots)
    LowContention,
}

impl WorkloadProfile {
    #[inline]
    const fn multiplier(self) -> usize {
        match self {
            WorkloadProfile::HighContention => 4,
            WorkloadProfile::MediumContention => 2,
            WorkloadProfile::LowContention => 1,
        }
    }
}
