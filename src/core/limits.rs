/*!
 * System Limits and Constants
 *
 * Centralized location for spin thresholds, slot counts and worker-pool
 * timing. Organized by domain.
 *
 * - Performance-critical constants are marked with [PERF]
 */

use std::time::Duration;

// =============================================================================
// BACKOFF
// =============================================================================

/// Iterations of pure `spin_loop` hints before yielding to the scheduler
/// [PERF] Covers the common sub-microsecond hold time without a syscall
pub const BACKOFF_SPIN_LIMIT: u32 = 6;

/// Iterations (counted from zero) before escalating from yield to nap
pub const BACKOFF_YIELD_LIMIT: u32 = 64;

/// Sleep used once a spinner passes the yield threshold
pub const BACKOFF_NAP: Duration = Duration::from_micros(500);

// =============================================================================
// SLOTS
// =============================================================================

/// Default shard count for `ConditionVariableMap`
pub const CONDVAR_MAP_SLOTS: usize = 64;

/// Default slot count for slotted lock arrays
pub const DEFAULT_LOCK_SLOTS: usize = 32;

/// Lower bound on computed slot counts
pub const MIN_SLOTS: usize = 8;

/// Upper bound on computed slot counts
pub const MAX_SLOTS: usize = 512;

// =============================================================================
// WORK QUEUE
// =============================================================================

/// Period after which an idle worker re-checks the shutdown flag
pub const WORKER_IDLE_WAIT: Duration = Duration::from_millis(100);

/// First sleep of the cancel/drain poll
pub const DRAIN_BACKOFF_INITIAL: Duration = Duration::from_millis(1);

/// Cap for the exponential cancel/drain poll
pub const DRAIN_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Hard ceiling on workers per queue, independent of CPU count
pub const MAX_WORKERS_CEILING: usize = 1024;

/// Workers allowed per detected CPU
pub const WORKERS_PER_CPU: usize = 16;

/// `on_run` calls longer than this are logged as slow
pub const SLOW_WORK_THRESHOLD: Duration = Duration::from_secs(1);
