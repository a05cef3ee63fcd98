/*!
 * Work Queue Configuration
 */

use crate::core::limits::{DRAIN_BACKOFF_INITIAL, DRAIN_BACKOFF_MAX, WORKER_IDLE_WAIT};
use crate::core::sync::config::SyncConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Work queue configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkQueueConfig {
    /// Queue name; worker threads are named `"{name}-{slot}"`
    pub name: String,
    /// How long an idle worker waits before re-checking for shutdown
    pub idle_wait: Duration,
    /// First sleep of the drain poll
    pub drain_backoff_initial: Duration,
    /// Cap of the exponential drain poll
    pub drain_backoff_max: Duration,
    /// Wait backend for the queue's condition variable
    pub sync: SyncConfig,
}

impl Default for WorkQueueConfig {
    fn default() -> Self {
        Self {
            name: "work".to_string(),
            idle_wait: WORKER_IDLE_WAIT,
            drain_backoff_initial: DRAIN_BACKOFF_INITIAL,
            drain_backoff_max: DRAIN_BACKOFF_MAX,
            sync: SyncConfig::default(),
        }
    }
}

impl WorkQueueConfig {
    #[inline]
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_idle_wait(mut self, idle_wait: Duration) -> Self {
        self.idle_wait = idle_wait;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    /// Next drain-poll sleep after `current`
    #[inline]
    pub(crate) fn next_backoff(&self, current: Duration) -> Duration {
        (current * 2).min(self.drain_backoff_max.max(self.drain_backoff_initial))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_backoff_is_capped() {
        let config = WorkQueueConfig::default();
        let mut backoff = config.drain_backoff_initial;
        for _ in 0..20 {
            backoff = config.next_backoff(backoff);
        }
        assert_eq!(backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: WorkQueueConfig =
            serde_json::from_str(r#"{"name":"loader"}"#).unwrap();
        assert_eq!(config.name, "loader");
        assert_eq!(config.idle_wait, WORKER_IDLE_WAIT);
    }
}
