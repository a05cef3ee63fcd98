/*!
 * Synchronization Configuration
 *
 * Runtime configuration for wait-backend selection and spin backoff
 */

use crate::core::limits::{BACKOFF_NAP, BACKOFF_SPIN_LIMIT, BACKOFF_YIELD_LIMIT};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wait backend selection for condition variables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Park on a sequence word (parking_lot_core, futex on Linux)
    Futex,
    /// Counted wait/wake handshake over semaphores
    Handshake,
    /// Resolve once per platform
    Auto,
}

impl BackendKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "futex" => Some(BackendKind::Futex),
            "handshake" => Some(BackendKind::Handshake),
            "auto" => Some(BackendKind::Auto),
            _ => None,
        }
    }
}

/// Synchronization configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Preferred wait backend
    pub backend: BackendKind,
    /// Backoff iterations spent on `spin_loop` hints
    pub spin_limit: u32,
    /// Backoff iterations before a spinner starts napping
    pub yield_limit: u32,
    /// Nap length once past `yield_limit`
    pub nap: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            spin_limit: BACKOFF_SPIN_LIMIT,
            yield_limit: BACKOFF_YIELD_LIMIT,
            nap: BACKOFF_NAP,
        }
    }
}

impl SyncConfig {
    /// Keep spinners hot for longer before napping
    pub const fn low_latency() -> Self {
        Self {
            backend: BackendKind::Futex,
            spin_limit: 10,
            yield_limit: 512,
            nap: Duration::from_micros(50),
        }
    }

    /// Nap early, for locks that are held across slow work
    pub const fn long_wait() -> Self {
        Self {
            backend: BackendKind::Auto,
            spin_limit: 2,
            yield_limit: 8,
            nap: Duration::from_millis(1),
        }
    }

    /// Overlay `SYNC_WAIT_BACKEND` and `SYNC_NAP_MICROS` onto the defaults
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("SYNC_WAIT_BACKEND") {
            match BackendKind::parse(&raw) {
                Some(backend) => config.backend = backend,
                None => tracing::warn!(value = %raw, "Ignoring unknown SYNC_WAIT_BACKEND"),
            }
        }

        if let Ok(raw) = std::env::var("SYNC_NAP_MICROS") {
            match raw.trim().parse::<u64>() {
                Ok(micros) => config.nap = Duration::from_micros(micros),
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid SYNC_NAP_MICROS"),
            }
        }

        config
    }

    /// Select the concrete backend for the current platform
    pub fn select_backend(&self) -> BackendKind {
        match self.backend {
            BackendKind::Auto => {
                #[cfg(target_os = "linux")]
                {
                    BackendKind::Futex
                }
                #[cfg(not(target_os = "linux"))]
                {
                    BackendKind::Handshake
                }
            }
            other => other,
        }
    }
}
