/*!
 * Structured Tracing
 * Subscriber setup and work-item spans using the tracing crate
 *
 * Features:
 * - JSON-formatted logs for structured parsing
 * - Per-item spans carrying queue, work id and worker slot
 * - Slow-item warnings with embedded durations
 */

use crate::core::limits::SLOW_WORK_THRESHOLD;
use crate::work::{SlotId, WorkId, WorkStatus};
use std::time::Instant;
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - SYNC_TRACE_JSON: Enable JSON output (default: false)
///
/// Later calls are no-ops once a global subscriber is installed.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("SYNC_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_line_number(true)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "Structured tracing initialized");
    }
}

/// Span around one `on_run` call
pub struct WorkSpan {
    span: tracing::Span,
    start: Instant,
    work_id: WorkId,
    slot: SlotId,
}

impl WorkSpan {
    pub fn new(queue: &str, work_id: WorkId, slot: SlotId) -> Self {
        let span = span!(
            Level::DEBUG,
            "work",
            queue = queue,
            work_id = work_id,
            slot = slot,
            duration_us = tracing::field::Empty,
            status = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            work_id,
            slot,
        }
    }

    /// Enter the span for the duration of the run
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    /// Record the status the item settled in
    pub fn record_status(&self, status: WorkStatus) {
        self.span.record("status", status.name());
    }
}

impl Drop for WorkSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        self.span.record("duration_us", duration.as_micros() as u64);
        let _entered = self.span.enter();

        if duration > SLOW_WORK_THRESHOLD {
            warn!(
                work_id = self.work_id,
                slot = self.slot,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow work item"
            );
        } else {
            debug!(
                work_id = self.work_id,
                slot = self.slot,
                duration_us = duration.as_micros() as u64,
                "work item finished"
            );
        }
    }
}
