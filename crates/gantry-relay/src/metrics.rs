//! Observability metrics for the relay runtime.
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `gantry_relay_messages_sent_total` | Counter | `queue` | Messages published to a queue |
//! | `gantry_relay_messages_delivered_total` | Counter | `queue` | Deliveries handed to consumers |
//! | `gantry_relay_messages_redelivered_total` | Counter | `queue` | Deliveries past the first |
//! | `gantry_relay_messages_dead_lettered_total` | Counter | `queue` | Messages moved to a dead-letter queue |
//! | `gantry_relay_messages_expired_total` | Counter | `queue` | Messages dropped by retention |
//! | `gantry_relay_queue_depth` | Gauge | `queue` | Messages waiting for delivery |
//! | `gantry_relay_invocations_total` | Counter | `unit`, `queue`, `result` | Invocation outcomes |
//! | `gantry_relay_invocation_duration_seconds` | Histogram | `unit` | Invocation duration |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gantry_relay::metrics::RelayMetrics;
//!
//! let metrics = RelayMetrics::new();
//! metrics.record_sent("dropbox-queue");
//! metrics.set_queue_depth("dropbox-queue", 1);
//! ```
//!
//! Metrics are exposed via the `metrics` crate facade; install a recorder
//! (Prometheus exporter or similar) at application startup to collect them.

use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Messages published to a queue.
    pub const MESSAGES_SENT_TOTAL: &str = "gantry_relay_messages_sent_total";
    /// Counter: Deliveries handed to consumers.
    pub const MESSAGES_DELIVERED_TOTAL: &str = "gantry_relay_messages_delivered_total";
    /// Counter: Deliveries past the first for a message.
    pub const MESSAGES_REDELIVERED_TOTAL: &str = "gantry_relay_messages_redelivered_total";
    /// Counter: Messages moved to a dead-letter queue.
    pub const MESSAGES_DEAD_LETTERED_TOTAL: &str = "gantry_relay_messages_dead_lettered_total";
    /// Counter: Messages dropped because retention elapsed.
    pub const MESSAGES_EXPIRED_TOTAL: &str = "gantry_relay_messages_expired_total";
    /// Gauge: Messages waiting for delivery.
    pub const QUEUE_DEPTH: &str = "gantry_relay_queue_depth";
    /// Counter: Invocation outcomes by unit and result.
    pub const INVOCATIONS_TOTAL: &str = "gantry_relay_invocations_total";
    /// Histogram: Invocation duration in seconds.
    pub const INVOCATION_DURATION_SECONDS: &str = "gantry_relay_invocation_duration_seconds";
}

/// Label keys used across metrics.
pub mod labels {
    /// Queue name.
    pub const QUEUE: &str = "queue";
    /// Processing unit name.
    pub const UNIT: &str = "unit";
    /// Invocation result (success, failure).
    pub const RESULT: &str = "result";
}

/// High-level interface for recording relay metrics.
///
/// Cheap to clone and share; all state lives in the global recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelayMetrics;

impl RelayMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Records a message published to `queue`.
    pub fn record_sent(&self, queue: &str) {
        counter!(names::MESSAGES_SENT_TOTAL, labels::QUEUE => queue.to_string()).increment(1);
    }

    /// Records a delivery handed to a consumer.
    pub fn record_delivered(&self, queue: &str) {
        counter!(names::MESSAGES_DELIVERED_TOTAL, labels::QUEUE => queue.to_string()).increment(1);
    }

    /// Records a delivery past the first for a message.
    pub fn record_redelivered(&self, queue: &str) {
        counter!(names::MESSAGES_REDELIVERED_TOTAL, labels::QUEUE => queue.to_string())
            .increment(1);
    }

    /// Records a message moved to a dead-letter queue.
    pub fn record_dead_lettered(&self, queue: &str) {
        counter!(names::MESSAGES_DEAD_LETTERED_TOTAL, labels::QUEUE => queue.to_string())
            .increment(1);
    }

    /// Records a message dropped by retention.
    pub fn record_expired(&self, queue: &str) {
        counter!(names::MESSAGES_EXPIRED_TOTAL, labels::QUEUE => queue.to_string()).increment(1);
    }

    /// Sets the number of messages waiting in `queue`.
    #[allow(clippy::cast_precision_loss)] // Gauge values are typically small
    pub fn set_queue_depth(&self, queue: &str, depth: usize) {
        gauge!(names::QUEUE_DEPTH, labels::QUEUE => queue.to_string()).set(depth as f64);
    }

    /// Records an invocation outcome.
    pub fn record_invocation(&self, unit: &str, queue: &str, result: &str) {
        counter!(
            names::INVOCATIONS_TOTAL,
            labels::UNIT => unit.to_string(),
            labels::QUEUE => queue.to_string(),
            labels::RESULT => result.to_string(),
        )
        .increment(1);
    }

    /// Records how long an invocation took.
    pub fn observe_invocation_duration(&self, unit: &str, duration: Duration) {
        histogram!(
            names::INVOCATION_DURATION_SECONDS,
            labels::UNIT => unit.to_string(),
        )
        .record(duration.as_secs_f64());
    }
}

/// RAII guard for timing operations.
///
/// Automatically records duration when dropped.
///
/// ## Example
///
/// ```rust,no_run
/// use gantry_relay::metrics::{RelayMetrics, TimingGuard};
///
/// let metrics = RelayMetrics::new();
///
/// {
///     let _guard = TimingGuard::new(|duration| {
///         metrics.observe_invocation_duration("dropbox-processor", duration);
///     });
///     // Do work...
/// } // Duration recorded automatically on drop
/// ```
pub struct TimingGuard<F>
where
    F: FnOnce(Duration),
{
    start: Instant,
    on_drop: Option<F>,
}

impl<F> TimingGuard<F>
where
    F: FnOnce(Duration),
{
    /// Creates a guard that calls `on_drop` with the elapsed duration.
    pub fn new(on_drop: F) -> Self {
        Self {
            start: Instant::now(),
            on_drop: Some(on_drop),
        }
    }

    /// Returns the elapsed time since the guard was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl<F> Drop for TimingGuard<F>
where
    F: FnOnce(Duration),
{
    fn drop(&mut self) {
        if let Some(on_drop) = self.on_drop.take() {
            on_drop(self.start.elapsed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_guard_reports_elapsed_on_drop() {
        let mut observed = None;
        {
            let _guard = TimingGuard::new(|duration| {
                observed = Some(duration);
            });
        }
        assert!(observed.is_some());
    }

    #[test]
    fn recording_without_a_recorder_is_a_no_op() {
        // The metrics facade drops recordings when no recorder is
        // installed; these calls must not panic.
        let metrics = RelayMetrics::new();
        metrics.record_sent("dropbox-queue");
        metrics.record_delivered("dropbox-queue");
        metrics.record_invocation("dropbox-processor", "dropbox-queue", "success");
        metrics.set_queue_depth("dropbox-queue", 0);
        metrics.observe_invocation_duration("dropbox-processor", Duration::from_millis(5));
    }
}
