//! Observability infrastructure for Gantry.
//!
//! Structured logging with consistent spans. This module provides
//! initialization helpers and span constructors used across the relay
//! runtime and the blueprint layer.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `gantry_relay=debug`)
///
/// # Example
///
/// ```rust
/// use gantry_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for relay queue operations with standard fields.
///
/// # Example
///
/// ```rust
/// use gantry_core::observability::relay_span;
///
/// let span = relay_span("receive", "dropbox-queue");
/// let _guard = span.enter();
/// // ... receive from the queue
/// ```
#[must_use]
pub fn relay_span(operation: &str, queue: &str) -> Span {
    tracing::info_span!("relay", op = operation, queue = queue)
}

/// Creates a span for blueprint and provisioning operations.
///
/// # Example
///
/// ```rust
/// use gantry_core::observability::blueprint_span;
///
/// let span = blueprint_span("provision", "ingest-pipeline");
/// let _guard = span.enter();
/// // ... provision resources
/// ```
#[must_use]
pub fn blueprint_span(operation: &str, blueprint: &str) -> Span {
    tracing::info_span!("blueprint", op = operation, name = blueprint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        // Should not panic (uses Once internally)
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Pretty);
    }

    #[test]
    fn relay_span_carries_fields() {
        let span = relay_span("receive", "dropbox-queue");
        let _guard = span.enter();
        tracing::info!("test message in span");
    }

    #[test]
    fn blueprint_span_carries_fields() {
        let span = blueprint_span("synth", "ingest");
        let _guard = span.enter();
        tracing::info!("blueprint message");
    }
}
