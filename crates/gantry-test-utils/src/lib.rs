//! Shared test utilities for Gantry integration tests.
//!
//! This crate provides:
//! - [`init_test_logging`]: tracing setup that cooperates with `cargo test`
//! - Fixture helpers for names, payloads, and unique resource labels
//!
//! # Example
//!
//! ```rust,ignore
//! use gantry_test_utils::{bucket, init_test_logging, sample_csv};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     init_test_logging();
//!     let dropbox = bucket("dropbox");
//!     // ... run test ...
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Panicking on bad fixture input keeps test code short; these helpers
// never run outside tests.
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod fixtures;

pub use fixtures::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("gantry_core=debug".parse().expect("valid directive"))
                .add_directive("gantry_blueprint=debug".parse().expect("valid directive"))
                .add_directive("gantry_relay=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
