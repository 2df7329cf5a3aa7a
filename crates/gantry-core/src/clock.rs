//! Time sources for visibility and retention arithmetic.
//!
//! Relay queues hide delivered messages for a visibility window and expire
//! messages past their retention, so every component that reasons about
//! time takes a [`Clock`] rather than calling `Utc::now()` directly. Tests
//! use [`VirtualClock`] to advance time deterministically.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use gantry_core::clock::{Clock, VirtualClock};
//!
//! let clock = VirtualClock::at_epoch();
//! let start = clock.now();
//! clock.advance(Duration::from_secs(1200));
//! assert_eq!((clock.now() - start).num_seconds(), 1200);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// A source of the current time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually advanced clock for deterministic tests.
///
/// Stores a base instant plus elapsed milliseconds in an atomic, so shared
/// references can advance time without locking.
#[derive(Debug)]
pub struct VirtualClock {
    /// Base time (start of the simulated timeline).
    base: DateTime<Utc>,
    /// Elapsed milliseconds since base.
    elapsed_ms: AtomicU64,
}

impl VirtualClock {
    /// Creates a virtual clock starting at the given time.
    #[must_use]
    pub fn new(base: DateTime<Utc>) -> Self {
        Self {
            base,
            elapsed_ms: AtomicU64::new(0),
        }
    }

    /// Creates a clock anchored at the Unix epoch.
    #[must_use]
    pub fn at_epoch() -> Self {
        Self::new(DateTime::UNIX_EPOCH)
    }

    /// Advances the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        self.elapsed_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Advances the clock to a specific point in time.
    ///
    /// # Panics
    ///
    /// Panics if the target time is before the base or current time.
    pub fn advance_to(&self, target: DateTime<Utc>) {
        assert!(
            target >= self.base,
            "cannot move clock before base: base={:?}, target={target:?}",
            self.base
        );
        let target_ms = (target - self.base).num_milliseconds() as u64;
        let current = self.elapsed_ms.load(Ordering::Relaxed);
        assert!(
            target_ms >= current,
            "cannot move clock backwards: current={current}ms, target={target_ms}ms"
        );
        self.elapsed_ms.store(target_ms, Ordering::Relaxed);
    }

    /// Returns elapsed time since the base instant.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms.load(Ordering::Relaxed))
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.elapsed_ms.load(Ordering::Relaxed);
        self.base + chrono::Duration::milliseconds(elapsed as i64)
    }
}
