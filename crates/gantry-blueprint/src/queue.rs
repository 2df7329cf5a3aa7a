//! Relay queue specs.
//!
//! A queue spec only declares delivery policy. The executable semantics
//! (visibility sweeps, redelivery, dead-letter routing) live in the relay
//! crate; the blueprint validates that the declared policy is coherent
//! before anything runs.

use std::num::NonZeroU32;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use gantry_core::name::QueueName;

use crate::blueprint::QueueRef;
use crate::error::{Error, Result};

/// Default visibility timeout for relay queues (20 minutes).
///
/// Must comfortably exceed the expected processing time of a single
/// message, otherwise unfinished work is redelivered mid-flight.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Default message retention for relay queues (4 days).
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(4 * 24 * 60 * 60);

/// Default retention for dead-letter queues (14 days).
///
/// Dead-lettered messages are kept much longer than live traffic so
/// operators have time to inspect and replay failures.
pub const DEAD_LETTER_RETENTION: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Redelivery ordering requested for a queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryOrder {
    /// Redelivered messages rejoin at the tail; arrival order is
    /// preserved only approximately. This is the default.
    #[default]
    BestEffort,
    /// At most one message is in flight at a time and redelivered
    /// messages rejoin at the head, preserving strict FIFO order.
    Strict,
}

/// Dead-letter routing policy for a queue.
///
/// After `max_receive_count` failed deliveries a message moves to the
/// target queue instead of being redelivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterSpec {
    /// The queue dead-lettered messages move to.
    pub queue: QueueRef,
    /// How many deliveries a message gets before dead-lettering.
    pub max_receive_count: NonZeroU32,
}

/// Declarative configuration for a durable relay queue.
///
/// # Example
///
/// ```rust,no_run
/// use std::num::NonZeroU32;
/// use gantry_blueprint::blueprint::Blueprint;
/// use gantry_blueprint::queue::{QueueSpec, DEAD_LETTER_RETENTION};
///
/// # fn main() -> gantry_blueprint::error::Result<()> {
/// let mut blueprint = Blueprint::new("ingest");
/// let dlq = blueprint.add_queue(
///     QueueSpec::new("dropbox-queue-dlq")?.with_retention(DEAD_LETTER_RETENTION),
/// )?;
/// let queue = blueprint.add_queue(
///     QueueSpec::new("dropbox-queue")?.with_dead_letter(&dlq, NonZeroU32::MIN),
/// )?;
/// # let _ = queue;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    name: QueueName,
    visibility_timeout: Duration,
    retention: Duration,
    dead_letter: Option<DeadLetterSpec>,
    delivery_order: DeliveryOrder,
}

impl QueueSpec {
    /// Creates a queue spec with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a valid queue name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: QueueName::new(name)?,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            retention: DEFAULT_RETENTION,
            dead_letter: None,
            delivery_order: DeliveryOrder::default(),
        })
    }

    /// Sets the visibility timeout.
    #[must_use]
    pub fn with_visibility_timeout(mut self, visibility_timeout: Duration) -> Self {
        self.visibility_timeout = visibility_timeout;
        self
    }

    /// Sets the message retention period.
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Routes messages to `queue` after `max_receive_count` failed
    /// deliveries.
    ///
    /// The target must already be declared on the same blueprint, which
    /// naturally prevents a queue from dead-lettering to itself.
    #[must_use]
    pub fn with_dead_letter(mut self, queue: &QueueRef, max_receive_count: NonZeroU32) -> Self {
        self.dead_letter = Some(DeadLetterSpec {
            queue: queue.clone(),
            max_receive_count,
        });
        self
    }

    /// Requests a redelivery ordering mode.
    #[must_use]
    pub fn with_delivery_order(mut self, delivery_order: DeliveryOrder) -> Self {
        self.delivery_order = delivery_order;
        self
    }

    /// Returns the queue name.
    #[must_use]
    pub fn name(&self) -> &QueueName {
        &self.name
    }

    /// Returns the visibility timeout.
    #[must_use]
    pub fn visibility_timeout(&self) -> Duration {
        self.visibility_timeout
    }

    /// Returns the message retention period.
    #[must_use]
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Returns the dead-letter policy, if one is configured.
    #[must_use]
    pub fn dead_letter(&self) -> Option<&DeadLetterSpec> {
        self.dead_letter.as_ref()
    }

    /// Returns the requested redelivery ordering.
    #[must_use]
    pub fn delivery_order(&self) -> DeliveryOrder {
        self.delivery_order
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.visibility_timeout.is_zero() {
            return Err(Error::invalid_spec(
                "queue",
                self.name.as_str(),
                "visibility timeout must be positive",
            ));
        }
        if self.retention.is_zero() {
            return Err(Error::invalid_spec(
                "queue",
                self.name.as_str(),
                "retention must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_relay_policy() -> Result<()> {
        let spec = QueueSpec::new("dropbox-queue")?;
        assert_eq!(spec.visibility_timeout(), Duration::from_secs(1200));
        assert_eq!(spec.retention(), Duration::from_secs(345_600));
        assert_eq!(spec.delivery_order(), DeliveryOrder::BestEffort);
        assert!(spec.dead_letter().is_none());
        Ok(())
    }

    #[test]
    fn rejects_zero_windows() -> Result<()> {
        let spec = QueueSpec::new("q-1")?.with_visibility_timeout(Duration::ZERO);
        assert!(spec.validate().is_err());
        let spec = QueueSpec::new("q-2")?.with_retention(Duration::ZERO);
        assert!(spec.validate().is_err());
        Ok(())
    }

    #[test]
    fn delivery_order_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&DeliveryOrder::BestEffort).unwrap(),
            "\"BEST_EFFORT\""
        );
        assert_eq!(
            serde_json::to_string(&DeliveryOrder::Strict).unwrap(),
            "\"STRICT\""
        );
    }
}
