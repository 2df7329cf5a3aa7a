//! The durable relay queue, executed in memory.
//!
//! [`RelayQueue`] is the runtime rendition of the declarative queue
//! contract: at-least-once delivery with a visibility timeout, a bounded
//! receive budget, and optional dead-letter routing.
//!
//! ## Semantics
//!
//! - [`receive`](RelayQueue::receive) hides the delivered message for
//!   the visibility timeout. A consumer that acks within the window
//!   removes the message; one that does not lets the message become
//!   deliverable again with an incremented receive count.
//! - A message that fails after its last allowed receive (by visibility
//!   expiry or an explicit [`nack`](RelayQueue::nack)) moves to the
//!   dead-letter queue instead of being redelivered. Without a
//!   dead-letter queue the message keeps rejoining until retention
//!   drops it.
//! - Redelivery ordering is best-effort: released messages rejoin at
//!   the tail. [`DeliveryOrder::Strict`] requests FIFO instead, keeping
//!   at most one message in flight and rejoining released messages at
//!   the head.
//! - Messages older than the retention period are dropped during
//!   sweeps, with a warning and a counter.
//!
//! Expiry and retention are applied lazily: every queue operation runs
//! a sweep before acting, so time only needs to be observable through
//! the queue's [`Clock`].
//!
//! ## Limitations
//!
//! - **Not durable**: state lives in process memory. The declarative
//!   layer describes real durable queues; this rendition exists so the
//!   declared semantics are testable.
//! - **Single-process only**: no cross-process delivery.

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU32;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use gantry_blueprint::queue::{
    DeliveryOrder, QueueSpec, DEFAULT_RETENTION, DEFAULT_VISIBILITY_TIMEOUT,
};
use gantry_core::clock::{Clock, SystemClock};
use gantry_core::id::ReceiptHandle;
use gantry_core::name::QueueName;

use crate::error::{Error, Result};
use crate::message::{ArrivalMessage, Delivery};
use crate::metrics::RelayMetrics;

/// Runtime parameters of a relay queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayQueueOptions {
    /// How long a delivered message stays hidden awaiting its ack.
    pub visibility_timeout: Duration,
    /// How long an undelivered message is kept before being dropped.
    pub retention: Duration,
    /// Redelivery ordering promise.
    pub delivery_order: DeliveryOrder,
}

impl Default for RelayQueueOptions {
    fn default() -> Self {
        Self {
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            retention: DEFAULT_RETENTION,
            delivery_order: DeliveryOrder::default(),
        }
    }
}

impl From<&QueueSpec> for RelayQueueOptions {
    fn from(spec: &QueueSpec) -> Self {
        Self {
            visibility_timeout: spec.visibility_timeout(),
            retention: spec.retention(),
            delivery_order: spec.delivery_order(),
        }
    }
}

/// Dead-letter routing attached to a queue.
#[derive(Debug, Clone)]
struct DeadLetterLink {
    queue: Arc<RelayQueue>,
    max_receive_count: NonZeroU32,
}

/// A message held by the queue, with its delivery bookkeeping.
#[derive(Debug, Clone)]
struct StoredMessage {
    message: ArrivalMessage,
    enqueued_at: DateTime<Utc>,
    receive_count: u32,
}

/// A delivered-but-unacknowledged message.
#[derive(Debug, Clone)]
struct InFlightMessage {
    stored: StoredMessage,
    delivered_at: DateTime<Utc>,
}

/// Internal queue state protected by a single lock.
#[derive(Debug, Default)]
struct QueueState {
    available: VecDeque<StoredMessage>,
    in_flight: HashMap<ReceiptHandle, InFlightMessage>,
}

/// Converts a lock poison error to an internal error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::internal("relay queue lock poisoned")
}

/// An in-memory at-least-once message queue.
///
/// ## Example
///
/// ```rust
/// use gantry_relay::queue::{RelayQueue, RelayQueueOptions};
///
/// # fn main() -> gantry_relay::error::Result<()> {
/// let queue = RelayQueue::new("dropbox-queue".parse()?, RelayQueueOptions::default());
/// assert_eq!(queue.depth()?, 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RelayQueue {
    name: QueueName,
    options: RelayQueueOptions,
    dead_letter: Option<DeadLetterLink>,
    clock: Arc<dyn Clock>,
    metrics: RelayMetrics,
    state: RwLock<QueueState>,
}

impl RelayQueue {
    /// Creates a queue with the given runtime parameters.
    #[must_use]
    pub fn new(name: QueueName, options: RelayQueueOptions) -> Self {
        Self {
            name,
            options,
            dead_letter: None,
            clock: Arc::new(SystemClock),
            metrics: RelayMetrics::new(),
            state: RwLock::new(QueueState::default()),
        }
    }

    /// Routes messages that exhaust `max_receive_count` receives to `queue`.
    #[must_use]
    pub fn with_dead_letter(mut self, queue: Arc<RelayQueue>, max_receive_count: NonZeroU32) -> Self {
        self.dead_letter = Some(DeadLetterLink {
            queue,
            max_receive_count,
        });
        self
    }

    /// Replaces the time source, for deterministic tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the queue name.
    #[must_use]
    pub fn name(&self) -> &QueueName {
        &self.name
    }

    /// Returns the runtime parameters.
    #[must_use]
    pub fn options(&self) -> RelayQueueOptions {
        self.options
    }

    /// Returns the dead-letter queue, if one is attached.
    #[must_use]
    pub fn dead_letter_queue(&self) -> Option<&Arc<RelayQueue>> {
        self.dead_letter.as_ref().map(|link| &link.queue)
    }

    /// Publishes a message to the queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn send(&self, message: ArrivalMessage) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.state.write().map_err(poison_err)?;
        self.sweep(&mut state, now)?;
        debug!(queue = %self.name, message_id = %message.message_id, "message sent");
        state.available.push_back(StoredMessage {
            message,
            enqueued_at: now,
            receive_count: 0,
        });
        self.metrics.record_sent(self.name.as_str());
        self.metrics.set_queue_depth(self.name.as_str(), state.available.len());
        drop(state);
        Ok(())
    }

    /// Delivers the next available message, if any.
    ///
    /// The message stays hidden for the visibility timeout; ack it with
    /// the returned receipt to remove it, or let the window lapse to
    /// have it redelivered. In strict mode no delivery happens while
    /// another message is in flight.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn receive(&self) -> Result<Option<Delivery>> {
        let now = self.clock.now();
        let mut state = self.state.write().map_err(poison_err)?;
        self.sweep(&mut state, now)?;

        if self.options.delivery_order == DeliveryOrder::Strict && !state.in_flight.is_empty() {
            return Ok(None);
        }

        let Some(mut stored) = state.available.pop_front() else {
            self.metrics.set_queue_depth(self.name.as_str(), 0);
            return Ok(None);
        };
        stored.receive_count += 1;

        let receipt = ReceiptHandle::generate();
        let delivery = Delivery {
            receipt,
            message: stored.message.clone(),
            receive_count: stored.receive_count,
        };
        if stored.receive_count > 1 {
            debug!(
                queue = %self.name,
                message_id = %stored.message.message_id,
                receive_count = stored.receive_count,
                "message redelivered"
            );
            self.metrics.record_redelivered(self.name.as_str());
        }
        self.metrics.record_delivered(self.name.as_str());
        self.metrics.set_queue_depth(self.name.as_str(), state.available.len());
        state.in_flight.insert(receipt, InFlightMessage {
            stored,
            delivered_at: now,
        });
        drop(state);
        Ok(Some(delivery))
    }

    /// Acknowledges a delivery, removing the message.
    ///
    /// Returns `false` when the receipt is no longer current, which
    /// happens once the visibility window has lapsed and the message
    /// has been released for redelivery (or dead-lettered).
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn ack(&self, receipt: ReceiptHandle) -> Result<bool> {
        let now = self.clock.now();
        let mut state = self.state.write().map_err(poison_err)?;
        self.sweep(&mut state, now)?;
        let removed = state.in_flight.remove(&receipt);
        drop(state);
        match removed {
            Some(in_flight) => {
                debug!(
                    queue = %self.name,
                    message_id = %in_flight.stored.message.message_id,
                    "message acked"
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Releases a delivery without acknowledging it.
    ///
    /// The message immediately becomes deliverable again, or moves to
    /// the dead-letter queue if its receive budget is exhausted.
    /// Returns `false` when the receipt is no longer current.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn nack(&self, receipt: ReceiptHandle) -> Result<bool> {
        let now = self.clock.now();
        let mut state = self.state.write().map_err(poison_err)?;
        self.sweep(&mut state, now)?;
        let Some(in_flight) = state.in_flight.remove(&receipt) else {
            drop(state);
            return Ok(false);
        };
        debug!(
            queue = %self.name,
            message_id = %in_flight.stored.message.message_id,
            "message released"
        );
        self.release(&mut state, in_flight.stored)?;
        self.metrics.set_queue_depth(self.name.as_str(), state.available.len());
        drop(state);
        Ok(true)
    }

    /// Returns how many messages are waiting for delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn depth(&self) -> Result<usize> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.available.len())
    }

    /// Returns how many messages are delivered but unacknowledged.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn in_flight(&self) -> Result<usize> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.in_flight.len())
    }

    /// Returns whether the queue holds no messages at all.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.available.is_empty() && state.in_flight.is_empty())
    }

    /// Applies visibility expiry and retention up to `now`.
    fn sweep(&self, state: &mut QueueState, now: DateTime<Utc>) -> Result<()> {
        let expired: Vec<ReceiptHandle> = state
            .in_flight
            .iter()
            .filter(|(_, in_flight)| {
                let hidden_for = now
                    .signed_duration_since(in_flight.delivered_at)
                    .to_std()
                    .unwrap_or_default();
                hidden_for >= self.options.visibility_timeout
            })
            .map(|(receipt, _)| *receipt)
            .collect();
        for receipt in expired {
            if let Some(in_flight) = state.in_flight.remove(&receipt) {
                debug!(
                    queue = %self.name,
                    message_id = %in_flight.stored.message.message_id,
                    receive_count = in_flight.stored.receive_count,
                    "visibility timeout lapsed"
                );
                self.release(state, in_flight.stored)?;
            }
        }

        state.available.retain(|stored| {
            let age = now
                .signed_duration_since(stored.enqueued_at)
                .to_std()
                .unwrap_or_default();
            if age >= self.options.retention {
                warn!(
                    queue = %self.name,
                    message_id = %stored.message.message_id,
                    "message dropped after retention elapsed"
                );
                self.metrics.record_expired(self.name.as_str());
                false
            } else {
                true
            }
        });
        Ok(())
    }

    /// Puts a failed delivery back in circulation or dead-letters it.
    fn release(&self, state: &mut QueueState, stored: StoredMessage) -> Result<()> {
        if let Some(link) = &self.dead_letter {
            if stored.receive_count >= link.max_receive_count.get() {
                warn!(
                    queue = %self.name,
                    dead_letter = %link.queue.name(),
                    message_id = %stored.message.message_id,
                    receive_count = stored.receive_count,
                    "receive budget exhausted; message moved to dead-letter queue"
                );
                self.metrics.record_dead_lettered(self.name.as_str());
                link.queue.send(stored.message)?;
                return Ok(());
            }
        }
        match self.options.delivery_order {
            DeliveryOrder::BestEffort => state.available.push_back(stored),
            DeliveryOrder::Strict => state.available.push_front(stored),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use gantry_core::clock::VirtualClock;

    fn arrival(key: &str) -> Result<ArrivalMessage> {
        Ok(ArrivalMessage::new(
            "dropbox".parse()?,
            key.parse()?,
            64,
            Utc::now(),
        ))
    }

    fn short_queue(clock: Arc<VirtualClock>) -> Result<RelayQueue> {
        let options = RelayQueueOptions {
            visibility_timeout: Duration::from_secs(60),
            retention: Duration::from_secs(3600),
            delivery_order: DeliveryOrder::BestEffort,
        };
        Ok(RelayQueue::new("dropbox-queue".parse()?, options).with_clock(clock))
    }

    #[test]
    fn ack_within_the_window_removes_the_message() -> Result<()> {
        let clock = Arc::new(VirtualClock::at_epoch());
        let queue = short_queue(clock)?;
        queue.send(arrival("batch-001.csv")?)?;

        let delivery = queue.receive()?.ok_or_else(|| Error::internal("no delivery"))?;
        assert_eq!(delivery.receive_count, 1);
        assert!(queue.ack(delivery.receipt)?);
        assert!(queue.is_empty()?);

        // A second ack with the same receipt is stale.
        assert!(!queue.ack(delivery.receipt)?);
        Ok(())
    }

    #[test]
    fn visibility_expiry_redelivers_with_incremented_count() -> Result<()> {
        let clock = Arc::new(VirtualClock::at_epoch());
        let queue = short_queue(Arc::clone(&clock))?;
        queue.send(arrival("batch-001.csv")?)?;

        let first = queue.receive()?.ok_or_else(|| Error::internal("no delivery"))?;
        clock.advance(Duration::from_secs(61));

        let second = queue.receive()?.ok_or_else(|| Error::internal("no redelivery"))?;
        assert_eq!(second.receive_count, 2);
        assert_eq!(second.message.message_id, first.message.message_id);

        // The first receipt died with its window.
        assert!(!queue.ack(first.receipt)?);
        assert!(queue.ack(second.receipt)?);
        Ok(())
    }

    #[test]
    fn nack_rejoins_at_the_tail_in_best_effort_mode() -> Result<()> {
        let clock = Arc::new(VirtualClock::at_epoch());
        let queue = short_queue(clock)?;
        queue.send(arrival("first.csv")?)?;
        queue.send(arrival("second.csv")?)?;

        let delivery = queue.receive()?.ok_or_else(|| Error::internal("no delivery"))?;
        assert_eq!(delivery.message.key.as_str(), "first.csv");
        assert!(queue.nack(delivery.receipt)?);

        let next = queue.receive()?.ok_or_else(|| Error::internal("no delivery"))?;
        assert_eq!(next.message.key.as_str(), "second.csv");
        Ok(())
    }

    #[test]
    fn strict_mode_keeps_one_in_flight_and_rejoins_at_the_head() -> Result<()> {
        let clock = Arc::new(VirtualClock::at_epoch());
        let options = RelayQueueOptions {
            visibility_timeout: Duration::from_secs(60),
            retention: Duration::from_secs(3600),
            delivery_order: DeliveryOrder::Strict,
        };
        let queue = RelayQueue::new("dropbox-queue".parse()?, options).with_clock(clock);
        queue.send(arrival("first.csv")?)?;
        queue.send(arrival("second.csv")?)?;

        let delivery = queue.receive()?.ok_or_else(|| Error::internal("no delivery"))?;
        assert!(queue.receive()?.is_none(), "strict mode allows one in flight");

        assert!(queue.nack(delivery.receipt)?);
        let redelivered = queue.receive()?.ok_or_else(|| Error::internal("no delivery"))?;
        assert_eq!(redelivered.message.key.as_str(), "first.csv");
        Ok(())
    }

    #[test]
    fn exhausted_receive_budget_routes_to_the_dead_letter_queue() -> Result<()> {
        let clock = Arc::new(VirtualClock::at_epoch());
        let dead_letter = Arc::new(
            RelayQueue::new("dropbox-queue-dlq".parse()?, RelayQueueOptions::default())
                .with_clock(clock.clone()),
        );
        let options = RelayQueueOptions {
            visibility_timeout: Duration::from_secs(60),
            retention: Duration::from_secs(3600),
            delivery_order: DeliveryOrder::BestEffort,
        };
        let max = NonZeroU32::new(2).ok_or_else(|| Error::internal("nonzero"))?;
        let queue = RelayQueue::new("dropbox-queue".parse()?, options)
            .with_dead_letter(Arc::clone(&dead_letter), max)
            .with_clock(clock);

        let message = arrival("batch-001.csv")?;
        let message_id = message.message_id;
        queue.send(message)?;

        // First failure: under the budget, so it rejoins.
        let first = queue.receive()?.ok_or_else(|| Error::internal("no delivery"))?;
        assert!(queue.nack(first.receipt)?);
        assert_eq!(dead_letter.depth()?, 0);

        // Second failure exhausts the budget of two receives.
        let second = queue.receive()?.ok_or_else(|| Error::internal("no delivery"))?;
        assert_eq!(second.receive_count, 2);
        assert!(queue.nack(second.receipt)?);

        assert!(queue.is_empty()?);
        let moved = dead_letter.receive()?.ok_or_else(|| Error::internal("not moved"))?;
        assert_eq!(moved.message.message_id, message_id);
        Ok(())
    }

    #[test]
    fn retention_drops_stale_messages() -> Result<()> {
        let clock = Arc::new(VirtualClock::at_epoch());
        let queue = short_queue(Arc::clone(&clock))?;
        queue.send(arrival("batch-001.csv")?)?;

        clock.advance(Duration::from_secs(3601));
        assert!(queue.receive()?.is_none());
        assert!(queue.is_empty()?);
        Ok(())
    }

    #[test]
    fn options_derive_from_the_declarative_spec() -> Result<()> {
        let spec = QueueSpec::new("dropbox-queue")?
            .with_visibility_timeout(Duration::from_secs(120))
            .with_delivery_order(DeliveryOrder::Strict);
        let options = RelayQueueOptions::from(&spec);
        assert_eq!(options.visibility_timeout, Duration::from_secs(120));
        assert_eq!(options.delivery_order, DeliveryOrder::Strict);
        assert_eq!(options.retention, DEFAULT_RETENTION);
        Ok(())
    }
}
