//! Processing unit invocation.
//!
//! [`QueueBinding`] is the runtime rendition of a queue-to-function
//! binding: a pump that receives batches from a [`RelayQueue`], invokes
//! the bound [`ProcessingUnit`], acks successes, and releases failures
//! back to the queue. The pump never retries on its own; redelivery and
//! dead-lettering are the queue's declarative policy.
//!
//! Each invocation carries the unit's resolved environment contract, so
//! the unit reads its dependencies (bucket names, table names, tuning)
//! exactly as it would from real process environment variables.

use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn, Instrument};

use gantry_core::env::EnvMap;
use gantry_core::name::FunctionName;
use gantry_core::observability::relay_span;

use crate::error::Result;
use crate::message::{ArrivalMessage, Delivery};
use crate::metrics::{RelayMetrics, TimingGuard};
use crate::queue::RelayQueue;

/// One invocation of a processing unit.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Name of the unit being invoked.
    pub unit: FunctionName,
    /// The message that triggered the invocation.
    pub message: ArrivalMessage,
    /// The unit's resolved environment contract.
    pub environment: Arc<EnvMap>,
    /// How many times the message has been received, counting this one.
    pub receive_count: u32,
}

/// A unit of processing logic bound to a relay queue.
///
/// Delivery is at least once: the same message can be processed more
/// than once, and after a redelivery it may arrive out of order
/// relative to its neighbors. Implementations must therefore be
/// idempotent with respect to duplicate delivery.
///
/// Returning an error does not fail the pump. The delivery is released
/// and the queue's redelivery and dead-letter policy decides what
/// happens next.
#[async_trait]
pub trait ProcessingUnit: Send + Sync + fmt::Debug {
    /// Processes one invocation.
    async fn process(&self, invocation: Invocation) -> Result<()>;
}

/// Outcome counts of a pump run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Invocations that succeeded and were acked.
    pub succeeded: usize,
    /// Invocations that failed and were released.
    pub failed: usize,
}

impl RunSummary {
    /// Returns the total number of invocations.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    fn merge(&mut self, other: RunSummary) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

/// Binds a processing unit to a relay queue.
#[derive(Debug)]
pub struct QueueBinding {
    unit_name: FunctionName,
    unit: Arc<dyn ProcessingUnit>,
    queue: Arc<RelayQueue>,
    environment: Arc<EnvMap>,
    batch_size: NonZeroU32,
    metrics: RelayMetrics,
}

impl QueueBinding {
    /// Creates a binding pumping `queue` into `unit`.
    #[must_use]
    pub fn new(
        unit_name: FunctionName,
        unit: Arc<dyn ProcessingUnit>,
        queue: Arc<RelayQueue>,
        environment: EnvMap,
        batch_size: NonZeroU32,
    ) -> Self {
        Self {
            unit_name,
            unit,
            queue,
            environment: Arc::new(environment),
            batch_size,
            metrics: RelayMetrics::new(),
        }
    }

    /// Returns the bound unit's name.
    #[must_use]
    pub fn unit_name(&self) -> &FunctionName {
        &self.unit_name
    }

    /// Returns the queue this binding pumps.
    #[must_use]
    pub fn queue(&self) -> &Arc<RelayQueue> {
        &self.queue
    }

    /// Returns how many messages one poll may deliver.
    #[must_use]
    pub fn batch_size(&self) -> NonZeroU32 {
        self.batch_size
    }

    /// Receives and processes at most one batch.
    ///
    /// # Errors
    ///
    /// Returns an error only for relay plumbing failures; failing
    /// invocations are counted in the summary, not surfaced as errors.
    pub async fn poll_once(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for _ in 0..self.batch_size.get() {
            let Some(delivery) = self.queue.receive()? else {
                break;
            };
            self.invoke(delivery, &mut summary).await?;
        }
        Ok(summary)
    }

    /// Pumps the queue until a poll delivers nothing.
    ///
    /// A persistently failing unit terminates this loop only through
    /// the queue's dead-letter policy; without one, failed messages
    /// keep rejoining and the loop keeps running until retention drops
    /// them. Prefer [`poll_once`](Self::poll_once) in that situation.
    ///
    /// # Errors
    ///
    /// Returns an error for relay plumbing failures.
    pub async fn run_until_idle(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        loop {
            let batch = self.poll_once().await?;
            if batch.total() == 0 {
                break;
            }
            summary.merge(batch);
        }
        info!(
            unit = %self.unit_name,
            queue = %self.queue.name(),
            succeeded = summary.succeeded,
            failed = summary.failed,
            "binding drained"
        );
        Ok(summary)
    }

    async fn invoke(&self, delivery: Delivery, summary: &mut RunSummary) -> Result<()> {
        let invocation = Invocation {
            unit: self.unit_name.clone(),
            message: delivery.message.clone(),
            environment: Arc::clone(&self.environment),
            receive_count: delivery.receive_count,
        };
        debug!(
            unit = %self.unit_name,
            queue = %self.queue.name(),
            message_id = %delivery.message.message_id,
            receive_count = delivery.receive_count,
            "invoking processing unit"
        );
        let timer = TimingGuard::new(|elapsed| {
            self.metrics
                .observe_invocation_duration(self.unit_name.as_str(), elapsed);
        });
        let outcome = self
            .unit
            .process(invocation)
            .instrument(relay_span("invoke", self.queue.name().as_str()))
            .await;
        drop(timer);
        match outcome {
            Ok(()) => {
                self.metrics.record_invocation(
                    self.unit_name.as_str(),
                    self.queue.name().as_str(),
                    "ok",
                );
                if !self.queue.ack(delivery.receipt)? {
                    warn!(
                        unit = %self.unit_name,
                        queue = %self.queue.name(),
                        message_id = %delivery.message.message_id,
                        "ack was stale; the visibility window lapsed during processing"
                    );
                }
                summary.succeeded += 1;
            }
            Err(err) => {
                self.metrics.record_invocation(
                    self.unit_name.as_str(),
                    self.queue.name().as_str(),
                    "error",
                );
                warn!(
                    unit = %self.unit_name,
                    queue = %self.queue.name(),
                    message_id = %delivery.message.message_id,
                    receive_count = delivery.receive_count,
                    error = %err,
                    "processing unit failed; delivery released"
                );
                self.queue.nack(delivery.receipt)?;
                summary.failed += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use bytes::Bytes;

    use gantry_core::name::BucketName;

    use crate::error::Error;
    use crate::queue::RelayQueueOptions;
    use crate::store::MemoryObjectStore;

    /// Succeeds always, counting invocations and remembering one env key.
    #[derive(Debug, Default)]
    struct RecordingUnit {
        invocations: AtomicUsize,
        ingest_bucket: Mutex<Option<String>>,
    }

    #[async_trait]
    impl ProcessingUnit for RecordingUnit {
        async fn process(&self, invocation: Invocation) -> Result<()> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            let seen = invocation
                .environment
                .get("INGEST_BUCKET_NAME")
                .map(str::to_string);
            *self
                .ingest_bucket
                .lock()
                .map_err(|_| Error::internal("mutex poisoned"))? = seen;
            Ok(())
        }
    }

    /// Fails the first `failures_left` invocations, then succeeds.
    #[derive(Debug)]
    struct FlakyUnit {
        failures_left: AtomicU32,
    }

    impl FlakyUnit {
        fn failing(times: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(times),
            }
        }
    }

    #[async_trait]
    impl ProcessingUnit for FlakyUnit {
        async fn process(&self, invocation: Invocation) -> Result<()> {
            let remaining = self.failures_left.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_left.store(remaining - 1, Ordering::SeqCst);
                return Err(Error::invocation(
                    invocation.unit.as_str(),
                    "induced failure",
                ));
            }
            Ok(())
        }
    }

    fn wired_queue(max_receive: u32) -> Result<(MemoryObjectStore, Arc<RelayQueue>, Arc<RelayQueue>)>
    {
        let store = MemoryObjectStore::new();
        let bucket: BucketName = "dropbox".parse()?;
        store.register_bucket(bucket.clone())?;

        let dead_letter = Arc::new(RelayQueue::new(
            "dropbox-queue-dlq".parse()?,
            RelayQueueOptions::default(),
        ));
        let options = RelayQueueOptions {
            visibility_timeout: Duration::from_secs(60),
            retention: Duration::from_secs(3600),
            delivery_order: gantry_blueprint::queue::DeliveryOrder::BestEffort,
        };
        let max = NonZeroU32::new(max_receive).ok_or_else(|| Error::internal("nonzero"))?;
        let queue = Arc::new(
            RelayQueue::new("dropbox-queue".parse()?, options)
                .with_dead_letter(Arc::clone(&dead_letter), max),
        );
        store.subscribe(&bucket, Arc::clone(&queue))?;
        Ok((store, queue, dead_letter))
    }

    fn binding(unit: Arc<dyn ProcessingUnit>, queue: Arc<RelayQueue>) -> Result<QueueBinding> {
        let environment = EnvMap::new().with("INGEST_BUCKET_NAME", "ingest-bucket");
        let batch = NonZeroU32::new(2).ok_or_else(|| Error::internal("nonzero"))?;
        Ok(QueueBinding::new(
            "dropbox-processor".parse()?,
            unit,
            queue,
            environment,
            batch,
        ))
    }

    #[tokio::test]
    async fn successful_invocations_ack_and_see_the_environment() -> Result<()> {
        let (store, queue, _dlq) = wired_queue(1)?;
        let unit = Arc::new(RecordingUnit::default());
        let binding = binding(Arc::clone(&unit) as Arc<dyn ProcessingUnit>, queue)?;

        let bucket: BucketName = "dropbox".parse()?;
        store.put_object(&bucket, "batch-001.csv".parse()?, Bytes::from_static(b"x"))?;
        store.put_object(&bucket, "batch-002.csv".parse()?, Bytes::from_static(b"y"))?;

        let summary = binding.run_until_idle().await?;
        assert_eq!(summary, RunSummary { succeeded: 2, failed: 0 });
        assert_eq!(unit.invocations.load(Ordering::SeqCst), 2);
        assert!(binding.queue().is_empty()?);

        let seen = unit
            .ingest_bucket
            .lock()
            .map_err(|_| Error::internal("mutex poisoned"))?
            .clone();
        assert_eq!(seen.as_deref(), Some("ingest-bucket"));
        Ok(())
    }

    #[tokio::test]
    async fn transient_failures_redeliver_until_success() -> Result<()> {
        let (store, queue, dlq) = wired_queue(3)?;
        let unit = Arc::new(FlakyUnit::failing(2));
        let binding = binding(unit as Arc<dyn ProcessingUnit>, queue)?;

        let bucket: BucketName = "dropbox".parse()?;
        store.put_object(&bucket, "batch-001.csv".parse()?, Bytes::from_static(b"x"))?;

        let summary = binding.run_until_idle().await?;
        assert_eq!(summary, RunSummary { succeeded: 1, failed: 2 });
        assert!(dlq.is_empty()?, "the budget of three receives was enough");
        Ok(())
    }

    #[tokio::test]
    async fn persistent_failure_ends_in_the_dead_letter_queue() -> Result<()> {
        let (store, queue, dlq) = wired_queue(2)?;
        let unit = Arc::new(FlakyUnit::failing(u32::MAX));
        let binding = binding(unit as Arc<dyn ProcessingUnit>, queue)?;

        let bucket: BucketName = "dropbox".parse()?;
        store.put_object(&bucket, "batch-001.csv".parse()?, Bytes::from_static(b"x"))?;

        let summary = binding.run_until_idle().await?;
        assert_eq!(summary, RunSummary { succeeded: 0, failed: 2 });
        assert_eq!(dlq.depth()?, 1);
        assert!(binding.queue().is_empty()?);
        Ok(())
    }

    #[tokio::test]
    async fn batch_size_bounds_each_poll() -> Result<()> {
        let (store, queue, _dlq) = wired_queue(1)?;
        let unit = Arc::new(RecordingUnit::default());
        let environment = EnvMap::new();
        let binding = QueueBinding::new(
            "dropbox-processor".parse()?,
            unit as Arc<dyn ProcessingUnit>,
            queue,
            environment,
            NonZeroU32::MIN,
        );

        let bucket: BucketName = "dropbox".parse()?;
        for key in ["a.csv", "b.csv", "c.csv"] {
            store.put_object(&bucket, key.parse()?, Bytes::from_static(b"x"))?;
        }

        let first = binding.poll_once().await?;
        assert_eq!(first.total(), 1);
        assert_eq!(binding.queue().depth()?, 2);
        Ok(())
    }
}
