//! In-memory object store with arrival notifications.
//!
//! [`MemoryObjectStore`] executes the storage side of the relay: it
//! holds the objects of every provisioned bucket and publishes an
//! [`ArrivalMessage`](crate::message::ArrivalMessage) to each queue
//! subscribed to a bucket whenever an object is created there.
//!
//! Notification scoping is strict: only queues subscribed to the exact
//! bucket receive a message. Buckets without subscribers accept objects
//! silently, and overwriting an existing key counts as a new arrival.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

use gantry_core::clock::{Clock, SystemClock};
use gantry_core::name::{BucketName, ObjectKey};

use crate::error::{Error, Result};
use crate::message::ArrivalMessage;
use crate::queue::RelayQueue;

/// An object held by the store.
#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    created_at: DateTime<Utc>,
}

/// Per-bucket objects and notification subscribers.
#[derive(Debug, Default)]
struct BucketState {
    objects: BTreeMap<ObjectKey, StoredObject>,
    subscribers: Vec<Arc<RelayQueue>>,
}

#[derive(Debug, Default)]
struct StoreState {
    buckets: HashMap<BucketName, BucketState>,
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::internal("object store lock poisoned")
}

/// An in-memory bucket store that emits arrival notifications.
#[derive(Debug)]
pub struct MemoryObjectStore {
    clock: Arc<dyn Clock>,
    state: RwLock<StoreState>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    /// Creates an empty store with no buckets.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Replaces the time source, for deterministic tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a bucket. Registering the same bucket twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn register_bucket(&self, name: BucketName) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.buckets.entry(name).or_default();
        drop(state);
        Ok(())
    }

    /// Subscribes `queue` to object-created events in `bucket`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket is not registered or the lock is
    /// poisoned.
    pub fn subscribe(&self, bucket: &BucketName, queue: Arc<RelayQueue>) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        let bucket_state = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::not_provisioned("bucket", bucket.as_str()))?;
        debug!(bucket = %bucket, queue = %queue.name(), "arrival notifications subscribed");
        bucket_state.subscribers.push(queue);
        drop(state);
        Ok(())
    }

    /// Stores an object and notifies the bucket's subscribers.
    ///
    /// Overwriting an existing key is a fresh arrival and notifies
    /// again.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket is not registered, a notification
    /// cannot be published, or the lock is poisoned.
    pub fn put_object(&self, bucket: &BucketName, key: ObjectKey, data: Bytes) -> Result<()> {
        let now = self.clock.now();
        let size_bytes = data.len() as u64;
        let mut state = self.state.write().map_err(poison_err)?;
        let bucket_state = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::not_provisioned("bucket", bucket.as_str()))?;
        debug!(bucket = %bucket, key = %key, size_bytes, "object created");
        bucket_state.objects.insert(key.clone(), StoredObject {
            data,
            created_at: now,
        });
        let subscribers = bucket_state.subscribers.clone();
        drop(state);

        for queue in subscribers {
            queue.send(ArrivalMessage::new(
                bucket.clone(),
                key.clone(),
                size_bytes,
                now,
            ))?;
        }
        Ok(())
    }

    /// Fetches an object's contents, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket is not registered or the lock is
    /// poisoned.
    pub fn get_object(&self, bucket: &BucketName, key: &ObjectKey) -> Result<Option<Bytes>> {
        let state = self.state.read().map_err(poison_err)?;
        let bucket_state = state
            .buckets
            .get(bucket)
            .ok_or_else(|| Error::not_provisioned("bucket", bucket.as_str()))?;
        Ok(bucket_state.objects.get(key).map(|object| object.data.clone()))
    }

    /// Removes an object. Returns `false` when the key was absent.
    ///
    /// Deletions do not notify subscribers; only arrivals do.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket is not registered or the lock is
    /// poisoned.
    pub fn delete_object(&self, bucket: &BucketName, key: &ObjectKey) -> Result<bool> {
        let mut state = self.state.write().map_err(poison_err)?;
        let bucket_state = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::not_provisioned("bucket", bucket.as_str()))?;
        let removed = bucket_state.objects.remove(key).is_some();
        if removed {
            debug!(bucket = %bucket, key = %key, "object deleted");
        }
        drop(state);
        Ok(removed)
    }

    /// Returns when the object was created, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket is not registered or the lock is
    /// poisoned.
    pub fn object_created_at(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
    ) -> Result<Option<DateTime<Utc>>> {
        let state = self.state.read().map_err(poison_err)?;
        let bucket_state = state
            .buckets
            .get(bucket)
            .ok_or_else(|| Error::not_provisioned("bucket", bucket.as_str()))?;
        Ok(bucket_state.objects.get(key).map(|object| object.created_at))
    }

    /// Lists a bucket's keys in sorted order.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket is not registered or the lock is
    /// poisoned.
    pub fn list_keys(&self, bucket: &BucketName) -> Result<Vec<ObjectKey>> {
        let state = self.state.read().map_err(poison_err)?;
        let bucket_state = state
            .buckets
            .get(bucket)
            .ok_or_else(|| Error::not_provisioned("bucket", bucket.as_str()))?;
        Ok(bucket_state.objects.keys().cloned().collect())
    }

    /// Returns whether `name` has been registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn contains_bucket(&self, name: &BucketName) -> Result<bool> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.buckets.contains_key(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::queue::RelayQueueOptions;

    fn store_with(buckets: &[&str]) -> Result<MemoryObjectStore> {
        let store = MemoryObjectStore::new();
        for bucket in buckets {
            store.register_bucket(bucket.parse()?)?;
        }
        Ok(store)
    }

    #[test]
    fn put_then_get_round_trips() -> Result<()> {
        let store = store_with(&["dropbox"])?;
        let bucket: BucketName = "dropbox".parse()?;
        let key: ObjectKey = "batch-001.csv".parse()?;

        store.put_object(&bucket, key.clone(), Bytes::from_static(b"id,name\n"))?;
        assert_eq!(
            store.get_object(&bucket, &key)?,
            Some(Bytes::from_static(b"id,name\n"))
        );
        assert_eq!(store.get_object(&bucket, &"missing.csv".parse()?)?, None);
        assert_eq!(store.list_keys(&bucket)?, vec![key]);
        Ok(())
    }

    #[test]
    fn unregistered_buckets_are_rejected() -> Result<()> {
        let store = store_with(&["dropbox"])?;
        let unknown: BucketName = "elsewhere".parse()?;
        let err = store
            .put_object(&unknown, "batch-001.csv".parse()?, Bytes::new())
            .unwrap_err();
        assert!(matches!(err, Error::NotProvisioned { .. }));
        Ok(())
    }

    #[test]
    fn object_creation_notifies_every_subscriber() -> Result<()> {
        let store = store_with(&["dropbox"])?;
        let bucket: BucketName = "dropbox".parse()?;
        let first = Arc::new(RelayQueue::new(
            "dropbox-queue".parse()?,
            RelayQueueOptions::default(),
        ));
        let second = Arc::new(RelayQueue::new(
            "audit-queue".parse()?,
            RelayQueueOptions::default(),
        ));
        store.subscribe(&bucket, Arc::clone(&first))?;
        store.subscribe(&bucket, Arc::clone(&second))?;

        store.put_object(&bucket, "batch-001.csv".parse()?, Bytes::from_static(b"x"))?;

        for queue in [&first, &second] {
            let delivery = queue
                .receive()?
                .ok_or_else(|| Error::internal("missing notification"))?;
            assert_eq!(delivery.message.bucket, bucket);
            assert_eq!(delivery.message.key.as_str(), "batch-001.csv");
            assert_eq!(delivery.message.size_bytes, 1);
        }
        Ok(())
    }

    #[test]
    fn overwriting_a_key_is_a_fresh_arrival() -> Result<()> {
        let store = store_with(&["dropbox"])?;
        let bucket: BucketName = "dropbox".parse()?;
        let queue = Arc::new(RelayQueue::new(
            "dropbox-queue".parse()?,
            RelayQueueOptions::default(),
        ));
        store.subscribe(&bucket, Arc::clone(&queue))?;

        store.put_object(&bucket, "batch-001.csv".parse()?, Bytes::from_static(b"v1"))?;
        store.put_object(&bucket, "batch-001.csv".parse()?, Bytes::from_static(b"v2"))?;

        assert_eq!(queue.depth()?, 2);
        assert_eq!(
            store.get_object(&bucket, &"batch-001.csv".parse()?)?,
            Some(Bytes::from_static(b"v2"))
        );
        Ok(())
    }

    #[test]
    fn buckets_without_a_subscription_stay_silent() -> Result<()> {
        let store = store_with(&["dropbox", "scratch"])?;
        let watched: BucketName = "dropbox".parse()?;
        let unwatched: BucketName = "scratch".parse()?;
        let queue = Arc::new(RelayQueue::new(
            "dropbox-queue".parse()?,
            RelayQueueOptions::default(),
        ));
        store.subscribe(&watched, Arc::clone(&queue))?;

        store.put_object(&unwatched, "stray.csv".parse()?, Bytes::from_static(b"x"))?;

        assert!(queue.is_empty()?);
        assert_eq!(
            store.get_object(&unwatched, &"stray.csv".parse()?)?,
            Some(Bytes::from_static(b"x"))
        );
        Ok(())
    }

    #[test]
    fn delete_removes_without_notifying() -> Result<()> {
        let store = store_with(&["dropbox"])?;
        let bucket: BucketName = "dropbox".parse()?;
        let queue = Arc::new(RelayQueue::new(
            "dropbox-queue".parse()?,
            RelayQueueOptions::default(),
        ));
        store.subscribe(&bucket, Arc::clone(&queue))?;

        store.put_object(&bucket, "batch-001.csv".parse()?, Bytes::from_static(b"x"))?;
        let _ = queue.receive()?;

        assert!(store.delete_object(&bucket, &"batch-001.csv".parse()?)?);
        assert!(!store.delete_object(&bucket, &"batch-001.csv".parse()?)?);
        assert_eq!(store.get_object(&bucket, &"batch-001.csv".parse()?)?, None);
        assert_eq!(queue.depth()?, 0);
        Ok(())
    }
}
