//! Arrival notification messages and their deliveries.
//!
//! An [`ArrivalMessage`] is what the notifier publishes when an object
//! lands in a registered bucket. It references the object, never the
//! payload; consumers fetch the bytes from the store themselves. The
//! wire shape is camelCase JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gantry_core::id::{MessageId, ReceiptHandle};
use gantry_core::name::{BucketName, ObjectKey};

/// A notification that an object was created in a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalMessage {
    /// Unique id assigned when the message is published.
    pub message_id: MessageId,
    /// Bucket the object was created in.
    pub bucket: BucketName,
    /// Key of the created object.
    pub key: ObjectKey,
    /// Object size in bytes.
    pub size_bytes: u64,
    /// When the arrival was observed.
    pub event_time: DateTime<Utc>,
}

impl ArrivalMessage {
    /// Creates a message with a freshly generated id.
    #[must_use]
    pub fn new(
        bucket: BucketName,
        key: ObjectKey,
        size_bytes: u64,
        event_time: DateTime<Utc>,
    ) -> Self {
        Self {
            message_id: MessageId::generate(),
            bucket,
            key,
            size_bytes,
            event_time,
        }
    }
}

/// One delivery of a message to a consumer.
///
/// The same message can be delivered more than once; each delivery
/// carries a fresh receipt and the count of receives so far, this one
/// included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Token for acknowledging or releasing this delivery.
    pub receipt: ReceiptHandle,
    /// The delivered message.
    pub message: ArrivalMessage,
    /// How many times the message has been received, counting this one.
    pub receive_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> gantry_core::error::Result<ArrivalMessage> {
        Ok(ArrivalMessage::new(
            "dropbox".parse()?,
            "batch-001.csv".parse()?,
            64,
            Utc::now(),
        ))
    }

    #[test]
    fn wire_shape_is_camel_case() -> gantry_core::error::Result<()> {
        let message = sample()?;
        let json = serde_json::to_string(&message).map_err(|e| {
            gantry_core::error::Error::Serialization {
                message: e.to_string(),
            }
        })?;
        assert!(json.contains("\"messageId\""));
        assert!(json.contains("\"sizeBytes\""));
        assert!(json.contains("\"eventTime\""));
        assert!(json.contains("\"batch-001.csv\""));
        Ok(())
    }

    #[test]
    fn messages_get_unique_ids() -> gantry_core::error::Result<()> {
        assert_ne!(sample()?.message_id, sample()?.message_id);
        Ok(())
    }
}
