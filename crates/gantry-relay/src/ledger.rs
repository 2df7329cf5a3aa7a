//! Processing status ledger.
//!
//! The ledger is the narrow key-value surface processing units use to
//! record per-item status: [`put`](StatusLedger::put) a record, or
//! [`get`](StatusLedger::get) the latest one back. Writes are
//! last-writer-wins and replace the stored record wholesale; nothing is
//! merged, and there are no deletes, scans, or queries. Anything richer
//! belongs in a real database, not here.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use gantry_core::name::{ObjectKey, TableName};

use crate::error::{Error, Result};

/// A short status label such as `PROCESSED` or `FAILED`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusValue(String);

impl StatusValue {
    /// Creates a status value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is empty or longer than 64 bytes.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(gantry_core::error::Error::InvalidInput(
                "status value cannot be empty".to_string(),
            )
            .into());
        }
        if value.len() > 64 {
            return Err(gantry_core::error::Error::InvalidInput(format!(
                "status value is too long ({} > 64 bytes)",
                value.len()
            ))
            .into());
        }
        Ok(Self(value))
    }

    /// Returns the status as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StatusValue {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// One row of the ledger: the status of a single item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    /// Key of the item the status describes.
    pub item_id: ObjectKey,
    /// Current status label.
    pub status: StatusValue,
    /// When the status was written.
    pub updated_at: DateTime<Utc>,
    /// Free-form annotations carried with the status.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl StatusRecord {
    /// Creates a record with no metadata.
    #[must_use]
    pub fn new(item_id: ObjectKey, status: StatusValue, updated_at: DateTime<Utc>) -> Self {
        Self {
            item_id,
            status,
            updated_at,
            metadata: BTreeMap::new(),
        }
    }

    /// Adds one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Key-value status storage used by processing units.
///
/// Implementations must apply writes in call order: a later `put` for
/// the same item replaces the earlier record entirely, including its
/// metadata.
#[async_trait]
pub trait StatusLedger: Send + Sync + fmt::Debug {
    /// Writes a record, replacing any existing record for the item.
    async fn put(&self, record: StatusRecord) -> Result<()>;

    /// Reads the latest record for `item_id`, or `None` if absent.
    async fn get(&self, item_id: &ObjectKey) -> Result<Option<StatusRecord>>;
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::internal("status ledger lock poisoned")
}

/// In-memory rendition of the status ledger.
#[derive(Debug)]
pub struct MemoryStatusLedger {
    table: TableName,
    state: RwLock<HashMap<ObjectKey, StatusRecord>>,
}

impl MemoryStatusLedger {
    /// Creates an empty ledger backing the given table name.
    #[must_use]
    pub fn new(table: TableName) -> Self {
        Self {
            table,
            state: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the table name this ledger backs.
    #[must_use]
    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Returns how many items have a recorded status.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.len())
    }

    /// Returns whether the ledger holds no records.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl StatusLedger for MemoryStatusLedger {
    async fn put(&self, record: StatusRecord) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        debug!(
            table = %self.table,
            item = %record.item_id,
            status = %record.status,
            "status recorded"
        );
        state.insert(record.item_id.clone(), record);
        drop(state);
        Ok(())
    }

    async fn get(&self, item_id: &ObjectKey) -> Result<Option<StatusRecord>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.get(item_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    fn record(key: &str, status: &str) -> Result<StatusRecord> {
        let updated_at = Utc
            .with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .single()
            .ok_or_else(|| Error::internal("bad timestamp"))?;
        Ok(StatusRecord::new(key.parse()?, status.parse()?, updated_at))
    }

    #[tokio::test]
    async fn put_then_get_round_trips() -> Result<()> {
        let ledger = MemoryStatusLedger::new("ingest_status".parse()?);
        let written = record("batch-001.csv", "PROCESSED")?.with_metadata("rows", "2");
        ledger.put(written.clone()).await?;

        let read = ledger.get(&"batch-001.csv".parse()?).await?;
        assert_eq!(read, Some(written));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_items_read_as_none() -> Result<()> {
        let ledger = MemoryStatusLedger::new("ingest_status".parse()?);
        assert_eq!(ledger.get(&"missing.csv".parse()?).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn later_writes_replace_the_record_wholesale() -> Result<()> {
        let ledger = MemoryStatusLedger::new("ingest_status".parse()?);
        ledger
            .put(record("batch-001.csv", "STARTED")?.with_metadata("attempt", "1"))
            .await?;
        ledger.put(record("batch-001.csv", "PROCESSED")?).await?;

        let read = ledger
            .get(&"batch-001.csv".parse()?)
            .await?
            .ok_or_else(|| Error::internal("missing record"))?;
        assert_eq!(read.status.as_str(), "PROCESSED");
        assert!(read.metadata.is_empty(), "metadata must not be merged");
        assert_eq!(ledger.len()?, 1);
        Ok(())
    }

    #[test]
    fn records_serialize_in_camel_case() -> Result<()> {
        let json = serde_json::to_value(record("batch-001.csv", "PROCESSED")?)
            .map_err(|err| Error::internal(err.to_string()))?;
        assert!(json.get("itemId").is_some());
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("metadata").is_none(), "empty metadata is omitted");
        Ok(())
    }

    #[test]
    fn status_values_are_validated() {
        assert!(StatusValue::new("PROCESSED").is_ok());
        assert!(StatusValue::new("").is_err());
        assert!(StatusValue::new("x".repeat(65)).is_err());
    }
}
