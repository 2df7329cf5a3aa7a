//! Status table specs.
//!
//! The status table is the durable key-value store processing functions
//! write ingest progress into. The blueprint declares its schema (keys,
//! secondary index, recovery and backup posture); the runtime accessor
//! contract over the table lives in the relay crate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use gantry_core::name::TableName;

use crate::error::{Error, Result};
use crate::removal::RemovalPolicy;
use crate::schedule::CronSchedule;

/// A keys-only global secondary index.
///
/// Only the declared partition key is projected; lookups through the
/// index return keys and fetch full rows from the base table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondaryIndex {
    /// Index name.
    pub name: String,
    /// Partition key attribute of the index.
    pub partition_key: String,
}

/// Periodic backup policy for a table.
///
/// The defaults mirror a daily 02:00 UTC backup with a one hour start
/// window and two hour completion window, moving recovery points to cold
/// storage after a week and deleting them after 120 days.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPlan {
    /// When the daily backup window opens.
    pub schedule: CronSchedule,
    /// How long the backup may wait to start.
    pub start_window: Duration,
    /// How long the backup may take overall.
    pub completion_window: Duration,
    /// Age at which recovery points move to cold storage.
    pub move_to_cold_after: Duration,
    /// Age at which recovery points are deleted.
    pub delete_after: Duration,
}

impl Default for BackupPlan {
    fn default() -> Self {
        Self {
            schedule: CronSchedule::DAILY_BACKUP,
            start_window: Duration::from_secs(60 * 60),
            completion_window: Duration::from_secs(2 * 60 * 60),
            move_to_cold_after: Duration::from_secs(7 * 24 * 60 * 60),
            delete_after: Duration::from_secs(120 * 24 * 60 * 60),
        }
    }
}

/// Declarative configuration for a durable key-value table.
///
/// # Example
///
/// ```rust
/// use gantry_blueprint::table::TableSpec;
///
/// let spec = TableSpec::new("ingest_status", "file_type")
///     .unwrap()
///     .with_sort_key("ingest_started")
///     .with_secondary_index("file_name_index", "file_name");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    name: TableName,
    partition_key: String,
    sort_key: Option<String>,
    secondary_index: Option<SecondaryIndex>,
    point_in_time_recovery: bool,
    removal: RemovalPolicy,
    backup: Option<BackupPlan>,
}

impl TableSpec {
    /// Creates a table spec with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a valid table name.
    pub fn new(name: impl Into<String>, partition_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: TableName::new(name)?,
            partition_key: partition_key.into(),
            sort_key: None,
            secondary_index: None,
            point_in_time_recovery: true,
            removal: RemovalPolicy::Destroy,
            backup: None,
        })
    }

    /// Adds a sort key to the primary key.
    #[must_use]
    pub fn with_sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.sort_key = Some(sort_key.into());
        self
    }

    /// Adds a keys-only global secondary index.
    #[must_use]
    pub fn with_secondary_index(
        mut self,
        name: impl Into<String>,
        partition_key: impl Into<String>,
    ) -> Self {
        self.secondary_index = Some(SecondaryIndex {
            name: name.into(),
            partition_key: partition_key.into(),
        });
        self
    }

    /// Enables or disables point-in-time recovery.
    #[must_use]
    pub fn with_point_in_time_recovery(mut self, enabled: bool) -> Self {
        self.point_in_time_recovery = enabled;
        self
    }

    /// Sets the removal policy.
    #[must_use]
    pub fn with_removal(mut self, removal: RemovalPolicy) -> Self {
        self.removal = removal;
        self
    }

    /// Attaches a periodic backup plan.
    #[must_use]
    pub fn with_backup(mut self, backup: BackupPlan) -> Self {
        self.backup = Some(backup);
        self
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &TableName {
        &self.name
    }

    /// Returns the partition key attribute.
    #[must_use]
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Returns the sort key attribute, if one is declared.
    #[must_use]
    pub fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }

    /// Returns the secondary index, if one is declared.
    #[must_use]
    pub fn secondary_index(&self) -> Option<&SecondaryIndex> {
        self.secondary_index.as_ref()
    }

    /// Returns whether point-in-time recovery is enabled.
    #[must_use]
    pub fn point_in_time_recovery(&self) -> bool {
        self.point_in_time_recovery
    }

    /// Returns the removal policy.
    #[must_use]
    pub fn removal(&self) -> RemovalPolicy {
        self.removal
    }

    /// Returns the backup plan, if one is attached.
    #[must_use]
    pub fn backup(&self) -> Option<&BackupPlan> {
        self.backup.as_ref()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.partition_key.is_empty() {
            return Err(Error::invalid_spec(
                "table",
                self.name.as_str(),
                "partition key cannot be empty",
            ));
        }
        if self.sort_key.as_deref() == Some("") {
            return Err(Error::invalid_spec(
                "table",
                self.name.as_str(),
                "sort key cannot be empty",
            ));
        }
        if let Some(index) = &self.secondary_index {
            if index.name.is_empty() || index.partition_key.is_empty() {
                return Err(Error::invalid_spec(
                    "table",
                    self.name.as_str(),
                    "secondary index name and partition key cannot be empty",
                ));
            }
        }
        if let Some(backup) = &self.backup {
            if backup.start_window.is_zero() || backup.completion_window.is_zero() {
                return Err(Error::invalid_spec(
                    "table",
                    self.name.as_str(),
                    "backup windows must be positive",
                ));
            }
            if backup.delete_after <= backup.move_to_cold_after {
                return Err(Error::invalid_spec(
                    "table",
                    self.name.as_str(),
                    "backup deletion must come after the move to cold storage",
                ));
            }
        }
        Ok(())
    }
}
