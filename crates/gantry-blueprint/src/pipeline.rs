//! The ingest pipeline composite.
//!
//! One call declares the full ingest wiring on a blueprint: a dropbox
//! bucket whose arrivals are staged, an ingest bucket whose arrivals are
//! indexed, a snapshot bucket with lifecycle expiry, a relay stage
//! (queue plus dead-letter queue) per event source, the two processing
//! functions with their environment contracts, and the status table the
//! ingest function writes progress to.
//!
//! The composite is a function over a [`Blueprint`], not a container:
//! it returns the refs it created and the blueprint stays the single
//! declaration surface. Callers can keep wiring against the returned
//! refs afterwards.

use std::num::NonZeroU32;
use std::time::Duration;

use tracing::info;

use gantry_core::env::EnvMap;
use gantry_core::name::{BucketName, QueueName, TableName};

use crate::blueprint::{
    BindingOptions, Blueprint, BucketRef, FunctionRef, QueueRef, TableRef,
};
use crate::bucket::BucketSpec;
use crate::error::Result;
use crate::function::FunctionSpec;
use crate::queue::{QueueSpec, DEAD_LETTER_RETENTION};
use crate::table::{BackupPlan, TableSpec};

/// Environment keys the dropbox processing unit is invoked with.
pub mod dropbox_env {
    /// Bucket staged files arrive in.
    pub const DROPBOX_BUCKET_NAME: &str = "DROPBOX_BUCKET_NAME";
    /// Bucket accepted files are moved to.
    pub const INGEST_BUCKET_NAME: &str = "INGEST_BUCKET_NAME";
    /// Queue the unit consumes arrival notifications from.
    pub const DROPBOX_QUEUE_NAME: &str = "DROPBOX_QUEUE_NAME";
    /// Log level for the unit's own logger.
    pub const CONSOLE_LOG_LEVEL: &str = "CONSOLE_LOG_LEVEL";
}

/// Environment keys the ingest processing unit is invoked with.
pub mod ingest_env {
    /// Search domain endpoint documents are indexed into.
    pub const OPEN_SEARCH_ENDPOINT: &str = "OPEN_SEARCH_ENDPOINT";
    /// Bucket the unit reads accepted files from.
    pub const BUCKET_NAME: &str = "BUCKET_NAME";
    /// Status table progress records are written to.
    pub const INGEST_STATUS_TABLE: &str = "INGEST_STATUS_TABLE";
    /// Secondary index used for by-file-name status lookups.
    pub const INGEST_STATUS_FILE_NAME_GSI: &str = "INGEST_STATUS_FILE_NAME_GSI";
    /// Log level for the unit's own logger.
    pub const CONSOLE_LOG_LEVEL: &str = "CONSOLE_LOG_LEVEL";
    /// Upload chunk size in MiB.
    pub const CHUNK_SIZE_MB: &str = "CHUNK_SIZE_MB";
    /// Whether the unit assigns document ids itself.
    pub const GENERATE_IDS: &str = "GENERATE_IDS";
    /// Worker process cap.
    pub const MAX_PROCESSES: &str = "MAX_PROCESSES";
    /// Largest file the unit accepts, in MiB.
    pub const MAX_FILE_SIZE_MB: &str = "MAX_FILE_SIZE_MB";
    /// Search client request timeout in seconds.
    pub const OPENSEARCH_CLIENT_REQUEST_TIMEOUT: &str = "OPENSEARCH_CLIENT_REQUEST_TIMEOUT";
}

/// Default values for the injected environment contracts.
pub mod defaults {
    /// Default log level for both units.
    pub const LOG_LEVEL: &str = "INFO";
    /// Default upload chunk size in MiB.
    pub const CHUNK_SIZE_MB: &str = "5";
    /// Document ids are generated by default.
    pub const GENERATE_IDS: &str = "1";
    /// Default worker process cap.
    pub const MAX_PROCESSES: &str = "25";
    /// Default file size cap in MiB.
    pub const MAX_FILE_SIZE_MB: &str = "100";
    /// Default search client timeout in seconds.
    pub const SEARCH_CLIENT_TIMEOUT_SECS: &str = "60";
}

/// Status table name.
pub const STATUS_TABLE_NAME: &str = "ingest_status";
/// Status table partition key attribute.
pub const STATUS_PARTITION_KEY: &str = "file_type";
/// Status table sort key attribute.
pub const STATUS_SORT_KEY: &str = "ingest_started";
/// Name of the by-file-name lookup index.
pub const FILE_NAME_INDEX: &str = "file_name_index";
/// Attribute the by-file-name index partitions on.
pub const FILE_NAME_ATTRIBUTE: &str = "file_name";
/// Snapshot objects expire after ninety days.
pub const SNAPSHOT_EXPIRY: Duration = Duration::from_secs(90 * 24 * 60 * 60);

/// Builds the dropbox unit's environment contract.
#[must_use]
pub fn dropbox_environment(
    dropbox_bucket: &BucketName,
    ingest_bucket: &BucketName,
    queue: &QueueName,
) -> EnvMap {
    EnvMap::new()
        .with(dropbox_env::DROPBOX_BUCKET_NAME, dropbox_bucket.as_str())
        .with(dropbox_env::INGEST_BUCKET_NAME, ingest_bucket.as_str())
        .with(dropbox_env::DROPBOX_QUEUE_NAME, queue.as_str())
        .with(dropbox_env::CONSOLE_LOG_LEVEL, defaults::LOG_LEVEL)
}

/// Builds the ingest unit's environment contract.
///
/// `search_endpoint` is empty when no search domain is attached, which
/// local deployments allow.
#[must_use]
pub fn ingest_environment(
    ingest_bucket: &BucketName,
    table: &TableName,
    search_endpoint: Option<&str>,
) -> EnvMap {
    EnvMap::new()
        .with(
            ingest_env::OPEN_SEARCH_ENDPOINT,
            search_endpoint.unwrap_or_default(),
        )
        .with(ingest_env::BUCKET_NAME, ingest_bucket.as_str())
        .with(ingest_env::INGEST_STATUS_TABLE, table.as_str())
        .with(ingest_env::INGEST_STATUS_FILE_NAME_GSI, FILE_NAME_INDEX)
        .with(ingest_env::CONSOLE_LOG_LEVEL, defaults::LOG_LEVEL)
        .with(ingest_env::CHUNK_SIZE_MB, defaults::CHUNK_SIZE_MB)
        .with(ingest_env::GENERATE_IDS, defaults::GENERATE_IDS)
        .with(ingest_env::MAX_PROCESSES, defaults::MAX_PROCESSES)
        .with(ingest_env::MAX_FILE_SIZE_MB, defaults::MAX_FILE_SIZE_MB)
        .with(
            ingest_env::OPENSEARCH_CLIENT_REQUEST_TIMEOUT,
            defaults::SEARCH_CLIENT_TIMEOUT_SECS,
        )
}

/// Resource names the pipeline declares.
///
/// Every field has a canonical default; override what the deployment
/// needs and leave the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestPipelineConfig {
    /// Bucket staged files arrive in.
    pub dropbox_bucket: String,
    /// Bucket accepted files are moved to.
    pub ingest_bucket: String,
    /// Bucket search snapshots land in.
    pub snapshot_bucket: String,
    /// Queue dropbox arrival notifications relay through.
    pub dropbox_queue: String,
    /// Queue ingest arrival notifications relay through.
    pub ingest_queue: String,
    /// Function that stages dropbox arrivals.
    pub dropbox_function: String,
    /// Function that indexes ingest arrivals.
    pub ingest_function: String,
    /// Status table name.
    pub status_table: String,
    /// Search domain endpoint for the ingest unit, if one is attached.
    pub search_endpoint: Option<String>,
    /// Whether the status table carries the scheduled backup plan.
    pub backup: bool,
}

impl Default for IngestPipelineConfig {
    fn default() -> Self {
        Self {
            dropbox_bucket: "dropbox".to_string(),
            ingest_bucket: "ingest-bucket".to_string(),
            snapshot_bucket: "search-snapshots".to_string(),
            dropbox_queue: "dropbox-queue".to_string(),
            ingest_queue: "ingest-queue".to_string(),
            dropbox_function: "dropbox-processor".to_string(),
            ingest_function: "ingest-processor".to_string(),
            status_table: STATUS_TABLE_NAME.to_string(),
            search_endpoint: None,
            backup: true,
        }
    }
}

impl IngestPipelineConfig {
    /// Sets the search endpoint injected into the ingest environment.
    #[must_use]
    pub fn with_search_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.search_endpoint = Some(endpoint.into());
        self
    }
}

/// Refs to everything [`IngestPipeline::build`] declared.
#[derive(Debug, Clone)]
pub struct IngestPipeline {
    /// Bucket staged files arrive in.
    pub dropbox_bucket: BucketRef,
    /// Bucket accepted files are moved to.
    pub ingest_bucket: BucketRef,
    /// Bucket search snapshots land in.
    pub snapshot_bucket: BucketRef,
    /// Relay queue for dropbox arrivals.
    pub dropbox_queue: QueueRef,
    /// Dead-letter queue behind the dropbox queue.
    pub dropbox_dead_letter: QueueRef,
    /// Relay queue for ingest arrivals.
    pub ingest_queue: QueueRef,
    /// Dead-letter queue behind the ingest queue.
    pub ingest_dead_letter: QueueRef,
    /// Function that stages dropbox arrivals.
    pub dropbox_function: FunctionRef,
    /// Function that indexes ingest arrivals.
    pub ingest_function: FunctionRef,
    /// Status table the ingest function writes to.
    pub status_table: TableRef,
}

impl IngestPipeline {
    /// Declares the full ingest wiring on `blueprint`.
    ///
    /// Messages that exhaust their single receive move to the stage's
    /// dead-letter queue; each binding delivers one message per
    /// invocation.
    ///
    /// # Errors
    ///
    /// Returns an error if any configured name is invalid or collides
    /// with a resource already declared on the blueprint.
    pub fn build(blueprint: &mut Blueprint, config: &IngestPipelineConfig) -> Result<Self> {
        let dropbox_bucket = blueprint.add_bucket(BucketSpec::new(&config.dropbox_bucket)?)?;
        let ingest_bucket = blueprint.add_bucket(BucketSpec::new(&config.ingest_bucket)?)?;
        let snapshot_bucket = blueprint.add_bucket(
            BucketSpec::new(&config.snapshot_bucket)?.with_expiry(SNAPSHOT_EXPIRY),
        )?;

        let dropbox_dead_letter = blueprint.add_queue(
            QueueSpec::new(format!("{}-dlq", config.dropbox_queue))?
                .with_retention(DEAD_LETTER_RETENTION),
        )?;
        let dropbox_queue = blueprint.add_queue(
            QueueSpec::new(&config.dropbox_queue)?
                .with_dead_letter(&dropbox_dead_letter, NonZeroU32::MIN),
        )?;
        let ingest_dead_letter = blueprint.add_queue(
            QueueSpec::new(format!("{}-dlq", config.ingest_queue))?
                .with_retention(DEAD_LETTER_RETENTION),
        )?;
        let ingest_queue = blueprint.add_queue(
            QueueSpec::new(&config.ingest_queue)?
                .with_dead_letter(&ingest_dead_letter, NonZeroU32::MIN),
        )?;

        let mut table_spec =
            TableSpec::new(&config.status_table, STATUS_PARTITION_KEY)?
                .with_sort_key(STATUS_SORT_KEY)
                .with_secondary_index(FILE_NAME_INDEX, FILE_NAME_ATTRIBUTE);
        if config.backup {
            table_spec = table_spec.with_backup(BackupPlan::default());
        }
        let status_table = blueprint.add_status_table(table_spec)?;

        let dropbox_function =
            blueprint.add_function(FunctionSpec::new(&config.dropbox_function)?)?;
        let ingest_function =
            blueprint.add_function(FunctionSpec::new(&config.ingest_function)?)?;

        blueprint.notify_on_object_created(&dropbox_bucket, &dropbox_queue)?;
        blueprint.notify_on_object_created(&ingest_bucket, &ingest_queue)?;
        blueprint.bind_queue(&dropbox_function, &dropbox_queue, BindingOptions::default())?;
        blueprint.bind_queue(&ingest_function, &ingest_queue, BindingOptions::default())?;

        let dropbox_defaults = dropbox_environment(
            dropbox_bucket.name(),
            ingest_bucket.name(),
            dropbox_queue.name(),
        );
        blueprint.extend_environment(&dropbox_function, &dropbox_defaults)?;
        let ingest_defaults = ingest_environment(
            ingest_bucket.name(),
            status_table.name(),
            config.search_endpoint.as_deref(),
        );
        blueprint.extend_environment(&ingest_function, &ingest_defaults)?;

        // The dropbox unit moves objects between the two buckets; the
        // ingest unit reads accepted files and records progress.
        blueprint.grant_bucket_access(&dropbox_function, &dropbox_bucket)?;
        blueprint.grant_bucket_access(&dropbox_function, &ingest_bucket)?;
        blueprint.grant_bucket_access(&ingest_function, &ingest_bucket)?;
        blueprint.grant_table_access(&ingest_function, &status_table)?;

        info!(
            dropbox = %dropbox_bucket.name(),
            ingest = %ingest_bucket.name(),
            table = %status_table.name(),
            "assembled ingest pipeline"
        );

        Ok(Self {
            dropbox_bucket,
            ingest_bucket,
            snapshot_bucket,
            dropbox_queue,
            dropbox_dead_letter,
            ingest_queue,
            ingest_dead_letter,
            dropbox_function,
            ingest_function,
            status_table,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;
    use crate::queue::DEFAULT_VISIBILITY_TIMEOUT;

    #[test]
    fn default_pipeline_declares_every_stage() -> Result<()> {
        let mut blueprint = Blueprint::new("ingest");
        let pipeline = IngestPipeline::build(&mut blueprint, &IngestPipelineConfig::default())?;

        assert_eq!(blueprint.buckets().len(), 3);
        assert_eq!(blueprint.queues().len(), 4);
        assert_eq!(blueprint.functions().len(), 2);
        assert_eq!(blueprint.tables().len(), 1);
        assert_eq!(blueprint.notifications().len(), 2);
        assert_eq!(blueprint.bindings().len(), 2);
        blueprint.validate()?;

        let queue = blueprint.queue(&pipeline.dropbox_queue)?;
        assert_eq!(queue.visibility_timeout(), DEFAULT_VISIBILITY_TIMEOUT);
        let dead_letter = queue
            .dead_letter()
            .ok_or_else(|| Error::wiring("dropbox queue has no dead letter"))?;
        assert_eq!(dead_letter.max_receive_count.get(), 1);
        Ok(())
    }

    #[test]
    fn dropbox_contract_names_both_buckets_and_the_queue() -> Result<()> {
        let mut blueprint = Blueprint::new("ingest");
        let pipeline = IngestPipeline::build(&mut blueprint, &IngestPipelineConfig::default())?;

        let env = blueprint.function(&pipeline.dropbox_function)?.environment();
        assert_eq!(env.get(dropbox_env::DROPBOX_BUCKET_NAME), Some("dropbox"));
        assert_eq!(env.get(dropbox_env::INGEST_BUCKET_NAME), Some("ingest-bucket"));
        assert_eq!(env.get(dropbox_env::DROPBOX_QUEUE_NAME), Some("dropbox-queue"));
        assert_eq!(env.get(dropbox_env::CONSOLE_LOG_LEVEL), Some("INFO"));
        Ok(())
    }

    #[test]
    fn ingest_contract_carries_table_index_and_tuning_defaults() -> Result<()> {
        let mut blueprint = Blueprint::new("ingest");
        let config = IngestPipelineConfig::default()
            .with_search_endpoint("https://search.opensearch.example.com");
        let pipeline = IngestPipeline::build(&mut blueprint, &config)?;

        let env = blueprint.function(&pipeline.ingest_function)?.environment();
        assert_eq!(
            env.get(ingest_env::OPEN_SEARCH_ENDPOINT),
            Some("https://search.opensearch.example.com")
        );
        assert_eq!(env.get(ingest_env::BUCKET_NAME), Some("ingest-bucket"));
        assert_eq!(env.get(ingest_env::INGEST_STATUS_TABLE), Some("ingest_status"));
        assert_eq!(
            env.get(ingest_env::INGEST_STATUS_FILE_NAME_GSI),
            Some("file_name_index")
        );
        assert_eq!(env.get(ingest_env::CHUNK_SIZE_MB), Some("5"));
        assert_eq!(env.get(ingest_env::GENERATE_IDS), Some("1"));
        assert_eq!(env.get(ingest_env::MAX_PROCESSES), Some("25"));
        assert_eq!(env.get(ingest_env::MAX_FILE_SIZE_MB), Some("100"));
        assert_eq!(
            env.get(ingest_env::OPENSEARCH_CLIENT_REQUEST_TIMEOUT),
            Some("60")
        );
        Ok(())
    }

    #[test]
    fn status_table_matches_the_ledger_schema() -> Result<()> {
        let mut blueprint = Blueprint::new("ingest");
        let pipeline = IngestPipeline::build(&mut blueprint, &IngestPipelineConfig::default())?;

        let table = blueprint.table(&pipeline.status_table)?;
        assert_eq!(table.partition_key(), STATUS_PARTITION_KEY);
        assert_eq!(table.sort_key(), Some(STATUS_SORT_KEY));
        let index = table
            .secondary_index()
            .ok_or_else(|| Error::wiring("status table has no secondary index"))?;
        assert_eq!(index.name, FILE_NAME_INDEX);
        assert_eq!(index.partition_key, FILE_NAME_ATTRIBUTE);
        assert!(table.point_in_time_recovery());
        assert!(table.backup().is_some());
        Ok(())
    }

    #[test]
    fn snapshot_bucket_expires_objects() -> Result<()> {
        let mut blueprint = Blueprint::new("ingest");
        let pipeline = IngestPipeline::build(&mut blueprint, &IngestPipelineConfig::default())?;

        let bucket = blueprint.bucket(&pipeline.snapshot_bucket)?;
        assert_eq!(bucket.expire_after(), Some(SNAPSHOT_EXPIRY));
        Ok(())
    }
}
