//! Deterministic manifest rendering.
//!
//! [`Blueprint::synth`](crate::blueprint::Blueprint::synth) flattens a
//! blueprint into a [`Manifest`]: a plain serializable snapshot of every
//! declared resource, wiring rule, and grant. Entries are sorted by name
//! and durations are rendered as whole seconds, so the same declarations
//! always produce byte-identical JSON regardless of declaration order.
//!
//! The manifest is the handoff format between declaration and
//! provisioning. A deployment harness consumes it without ever touching
//! blueprint internals, and diffs between two manifests show exactly
//! what changed.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use gantry_core::cidr::IpCidr;
use gantry_core::env::EnvMap;
use gantry_core::name::{BucketName, DomainName, FunctionName, QueueName, TableName, ZoneName};

use crate::blueprint::{BindingRule, Blueprint, Grant, NotificationRule};
use crate::bucket::BucketSpec;
use crate::certificate::CertificateSpec;
use crate::error::{Error, Result};
use crate::function::FunctionSpec;
use crate::network::{NetworkSpec, SubnetSpec};
use crate::queue::{DeliveryOrder, QueueSpec};
use crate::removal::RemovalPolicy;
use crate::schedule::CronSchedule;
use crate::search::SearchDomainSpec;
use crate::table::{BackupPlan, SecondaryIndex, TableSpec};

/// Current manifest format version.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Resource entries
// ---------------------------------------------------------------------------

/// A bucket as rendered into the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketEntry {
    /// Bucket name.
    pub name: BucketName,
    /// Whether object versioning is enabled.
    pub versioned: bool,
    /// Object expiry in seconds, if configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_after_secs: Option<u64>,
    /// What happens to the bucket on teardown.
    pub removal: RemovalPolicy,
}

impl From<&BucketSpec> for BucketEntry {
    fn from(spec: &BucketSpec) -> Self {
        Self {
            name: spec.name().clone(),
            versioned: spec.versioned(),
            expire_after_secs: spec.expire_after().map(|d| d.as_secs()),
            removal: spec.removal(),
        }
    }
}

/// A queue's dead-letter target as rendered into the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterEntry {
    /// The queue exhausted messages move to.
    pub queue: QueueName,
    /// Receives allowed before a message moves.
    pub max_receive_count: u32,
}

/// A queue as rendered into the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    /// Queue name.
    pub name: QueueName,
    /// Visibility timeout in seconds.
    pub visibility_timeout_secs: u64,
    /// Message retention in seconds.
    pub retention_secs: u64,
    /// Dead-letter target, if configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_letter: Option<DeadLetterEntry>,
    /// Redelivery ordering promise.
    pub delivery_order: DeliveryOrder,
}

impl From<&QueueSpec> for QueueEntry {
    fn from(spec: &QueueSpec) -> Self {
        Self {
            name: spec.name().clone(),
            visibility_timeout_secs: spec.visibility_timeout().as_secs(),
            retention_secs: spec.retention().as_secs(),
            dead_letter: spec.dead_letter().map(|dl| DeadLetterEntry {
                queue: dl.queue.name().clone(),
                max_receive_count: dl.max_receive_count.get(),
            }),
            delivery_order: spec.delivery_order(),
        }
    }
}

/// A table's backup plan as rendered into the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntry {
    /// When the daily backup window opens.
    pub schedule: CronSchedule,
    /// Start window in seconds.
    pub start_window_secs: u64,
    /// Completion window in seconds.
    pub completion_window_secs: u64,
    /// Cold-storage transition age in seconds.
    pub move_to_cold_after_secs: u64,
    /// Deletion age in seconds.
    pub delete_after_secs: u64,
}

impl From<&BackupPlan> for BackupEntry {
    fn from(plan: &BackupPlan) -> Self {
        Self {
            schedule: plan.schedule,
            start_window_secs: plan.start_window.as_secs(),
            completion_window_secs: plan.completion_window.as_secs(),
            move_to_cold_after_secs: plan.move_to_cold_after.as_secs(),
            delete_after_secs: plan.delete_after.as_secs(),
        }
    }
}

/// A status table as rendered into the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableEntry {
    /// Table name.
    pub name: TableName,
    /// Partition key attribute.
    pub partition_key: String,
    /// Sort key attribute, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<String>,
    /// Secondary lookup index, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_index: Option<SecondaryIndex>,
    /// Whether point-in-time recovery is enabled.
    pub point_in_time_recovery: bool,
    /// What happens to the table on teardown.
    pub removal: RemovalPolicy,
    /// Scheduled backup plan, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupEntry>,
}

impl From<&TableSpec> for TableEntry {
    fn from(spec: &TableSpec) -> Self {
        Self {
            name: spec.name().clone(),
            partition_key: spec.partition_key().to_string(),
            sort_key: spec.sort_key().map(str::to_string),
            secondary_index: spec.secondary_index().cloned(),
            point_in_time_recovery: spec.point_in_time_recovery(),
            removal: spec.removal(),
            backup: spec.backup().map(BackupEntry::from),
        }
    }
}

/// A processing function as rendered into the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionEntry {
    /// Function name.
    pub name: FunctionName,
    /// Full environment, wiring contributions included.
    pub environment: EnvMap,
    /// Invocation timeout in seconds.
    pub timeout_secs: u64,
    /// Memory allocation in MiB.
    pub memory_mb: u32,
}

impl From<&FunctionSpec> for FunctionEntry {
    fn from(spec: &FunctionSpec) -> Self {
        Self {
            name: spec.name().clone(),
            environment: spec.environment().clone(),
            timeout_secs: spec.timeout().as_secs(),
            memory_mb: spec.memory_mb(),
        }
    }
}

/// A search domain as rendered into the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDomainEntry {
    /// Domain name.
    pub name: DomainName,
    /// Hosted zone the endpoint is derived from.
    pub zone: ZoneName,
    /// Engine version.
    pub engine_version: String,
    /// Data node instance type.
    pub instance_type: String,
    /// Data node count.
    pub node_count: u32,
    /// Per-node volume size in GiB.
    pub volume_gib: u32,
    /// Source ranges allowed to reach the domain.
    pub access: Vec<IpCidr>,
    /// Custom endpoint hostname.
    pub endpoint: String,
    /// Daily snapshot schedule.
    pub snapshot_schedule: CronSchedule,
    /// Snapshot repository name.
    pub snapshot_repo: String,
    /// What happens to the domain on teardown.
    pub removal: RemovalPolicy,
}

impl From<&SearchDomainSpec> for SearchDomainEntry {
    fn from(spec: &SearchDomainSpec) -> Self {
        Self {
            name: spec.name().clone(),
            zone: spec.zone().clone(),
            engine_version: spec.engine_version().to_string(),
            instance_type: spec.instance_type().to_string(),
            node_count: spec.node_count().get(),
            volume_gib: spec.volume_gib(),
            access: spec.access().to_vec(),
            endpoint: spec.endpoint(),
            snapshot_schedule: spec.snapshot_schedule(),
            snapshot_repo: spec.snapshot_repo().to_string(),
            removal: spec.removal(),
        }
    }
}

/// A certificate as rendered into the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateEntry {
    /// Hosted zone the certificate is validated against.
    pub zone: ZoneName,
    /// Wildcard domain the certificate covers.
    pub domain_name: String,
    /// Additional covered names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subject_alternative_names: Vec<String>,
}

impl From<&CertificateSpec> for CertificateEntry {
    fn from(spec: &CertificateSpec) -> Self {
        Self {
            zone: spec.zone().clone(),
            domain_name: spec.domain_name(),
            subject_alternative_names: spec.subject_alternative_names().to_vec(),
        }
    }
}

/// A network as rendered into the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEntry {
    /// Network name.
    pub name: String,
    /// Address range.
    pub cidr: IpCidr,
    /// Availability zone spread.
    pub max_azs: u8,
    /// NAT gateway count.
    pub nat_gateways: u8,
    /// Whether instances get DNS hostnames.
    pub dns_hostnames: bool,
    /// Whether DNS resolution is enabled.
    pub dns_support: bool,
    /// Subnet layout per availability zone.
    pub subnets: Vec<SubnetSpec>,
}

impl From<&NetworkSpec> for NetworkEntry {
    fn from(spec: &NetworkSpec) -> Self {
        Self {
            name: spec.name().to_string(),
            cidr: spec.cidr(),
            max_azs: spec.max_azs(),
            nat_gateways: spec.nat_gateways(),
            dns_hostnames: spec.dns_hostnames(),
            dns_support: spec.dns_support(),
            subnets: spec.subnets().to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// A rendered blueprint.
///
/// Every collection is sorted, so equality between two manifests means
/// the blueprints declare the same resources and wiring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Manifest format version.
    pub format_version: u32,
    /// Name of the blueprint this manifest was rendered from.
    pub blueprint: String,
    /// Declared buckets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buckets: Vec<BucketEntry>,
    /// Declared queues.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queues: Vec<QueueEntry>,
    /// Declared status tables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<TableEntry>,
    /// Declared functions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionEntry>,
    /// Declared search domains.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_domains: Vec<SearchDomainEntry>,
    /// Declared certificates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<CertificateEntry>,
    /// Declared networks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkEntry>,
    /// Object-created notification rules.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<NotificationRule>,
    /// Queue-to-function bindings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<BindingRule>,
    /// Access grants the wiring recorded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grants: Vec<Grant>,
}

impl Manifest {
    pub(crate) fn from_blueprint(blueprint: &Blueprint) -> Self {
        let mut buckets: Vec<BucketEntry> =
            blueprint.buckets().iter().map(BucketEntry::from).collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));

        let mut queues: Vec<QueueEntry> =
            blueprint.queues().iter().map(QueueEntry::from).collect();
        queues.sort_by(|a, b| a.name.cmp(&b.name));

        let mut tables: Vec<TableEntry> =
            blueprint.tables().iter().map(TableEntry::from).collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));

        let mut functions: Vec<FunctionEntry> =
            blueprint.functions().iter().map(FunctionEntry::from).collect();
        functions.sort_by(|a, b| a.name.cmp(&b.name));

        let mut search_domains: Vec<SearchDomainEntry> = blueprint
            .search_domains()
            .iter()
            .map(SearchDomainEntry::from)
            .collect();
        search_domains.sort_by(|a, b| a.name.cmp(&b.name));

        let mut certificates: Vec<CertificateEntry> = blueprint
            .certificates()
            .iter()
            .map(CertificateEntry::from)
            .collect();
        certificates.sort_by(|a, b| a.zone.as_str().cmp(b.zone.as_str()));

        let mut networks: Vec<NetworkEntry> =
            blueprint.networks().iter().map(NetworkEntry::from).collect();
        networks.sort_by(|a, b| a.name.cmp(&b.name));

        let mut notifications = blueprint.notifications().to_vec();
        notifications.sort();

        let mut bindings = blueprint.bindings().to_vec();
        bindings.sort();

        let mut grants = blueprint.grants().to_vec();
        grants.sort();

        Self {
            format_version: FORMAT_VERSION,
            blueprint: blueprint.name().to_string(),
            buckets,
            queues,
            tables,
            functions,
            search_domains,
            certificates,
            networks,
            notifications,
            bindings,
            grants,
        }
    }

    /// Looks up a queue entry by name.
    #[must_use]
    pub fn queue(&self, name: &QueueName) -> Option<&QueueEntry> {
        self.queues.iter().find(|q| &q.name == name)
    }

    /// Looks up a function entry by name.
    #[must_use]
    pub fn function(&self, name: &FunctionName) -> Option<&FunctionEntry> {
        self.functions.iter().find(|f| &f.name == name)
    }

    /// Returns the batch size bound for `function` on `queue`, if bound.
    #[must_use]
    pub fn binding(&self, function: &FunctionName, queue: &QueueName) -> Option<NonZeroU32> {
        self.bindings
            .iter()
            .find(|b| &b.function == function && &b.queue == queue)
            .map(|b| b.batch_size)
    }

    /// Serializes the manifest as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization {
            message: e.to_string(),
        })
    }

    /// Deserializes a manifest from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid manifest.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::blueprint::BindingOptions;
    use crate::function::FunctionSpec;

    #[test]
    fn declaration_order_does_not_change_the_manifest() -> Result<()> {
        let mut forward = Blueprint::new("ingest");
        forward.add_bucket(BucketSpec::new("dropbox")?)?;
        forward.add_bucket(BucketSpec::new("ingest-bucket")?)?;

        let mut reversed = Blueprint::new("ingest");
        reversed.add_bucket(BucketSpec::new("ingest-bucket")?)?;
        reversed.add_bucket(BucketSpec::new("dropbox")?)?;

        assert_eq!(forward.synth()?, reversed.synth()?);
        assert_eq!(forward.synth()?.to_json()?, reversed.synth()?.to_json()?);
        Ok(())
    }

    #[test]
    fn manifest_round_trips_through_json() -> Result<()> {
        let mut blueprint = Blueprint::new("ingest");
        let bucket = blueprint.add_bucket(BucketSpec::new("dropbox")?)?;
        let queue = blueprint.add_queue(QueueSpec::new("dropbox-queue")?)?;
        let function = blueprint.add_function(FunctionSpec::new("dropbox-processor")?)?;
        blueprint.notify_on_object_created(&bucket, &queue)?;
        blueprint.bind_queue(&function, &queue, BindingOptions::default())?;

        let manifest = blueprint.synth()?;
        let restored = Manifest::from_json(&manifest.to_json()?)?;
        assert_eq!(manifest, restored);
        Ok(())
    }

    #[test]
    fn queue_entries_carry_relay_parameters() -> Result<()> {
        let mut blueprint = Blueprint::new("ingest");
        let dlq = blueprint.add_queue(
            QueueSpec::new("dropbox-queue-dlq")?
                .with_retention(crate::queue::DEAD_LETTER_RETENTION),
        )?;
        blueprint.add_queue(
            QueueSpec::new("dropbox-queue")?.with_dead_letter(&dlq, NonZeroU32::MIN),
        )?;

        let manifest = blueprint.synth()?;
        let entry = manifest
            .queue(&"dropbox-queue".parse()?)
            .ok_or_else(|| Error::wiring("queue missing from manifest"))?;
        assert_eq!(entry.visibility_timeout_secs, 20 * 60);
        let dead_letter = entry
            .dead_letter
            .as_ref()
            .ok_or_else(|| Error::wiring("dead letter missing from manifest"))?;
        assert_eq!(dead_letter.max_receive_count, 1);
        assert_eq!(dead_letter.queue.as_str(), "dropbox-queue-dlq");
        Ok(())
    }

    #[test]
    fn environment_serializes_as_a_plain_map() -> Result<()> {
        let mut blueprint = Blueprint::new("ingest");
        blueprint.add_function(
            FunctionSpec::new("dropbox-processor")?.with_env_var("CONSOLE_LOG_LEVEL", "INFO"),
        )?;

        let json = blueprint.synth()?.to_json()?;
        assert!(json.contains("\"CONSOLE_LOG_LEVEL\": \"INFO\""));
        Ok(())
    }
}
