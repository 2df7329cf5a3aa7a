//! The blueprint value resources are declared on.
//!
//! A [`Blueprint`] is an explicit, passed-down context object: every
//! resource is added to exactly one blueprint and referenced afterwards
//! through the typed ref the add call returned. Refs remember which
//! blueprint issued them, so wiring two blueprints together by accident
//! is a synchronous configuration error rather than a provisioning
//! surprise.
//!
//! Declaring and wiring mutate only the in-memory value. Nothing is
//! provisioned until a deployment harness walks the blueprint, and
//! [`Blueprint::synth`] renders the whole graph as a deterministic
//! manifest.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use gantry_core::env::EnvMap;
use gantry_core::name::{BucketName, DomainName, FunctionName, QueueName, TableName, ZoneName};

use crate::bucket::BucketSpec;
use crate::certificate::CertificateSpec;
use crate::error::{Error, Result};
use crate::function::FunctionSpec;
use crate::manifest::Manifest;
use crate::network::NetworkSpec;
use crate::queue::QueueSpec;
use crate::search::SearchDomainSpec;
use crate::table::TableSpec;

static NEXT_BLUEPRINT_ID: AtomicU64 = AtomicU64::new(1);

/// Reference to a bucket declared on a [`Blueprint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketRef {
    pub(crate) blueprint: u64,
    pub(crate) index: usize,
    name: BucketName,
}

impl BucketRef {
    /// Returns the referenced bucket name.
    #[must_use]
    pub fn name(&self) -> &BucketName {
        &self.name
    }
}

/// Reference to a queue declared on a [`Blueprint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRef {
    pub(crate) blueprint: u64,
    pub(crate) index: usize,
    name: QueueName,
}

impl QueueRef {
    /// Returns the referenced queue name.
    #[must_use]
    pub fn name(&self) -> &QueueName {
        &self.name
    }
}

/// Reference to a status table declared on a [`Blueprint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub(crate) blueprint: u64,
    pub(crate) index: usize,
    name: TableName,
}

impl TableRef {
    /// Returns the referenced table name.
    #[must_use]
    pub fn name(&self) -> &TableName {
        &self.name
    }
}

/// Reference to a processing function declared on a [`Blueprint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub(crate) blueprint: u64,
    pub(crate) index: usize,
    name: FunctionName,
}

impl FunctionRef {
    /// Returns the referenced function name.
    #[must_use]
    pub fn name(&self) -> &FunctionName {
        &self.name
    }
}

/// Reference to a search domain declared on a [`Blueprint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRef {
    pub(crate) blueprint: u64,
    pub(crate) index: usize,
    name: DomainName,
}

impl DomainRef {
    /// Returns the referenced domain name.
    #[must_use]
    pub fn name(&self) -> &DomainName {
        &self.name
    }
}

/// Reference to a certificate declared on a [`Blueprint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRef {
    pub(crate) blueprint: u64,
    pub(crate) index: usize,
    zone: ZoneName,
}

impl CertificateRef {
    /// Returns the zone the referenced certificate covers.
    #[must_use]
    pub fn zone(&self) -> &ZoneName {
        &self.zone
    }
}

/// Reference to a network declared on a [`Blueprint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRef {
    pub(crate) blueprint: u64,
    pub(crate) index: usize,
    name: String,
}

impl NetworkRef {
    /// Returns the referenced network name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An object-created notification rule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRule {
    /// Bucket whose object-created events publish a message.
    pub bucket: BucketName,
    /// Queue the message is published to.
    pub queue: QueueName,
}

/// A queue-to-function invocation binding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingRule {
    /// The bound function.
    pub function: FunctionName,
    /// The queue the function consumes.
    pub queue: QueueName,
    /// Messages delivered per invocation.
    pub batch_size: NonZeroU32,
}

/// The access a grant conveys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrantAction {
    /// Send messages to a queue (bucket notification principals).
    SendMessages,
    /// Receive and delete messages from a queue (bound functions).
    ConsumeMessages,
    /// Read and write objects in a bucket.
    ReadWriteObjects,
    /// Read and write items in a table.
    ReadWriteItems,
}

/// Access granted on one resource to one grantee.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    /// Who receives the access.
    pub grantee: String,
    /// What the access allows.
    pub action: GrantAction,
    /// The resource the access applies to.
    pub resource: String,
}

/// Options for binding a function to a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingOptions {
    /// Messages delivered per invocation. Defaults to one.
    pub batch_size: NonZeroU32,
}

impl Default for BindingOptions {
    fn default() -> Self {
        Self {
            batch_size: NonZeroU32::MIN,
        }
    }
}

/// A declarative resource graph.
///
/// # Example
///
/// ```rust
/// use gantry_blueprint::blueprint::Blueprint;
/// use gantry_blueprint::bucket::BucketSpec;
/// use gantry_blueprint::queue::QueueSpec;
///
/// # fn main() -> gantry_blueprint::error::Result<()> {
/// let mut blueprint = Blueprint::new("ingest");
/// let bucket = blueprint.add_bucket(BucketSpec::new("dropbox")?)?;
/// let queue = blueprint.add_queue(QueueSpec::new("dropbox-queue")?)?;
/// blueprint.notify_on_object_created(&bucket, &queue)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Blueprint {
    id: u64,
    name: String,
    buckets: Vec<BucketSpec>,
    queues: Vec<QueueSpec>,
    tables: Vec<TableSpec>,
    functions: Vec<FunctionSpec>,
    domains: Vec<SearchDomainSpec>,
    certificates: Vec<CertificateSpec>,
    networks: Vec<NetworkSpec>,
    notifications: Vec<NotificationRule>,
    bindings: Vec<BindingRule>,
    grants: Vec<Grant>,
}

impl Blueprint {
    /// Creates an empty blueprint.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NEXT_BLUEPRINT_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            buckets: Vec::new(),
            queues: Vec::new(),
            tables: Vec::new(),
            functions: Vec::new(),
            domains: Vec::new(),
            certificates: Vec::new(),
            networks: Vec::new(),
            notifications: Vec::new(),
            bindings: Vec::new(),
            grants: Vec::new(),
        }
    }

    /// Returns the blueprint name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares a bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec is invalid or the name is already
    /// declared.
    pub fn add_bucket(&mut self, spec: BucketSpec) -> Result<BucketRef> {
        spec.validate()?;
        if self.buckets.iter().any(|b| b.name() == spec.name()) {
            return Err(Error::DuplicateName {
                resource_type: "bucket",
                name: spec.name().to_string(),
            });
        }
        let reference = BucketRef {
            blueprint: self.id,
            index: self.buckets.len(),
            name: spec.name().clone(),
        };
        debug!(bucket = %spec.name(), "declared bucket");
        self.buckets.push(spec);
        Ok(reference)
    }

    /// Declares a queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec is invalid, the name is already
    /// declared, or the dead-letter target belongs to another blueprint.
    pub fn add_queue(&mut self, spec: QueueSpec) -> Result<QueueRef> {
        spec.validate()?;
        if let Some(dead_letter) = spec.dead_letter() {
            self.check_queue_ref(&dead_letter.queue)?;
        }
        if self.queues.iter().any(|q| q.name() == spec.name()) {
            return Err(Error::DuplicateName {
                resource_type: "queue",
                name: spec.name().to_string(),
            });
        }
        let reference = QueueRef {
            blueprint: self.id,
            index: self.queues.len(),
            name: spec.name().clone(),
        };
        debug!(queue = %spec.name(), "declared queue");
        self.queues.push(spec);
        Ok(reference)
    }

    /// Declares a status table.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec is invalid or the name is already
    /// declared.
    pub fn add_status_table(&mut self, spec: TableSpec) -> Result<TableRef> {
        spec.validate()?;
        if self.tables.iter().any(|t| t.name() == spec.name()) {
            return Err(Error::DuplicateName {
                resource_type: "table",
                name: spec.name().to_string(),
            });
        }
        let reference = TableRef {
            blueprint: self.id,
            index: self.tables.len(),
            name: spec.name().clone(),
        };
        debug!(table = %spec.name(), "declared status table");
        self.tables.push(spec);
        Ok(reference)
    }

    /// Declares a processing function.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec is invalid or the name is already
    /// declared.
    pub fn add_function(&mut self, spec: FunctionSpec) -> Result<FunctionRef> {
        spec.validate()?;
        if self.functions.iter().any(|f| f.name() == spec.name()) {
            return Err(Error::DuplicateName {
                resource_type: "function",
                name: spec.name().to_string(),
            });
        }
        let reference = FunctionRef {
            blueprint: self.id,
            index: self.functions.len(),
            name: spec.name().clone(),
        };
        debug!(function = %spec.name(), "declared function");
        self.functions.push(spec);
        Ok(reference)
    }

    /// Declares a search domain.
    ///
    /// Logs a warning when the spec leaves the default open access range
    /// in place, since that exposes the domain to the public internet.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec is invalid or the name is already
    /// declared.
    pub fn add_search_domain(&mut self, spec: SearchDomainSpec) -> Result<DomainRef> {
        spec.validate()?;
        if self.domains.iter().any(|d| d.name() == spec.name()) {
            return Err(Error::DuplicateName {
                resource_type: "search domain",
                name: spec.name().to_string(),
            });
        }
        if spec.allows_unrestricted_access() {
            warn!(
                domain = %spec.name(),
                "search domain allows access from the open internet; restrict the access range if this is not intended"
            );
        }
        let reference = DomainRef {
            blueprint: self.id,
            index: self.domains.len(),
            name: spec.name().clone(),
        };
        debug!(domain = %spec.name(), endpoint = %spec.endpoint(), "declared search domain");
        self.domains.push(spec);
        Ok(reference)
    }

    /// Declares a certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec is invalid or a certificate for the
    /// zone is already declared.
    pub fn add_certificate(&mut self, spec: CertificateSpec) -> Result<CertificateRef> {
        spec.validate()?;
        if self.certificates.iter().any(|c| c.zone() == spec.zone()) {
            return Err(Error::DuplicateName {
                resource_type: "certificate",
                name: spec.zone().to_string(),
            });
        }
        let reference = CertificateRef {
            blueprint: self.id,
            index: self.certificates.len(),
            zone: spec.zone().clone(),
        };
        debug!(zone = %spec.zone(), "declared certificate");
        self.certificates.push(spec);
        Ok(reference)
    }

    /// Declares a network.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec is invalid or the name is already
    /// declared.
    pub fn add_network(&mut self, spec: NetworkSpec) -> Result<NetworkRef> {
        spec.validate()?;
        if self.networks.iter().any(|n| n.name() == spec.name()) {
            return Err(Error::DuplicateName {
                resource_type: "network",
                name: spec.name().to_string(),
            });
        }
        let reference = NetworkRef {
            blueprint: self.id,
            index: self.networks.len(),
            name: spec.name().to_string(),
        };
        debug!(network = %spec.name(), "declared network");
        self.networks.push(spec);
        Ok(reference)
    }

    /// Registers an object-created notification from `bucket` to `queue`.
    ///
    /// The bucket's notification principal is granted send access on the
    /// queue. Registering the same pair twice collapses to one rule.
    ///
    /// # Errors
    ///
    /// Returns an error if either ref belongs to a different blueprint.
    pub fn notify_on_object_created(
        &mut self,
        bucket: &BucketRef,
        queue: &QueueRef,
    ) -> Result<()> {
        self.check_bucket_ref(bucket)?;
        self.check_queue_ref(queue)?;
        let rule = NotificationRule {
            bucket: bucket.name().clone(),
            queue: queue.name().clone(),
        };
        if self.notifications.contains(&rule) {
            debug!(bucket = %rule.bucket, queue = %rule.queue, "notification already registered");
            return Ok(());
        }
        info!(bucket = %rule.bucket, queue = %rule.queue, "registered object-created notification");
        self.push_grant(
            rule.bucket.as_str(),
            GrantAction::SendMessages,
            rule.queue.as_str(),
        );
        self.notifications.push(rule);
        Ok(())
    }

    /// Subscribes `function` to consume messages from `queue`.
    ///
    /// The function is granted consume access on the queue.
    ///
    /// # Errors
    ///
    /// Returns an error if either ref belongs to a different blueprint or
    /// the function is already bound to the queue.
    pub fn bind_queue(
        &mut self,
        function: &FunctionRef,
        queue: &QueueRef,
        options: BindingOptions,
    ) -> Result<()> {
        self.check_function_ref(function)?;
        self.check_queue_ref(queue)?;
        if self
            .bindings
            .iter()
            .any(|b| b.function == *function.name() && b.queue == *queue.name())
        {
            return Err(Error::wiring(format!(
                "function '{}' is already bound to queue '{}'",
                function.name(),
                queue.name(),
            )));
        }
        info!(
            function = %function.name(),
            queue = %queue.name(),
            batch_size = options.batch_size.get(),
            "bound function to queue"
        );
        self.push_grant(
            function.name().as_str(),
            GrantAction::ConsumeMessages,
            queue.name().as_str(),
        );
        self.bindings.push(BindingRule {
            function: function.name().clone(),
            queue: queue.name().clone(),
            batch_size: options.batch_size,
        });
        Ok(())
    }

    /// Merges `defaults` into the function's environment additively.
    ///
    /// Keys the function already defines keep their values; only absent
    /// keys are added. Returns how many entries were added, so applying
    /// the same defaults again returns zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the ref belongs to a different blueprint.
    pub fn extend_environment(
        &mut self,
        function: &FunctionRef,
        defaults: &EnvMap,
    ) -> Result<usize> {
        let index = self.check_function_ref(function)?;
        let added = self.functions[index].environment_mut().apply_defaults(defaults);
        debug!(function = %function.name(), added, "extended function environment");
        Ok(added)
    }

    /// Grants `function` read/write access on `bucket`'s objects.
    ///
    /// # Errors
    ///
    /// Returns an error if either ref belongs to a different blueprint.
    pub fn grant_bucket_access(
        &mut self,
        function: &FunctionRef,
        bucket: &BucketRef,
    ) -> Result<()> {
        self.check_function_ref(function)?;
        self.check_bucket_ref(bucket)?;
        self.push_grant(
            function.name().as_str(),
            GrantAction::ReadWriteObjects,
            bucket.name().as_str(),
        );
        Ok(())
    }

    /// Grants `function` read/write access on `table`'s items.
    ///
    /// # Errors
    ///
    /// Returns an error if either ref belongs to a different blueprint.
    pub fn grant_table_access(
        &mut self,
        function: &FunctionRef,
        table: &TableRef,
    ) -> Result<()> {
        self.check_function_ref(function)?;
        self.check_table_ref(table)?;
        self.push_grant(
            function.name().as_str(),
            GrantAction::ReadWriteItems,
            table.name().as_str(),
        );
        Ok(())
    }

    /// Returns the declared buckets.
    #[must_use]
    pub fn buckets(&self) -> &[BucketSpec] {
        &self.buckets
    }

    /// Returns the declared queues.
    #[must_use]
    pub fn queues(&self) -> &[QueueSpec] {
        &self.queues
    }

    /// Returns the declared status tables.
    #[must_use]
    pub fn tables(&self) -> &[TableSpec] {
        &self.tables
    }

    /// Returns the declared functions.
    #[must_use]
    pub fn functions(&self) -> &[FunctionSpec] {
        &self.functions
    }

    /// Returns the declared search domains.
    #[must_use]
    pub fn search_domains(&self) -> &[SearchDomainSpec] {
        &self.domains
    }

    /// Returns the declared certificates.
    #[must_use]
    pub fn certificates(&self) -> &[CertificateSpec] {
        &self.certificates
    }

    /// Returns the declared networks.
    #[must_use]
    pub fn networks(&self) -> &[NetworkSpec] {
        &self.networks
    }

    /// Returns the registered notification rules.
    #[must_use]
    pub fn notifications(&self) -> &[NotificationRule] {
        &self.notifications
    }

    /// Returns the registered invocation bindings.
    #[must_use]
    pub fn bindings(&self) -> &[BindingRule] {
        &self.bindings
    }

    /// Returns the recorded grants.
    #[must_use]
    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }

    /// Looks up the spec behind a bucket ref.
    ///
    /// # Errors
    ///
    /// Returns an error if the ref belongs to a different blueprint.
    pub fn bucket(&self, reference: &BucketRef) -> Result<&BucketSpec> {
        let index = self.check_bucket_ref(reference)?;
        Ok(&self.buckets[index])
    }

    /// Looks up the spec behind a queue ref.
    ///
    /// # Errors
    ///
    /// Returns an error if the ref belongs to a different blueprint.
    pub fn queue(&self, reference: &QueueRef) -> Result<&QueueSpec> {
        let index = self.check_queue_ref(reference)?;
        Ok(&self.queues[index])
    }

    /// Looks up the spec behind a table ref.
    ///
    /// # Errors
    ///
    /// Returns an error if the ref belongs to a different blueprint.
    pub fn table(&self, reference: &TableRef) -> Result<&TableSpec> {
        let index = self.check_table_ref(reference)?;
        Ok(&self.tables[index])
    }

    /// Looks up the spec behind a function ref.
    ///
    /// # Errors
    ///
    /// Returns an error if the ref belongs to a different blueprint.
    pub fn function(&self, reference: &FunctionRef) -> Result<&FunctionSpec> {
        let index = self.check_function_ref(reference)?;
        Ok(&self.functions[index])
    }

    /// Looks up the spec behind a search domain ref.
    ///
    /// # Errors
    ///
    /// Returns an error if the ref belongs to a different blueprint.
    pub fn search_domain(&self, reference: &DomainRef) -> Result<&SearchDomainSpec> {
        let index = self.check_domain_ref(reference)?;
        Ok(&self.domains[index])
    }

    /// Checks cross-resource consistency.
    ///
    /// Per-spec parameters are validated when resources are added; this
    /// checks the relationships between them, currently that every
    /// dead-letter queue retains messages at least as long as its source.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<()> {
        for queue in &self.queues {
            if let Some(dead_letter) = queue.dead_letter() {
                let target = self
                    .queues
                    .iter()
                    .find(|q| q.name() == dead_letter.queue.name())
                    .ok_or_else(|| {
                        Error::wiring(format!(
                            "dead-letter target '{}' is not declared",
                            dead_letter.queue.name()
                        ))
                    })?;
                if target.retention() < queue.retention() {
                    return Err(Error::invalid_spec(
                        "queue",
                        queue.name().as_str(),
                        format!(
                            "dead-letter queue '{}' retention ({}s) is shorter than the source retention ({}s)",
                            target.name(),
                            target.retention().as_secs(),
                            queue.retention().as_secs(),
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Renders the blueprint as a deterministic manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if [`Blueprint::validate`] fails.
    pub fn synth(&self) -> Result<Manifest> {
        self.validate()?;
        Ok(Manifest::from_blueprint(self))
    }

    fn check_bucket_ref(&self, reference: &BucketRef) -> Result<usize> {
        let known = reference.blueprint == self.id
            && reference.index < self.buckets.len()
            && self.buckets[reference.index].name() == reference.name();
        if known {
            Ok(reference.index)
        } else {
            Err(Error::ForeignRef {
                resource_type: "bucket",
                name: reference.name().to_string(),
            })
        }
    }

    fn check_queue_ref(&self, reference: &QueueRef) -> Result<usize> {
        let known = reference.blueprint == self.id
            && reference.index < self.queues.len()
            && self.queues[reference.index].name() == reference.name();
        if known {
            Ok(reference.index)
        } else {
            Err(Error::ForeignRef {
                resource_type: "queue",
                name: reference.name().to_string(),
            })
        }
    }

    fn check_table_ref(&self, reference: &TableRef) -> Result<usize> {
        let known = reference.blueprint == self.id
            && reference.index < self.tables.len()
            && self.tables[reference.index].name() == reference.name();
        if known {
            Ok(reference.index)
        } else {
            Err(Error::ForeignRef {
                resource_type: "table",
                name: reference.name().to_string(),
            })
        }
    }

    fn check_function_ref(&self, reference: &FunctionRef) -> Result<usize> {
        let known = reference.blueprint == self.id
            && reference.index < self.functions.len()
            && self.functions[reference.index].name() == reference.name();
        if known {
            Ok(reference.index)
        } else {
            Err(Error::ForeignRef {
                resource_type: "function",
                name: reference.name().to_string(),
            })
        }
    }

    fn check_domain_ref(&self, reference: &DomainRef) -> Result<usize> {
        let known = reference.blueprint == self.id
            && reference.index < self.domains.len()
            && self.domains[reference.index].name() == reference.name();
        if known {
            Ok(reference.index)
        } else {
            Err(Error::ForeignRef {
                resource_type: "search domain",
                name: reference.name().to_string(),
            })
        }
    }

    fn push_grant(
        &mut self,
        grantee: impl Into<String>,
        action: GrantAction,
        resource: impl Into<String>,
    ) {
        let grant = Grant {
            grantee: grantee.into(),
            action,
            resource: resource.into(),
        };
        if !self.grants.contains(&grant) {
            self.grants.push(grant);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::queue::DEAD_LETTER_RETENTION;

    #[test]
    fn refs_from_another_blueprint_are_rejected() -> Result<()> {
        let mut first = Blueprint::new("first");
        let mut second = Blueprint::new("second");
        let bucket = first.add_bucket(BucketSpec::new("dropbox")?)?;
        let queue = second.add_queue(QueueSpec::new("dropbox-queue")?)?;

        let err = second
            .notify_on_object_created(&bucket, &queue)
            .unwrap_err();
        assert!(matches!(err, Error::ForeignRef { resource_type: "bucket", .. }));
        Ok(())
    }

    #[test]
    fn duplicate_names_are_rejected_per_kind() -> Result<()> {
        let mut blueprint = Blueprint::new("ingest");
        blueprint.add_bucket(BucketSpec::new("dropbox")?)?;
        let err = blueprint.add_bucket(BucketSpec::new("dropbox")?).unwrap_err();
        assert!(matches!(err, Error::DuplicateName { .. }));

        // Different kinds live in different namespaces.
        blueprint.add_queue(QueueSpec::new("dropbox")?)?;
        Ok(())
    }

    #[test]
    fn duplicate_notification_collapses() -> Result<()> {
        let mut blueprint = Blueprint::new("ingest");
        let bucket = blueprint.add_bucket(BucketSpec::new("dropbox")?)?;
        let queue = blueprint.add_queue(QueueSpec::new("dropbox-queue")?)?;

        blueprint.notify_on_object_created(&bucket, &queue)?;
        blueprint.notify_on_object_created(&bucket, &queue)?;

        assert_eq!(blueprint.notifications().len(), 1);
        assert_eq!(blueprint.grants().len(), 1);
        Ok(())
    }

    #[test]
    fn duplicate_binding_is_rejected() -> Result<()> {
        let mut blueprint = Blueprint::new("ingest");
        let queue = blueprint.add_queue(QueueSpec::new("dropbox-queue")?)?;
        let function = blueprint.add_function(FunctionSpec::new("dropbox-processor")?)?;

        blueprint.bind_queue(&function, &queue, BindingOptions::default())?;
        let err = blueprint
            .bind_queue(&function, &queue, BindingOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Wiring { .. }));
        Ok(())
    }

    #[test]
    fn extend_environment_never_overwrites() -> Result<()> {
        let mut blueprint = Blueprint::new("ingest");
        let function = blueprint.add_function(
            FunctionSpec::new("dropbox-processor")?.with_env_var("CONSOLE_LOG_LEVEL", "DEBUG"),
        )?;

        let defaults = EnvMap::new()
            .with("CONSOLE_LOG_LEVEL", "INFO")
            .with("INGEST_BUCKET_NAME", "ingest-bucket");
        let added = blueprint.extend_environment(&function, &defaults)?;
        assert_eq!(added, 1);

        let env = blueprint.function(&function)?.environment();
        assert_eq!(env.get("CONSOLE_LOG_LEVEL"), Some("DEBUG"));
        assert_eq!(env.get("INGEST_BUCKET_NAME"), Some("ingest-bucket"));

        // Idempotent: a second application adds nothing.
        let added_again = blueprint.extend_environment(&function, &defaults)?;
        assert_eq!(added_again, 0);
        Ok(())
    }

    #[test]
    fn dead_letter_retention_must_cover_source() -> Result<()> {
        let mut blueprint = Blueprint::new("ingest");
        let dlq = blueprint.add_queue(
            QueueSpec::new("dropbox-queue-dlq")?.with_retention(Duration::from_secs(60)),
        )?;
        blueprint.add_queue(
            QueueSpec::new("dropbox-queue")?
                .with_retention(Duration::from_secs(3600))
                .with_dead_letter(&dlq, NonZeroU32::MIN),
        )?;

        let err = blueprint.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidSpec { .. }));
        Ok(())
    }

    #[test]
    fn dead_letter_with_long_retention_passes() -> Result<()> {
        let mut blueprint = Blueprint::new("ingest");
        let dlq = blueprint.add_queue(
            QueueSpec::new("dropbox-queue-dlq")?.with_retention(DEAD_LETTER_RETENTION),
        )?;
        blueprint.add_queue(
            QueueSpec::new("dropbox-queue")?.with_dead_letter(&dlq, NonZeroU32::MIN),
        )?;
        blueprint.validate()?;
        Ok(())
    }

    #[test]
    fn grants_deduplicate() -> Result<()> {
        let mut blueprint = Blueprint::new("ingest");
        let bucket = blueprint.add_bucket(BucketSpec::new("dropbox")?)?;
        let function = blueprint.add_function(FunctionSpec::new("dropbox-processor")?)?;

        blueprint.grant_bucket_access(&function, &bucket)?;
        blueprint.grant_bucket_access(&function, &bucket)?;
        assert_eq!(blueprint.grants().len(), 1);
        Ok(())
    }

    #[test]
    fn dead_letter_ref_must_be_local() -> Result<()> {
        let mut first = Blueprint::new("first");
        let mut second = Blueprint::new("second");
        let foreign_dlq = first.add_queue(QueueSpec::new("dlq")?)?;

        let err = second
            .add_queue(QueueSpec::new("dropbox-queue")?.with_dead_letter(&foreign_dlq, NonZeroU32::MIN))
            .unwrap_err();
        assert!(matches!(err, Error::ForeignRef { resource_type: "queue", .. }));
        Ok(())
    }
}
