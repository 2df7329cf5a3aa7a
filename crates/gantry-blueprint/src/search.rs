//! Managed search domain specs.
//!
//! A search domain is the indexing backend the ingest functions write
//! into. Provisioning the actual cluster is external; the spec carries
//! the parameters a provisioner needs and derives the custom endpoint
//! (`search.{zone}`) that lands in the ingest environment contract.

use std::num::NonZeroU32;

use gantry_core::cidr::IpCidr;
use gantry_core::name::{DomainName, ZoneName};

use crate::error::{Error, Result};
use crate::removal::RemovalPolicy;
use crate::schedule::CronSchedule;

/// Default search engine version.
pub const DEFAULT_ENGINE_VERSION: &str = "2.9";

/// Default data node instance type.
pub const DEFAULT_INSTANCE_TYPE: &str = "t3.medium.search";

/// Default per-node volume size in GiB.
pub const DEFAULT_VOLUME_GIB: u32 = 50;

/// Smallest allowed per-node volume size in GiB.
pub const MIN_VOLUME_GIB: u32 = 10;

/// Default snapshot repository name.
pub const DEFAULT_SNAPSHOT_REPO: &str = "opensearch-snapshot-repo";

/// Declarative configuration for a managed search domain.
///
/// Domains default to a single small node, an open access range (the
/// blueprint logs a warning when that default survives to registration),
/// a daily 09:00 UTC snapshot into the configured repository, and
/// retain-on-removal so index data outlives deployments.
///
/// # Example
///
/// ```rust
/// use gantry_blueprint::search::SearchDomainSpec;
///
/// let spec = SearchDomainSpec::new("opensearch-testing", "data.example.com").unwrap();
/// assert_eq!(spec.endpoint(), "search.data.example.com");
/// assert_eq!(spec.endpoint_url(), "https://search.data.example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchDomainSpec {
    name: DomainName,
    zone: ZoneName,
    engine_version: String,
    instance_type: String,
    node_count: NonZeroU32,
    volume_gib: u32,
    access: Vec<IpCidr>,
    snapshot_schedule: CronSchedule,
    snapshot_repo: String,
    removal: RemovalPolicy,
}

impl SearchDomainSpec {
    /// Creates a search domain spec with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain name or zone name is invalid.
    pub fn new(name: impl Into<String>, zone: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: DomainName::new(name)?,
            zone: ZoneName::new(zone)?,
            engine_version: DEFAULT_ENGINE_VERSION.to_string(),
            instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
            node_count: NonZeroU32::MIN,
            volume_gib: DEFAULT_VOLUME_GIB,
            access: vec![IpCidr::unrestricted()],
            snapshot_schedule: CronSchedule::DAILY_SNAPSHOT,
            snapshot_repo: DEFAULT_SNAPSHOT_REPO.to_string(),
            removal: RemovalPolicy::Retain,
        })
    }

    /// Sets the engine version.
    #[must_use]
    pub fn with_engine_version(mut self, engine_version: impl Into<String>) -> Self {
        self.engine_version = engine_version.into();
        self
    }

    /// Sets the data node instance type.
    #[must_use]
    pub fn with_instance_type(mut self, instance_type: impl Into<String>) -> Self {
        self.instance_type = instance_type.into();
        self
    }

    /// Sets the number of data nodes.
    #[must_use]
    pub fn with_node_count(mut self, node_count: NonZeroU32) -> Self {
        self.node_count = node_count;
        self
    }

    /// Sets the per-node volume size in GiB.
    #[must_use]
    pub fn with_volume_gib(mut self, volume_gib: u32) -> Self {
        self.volume_gib = volume_gib;
        self
    }

    /// Replaces the allowed access ranges.
    #[must_use]
    pub fn with_access(mut self, access: Vec<IpCidr>) -> Self {
        self.access = access;
        self
    }

    /// Sets the snapshot schedule.
    #[must_use]
    pub fn with_snapshot_schedule(mut self, snapshot_schedule: CronSchedule) -> Self {
        self.snapshot_schedule = snapshot_schedule;
        self
    }

    /// Sets the snapshot repository name.
    #[must_use]
    pub fn with_snapshot_repo(mut self, snapshot_repo: impl Into<String>) -> Self {
        self.snapshot_repo = snapshot_repo.into();
        self
    }

    /// Sets the removal policy.
    #[must_use]
    pub fn with_removal(mut self, removal: RemovalPolicy) -> Self {
        self.removal = removal;
        self
    }

    /// Returns the domain name.
    #[must_use]
    pub fn name(&self) -> &DomainName {
        &self.name
    }

    /// Returns the hosted zone the endpoint is derived from.
    #[must_use]
    pub fn zone(&self) -> &ZoneName {
        &self.zone
    }

    /// Returns the engine version.
    #[must_use]
    pub fn engine_version(&self) -> &str {
        &self.engine_version
    }

    /// Returns the data node instance type.
    #[must_use]
    pub fn instance_type(&self) -> &str {
        &self.instance_type
    }

    /// Returns the number of data nodes.
    #[must_use]
    pub fn node_count(&self) -> NonZeroU32 {
        self.node_count
    }

    /// Returns the per-node volume size in GiB.
    #[must_use]
    pub fn volume_gib(&self) -> u32 {
        self.volume_gib
    }

    /// Returns the allowed access ranges.
    #[must_use]
    pub fn access(&self) -> &[IpCidr] {
        &self.access
    }

    /// Returns true if any allowed range is the open internet.
    #[must_use]
    pub fn allows_unrestricted_access(&self) -> bool {
        self.access.iter().any(IpCidr::is_unrestricted)
    }

    /// Returns the snapshot schedule.
    #[must_use]
    pub fn snapshot_schedule(&self) -> CronSchedule {
        self.snapshot_schedule
    }

    /// Returns the snapshot repository name.
    #[must_use]
    pub fn snapshot_repo(&self) -> &str {
        &self.snapshot_repo
    }

    /// Returns the removal policy.
    #[must_use]
    pub fn removal(&self) -> RemovalPolicy {
        self.removal
    }

    /// Returns the custom endpoint host, `search.{zone}`.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("search.{}", self.zone)
    }

    /// Returns the full https endpoint URL.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        format!("https://search.{}", self.zone)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.engine_version.is_empty() {
            return Err(Error::invalid_spec(
                "search domain",
                self.name.as_str(),
                "engine version cannot be empty",
            ));
        }
        if self.instance_type.is_empty() {
            return Err(Error::invalid_spec(
                "search domain",
                self.name.as_str(),
                "instance type cannot be empty",
            ));
        }
        if self.volume_gib < MIN_VOLUME_GIB {
            return Err(Error::invalid_spec(
                "search domain",
                self.name.as_str(),
                format!("volume must be at least {MIN_VOLUME_GIB} GiB"),
            ));
        }
        if self.access.is_empty() {
            return Err(Error::invalid_spec(
                "search domain",
                self.name.as_str(),
                "at least one access range is required",
            ));
        }
        if self.snapshot_repo.is_empty() {
            return Err(Error::invalid_spec(
                "search domain",
                self.name.as_str(),
                "snapshot repository name cannot be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() -> Result<()> {
        let spec = SearchDomainSpec::new("opensearch-testing", "data.example.com")?;
        assert_eq!(spec.engine_version(), "2.9");
        assert_eq!(spec.instance_type(), "t3.medium.search");
        assert_eq!(spec.node_count().get(), 1);
        assert_eq!(spec.volume_gib(), 50);
        assert!(spec.allows_unrestricted_access());
        assert_eq!(spec.snapshot_schedule().expression(), "0 9 * * *");
        assert_eq!(spec.snapshot_repo(), "opensearch-snapshot-repo");
        assert_eq!(spec.removal(), RemovalPolicy::Retain);
        Ok(())
    }

    #[test]
    fn endpoint_derives_from_zone() -> Result<()> {
        let spec = SearchDomainSpec::new("prod-search", "prod.example.net")?;
        assert_eq!(spec.endpoint(), "search.prod.example.net");
        assert_eq!(spec.endpoint_url(), "https://search.prod.example.net");
        Ok(())
    }

    #[test]
    fn restricted_access_is_detected() -> Result<()> {
        let range: IpCidr = "10.1.0.0/16".parse()?;
        let spec = SearchDomainSpec::new("opensearch-testing", "data.example.com")?
            .with_access(vec![range]);
        assert!(!spec.allows_unrestricted_access());
        Ok(())
    }

    #[test]
    fn rejects_undersized_volume() -> Result<()> {
        let spec = SearchDomainSpec::new("opensearch-testing", "data.example.com")?
            .with_volume_gib(5);
        assert!(spec.validate().is_err());
        Ok(())
    }
}
