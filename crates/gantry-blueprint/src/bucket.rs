//! Object-store bucket specs.

use std::time::Duration;

use gantry_core::name::BucketName;

use crate::error::{Error, Result};
use crate::removal::RemovalPolicy;

/// Declarative configuration for an object-store bucket.
///
/// Buckets are versioned by default and destroyed on teardown; snapshot
/// buckets typically add a lifecycle expiry so old snapshot data ages out.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use gantry_blueprint::bucket::BucketSpec;
///
/// let spec = BucketSpec::new("snapshot-bucket")
///     .unwrap()
///     .with_expiry(Duration::from_secs(90 * 24 * 60 * 60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSpec {
    name: BucketName,
    versioned: bool,
    expire_after: Option<Duration>,
    removal: RemovalPolicy,
}

impl BucketSpec {
    /// Creates a bucket spec with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a valid bucket name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: BucketName::new(name)?,
            versioned: true,
            expire_after: None,
            removal: RemovalPolicy::Destroy,
        })
    }

    /// Enables or disables object versioning.
    #[must_use]
    pub fn with_versioning(mut self, versioned: bool) -> Self {
        self.versioned = versioned;
        self
    }

    /// Expires objects after the given age.
    #[must_use]
    pub fn with_expiry(mut self, expire_after: Duration) -> Self {
        self.expire_after = Some(expire_after);
        self
    }

    /// Sets the removal policy.
    #[must_use]
    pub fn with_removal(mut self, removal: RemovalPolicy) -> Self {
        self.removal = removal;
        self
    }

    /// Returns the bucket name.
    #[must_use]
    pub fn name(&self) -> &BucketName {
        &self.name
    }

    /// Returns whether object versioning is enabled.
    #[must_use]
    pub fn versioned(&self) -> bool {
        self.versioned
    }

    /// Returns the lifecycle expiry, if one is configured.
    #[must_use]
    pub fn expire_after(&self) -> Option<Duration> {
        self.expire_after
    }

    /// Returns the removal policy.
    #[must_use]
    pub fn removal(&self) -> RemovalPolicy {
        self.removal
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.expire_after == Some(Duration::ZERO) {
            return Err(Error::invalid_spec(
                "bucket",
                self.name.as_str(),
                "lifecycle expiry must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_versioned_and_destroyed() -> Result<()> {
        let spec = BucketSpec::new("dropbox")?;
        assert!(spec.versioned());
        assert_eq!(spec.removal(), RemovalPolicy::Destroy);
        assert!(spec.expire_after().is_none());
        Ok(())
    }

    #[test]
    fn rejects_invalid_names() {
        assert!(BucketSpec::new("Bad Name").is_err());
    }

    #[test]
    fn rejects_zero_expiry() -> Result<()> {
        let spec = BucketSpec::new("snapshots")?.with_expiry(Duration::ZERO);
        assert!(spec.validate().is_err());
        Ok(())
    }
}
