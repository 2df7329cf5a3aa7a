//! Certificate specs.
//!
//! Issuance and DNS validation happen outside this library; the spec
//! records the zone a wildcard certificate covers so synthesized
//! manifests carry the https posture of the custom endpoints.

use gantry_core::name::ZoneName;

use crate::error::{Error, Result};

/// Declarative configuration for a DNS-validated wildcard certificate.
///
/// The certificate covers `*.{zone}`, which includes the derived search
/// endpoint `search.{zone}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSpec {
    zone: ZoneName,
    subject_alternative_names: Vec<String>,
}

impl CertificateSpec {
    /// Creates a certificate spec for the given zone.
    ///
    /// # Errors
    ///
    /// Returns an error if the zone name is invalid.
    pub fn new(zone: impl Into<String>) -> Result<Self> {
        Ok(Self {
            zone: ZoneName::new(zone)?,
            subject_alternative_names: Vec::new(),
        })
    }

    /// Adds a subject alternative name.
    #[must_use]
    pub fn with_alternative_name(mut self, name: impl Into<String>) -> Self {
        self.subject_alternative_names.push(name.into());
        self
    }

    /// Returns the covered zone.
    #[must_use]
    pub fn zone(&self) -> &ZoneName {
        &self.zone
    }

    /// Returns the wildcard domain name, `*.{zone}`.
    #[must_use]
    pub fn domain_name(&self) -> String {
        format!("*.{}", self.zone)
    }

    /// Returns the subject alternative names.
    #[must_use]
    pub fn subject_alternative_names(&self) -> &[String] {
        &self.subject_alternative_names
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self
            .subject_alternative_names
            .iter()
            .any(String::is_empty)
        {
            return Err(Error::invalid_spec(
                "certificate",
                self.zone.as_str(),
                "subject alternative names cannot be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_covers_zone() -> Result<()> {
        let spec = CertificateSpec::new("data.example.com")?;
        assert_eq!(spec.domain_name(), "*.data.example.com");
        assert!(spec.subject_alternative_names().is_empty());
        Ok(())
    }

    #[test]
    fn rejects_empty_alternative_names() -> Result<()> {
        let spec = CertificateSpec::new("data.example.com")?.with_alternative_name("");
        assert!(spec.validate().is_err());
        Ok(())
    }
}
