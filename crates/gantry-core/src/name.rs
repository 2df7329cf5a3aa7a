//! Validated resource names.
//!
//! Every externally provisioned resource is referenced by name, and names
//! travel into injected environments and manifests, so they are validated
//! once at the edge and carried as typed values afterwards:
//!
//! - **Bucket, queue, and function names** share the DNS-compatible rule
//!   set: 3-63 characters, lowercase alphanumeric plus hyphens, no leading
//!   or trailing hyphen.
//! - **Table names** additionally allow underscores (`ingest_status`) and
//!   run up to 255 characters.
//! - **Search domain names** are 3-28 characters and must start with a
//!   letter.
//! - **Zone names** are dotted DNS names (`data.example.com`).
//! - **Object keys** are free-form paths within a bucket.
//!
//! # Example
//!
//! ```rust
//! use gantry_core::name::BucketName;
//!
//! let bucket = BucketName::new("ingest-bucket").unwrap();
//! assert_eq!(bucket.as_str(), "ingest-bucket");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Validates a DNS-compatible resource name.
///
/// Shared by bucket, queue, and function names.
fn validate_dns_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName {
            message: format!("{kind} name cannot be empty"),
        });
    }

    if name.len() < 3 {
        return Err(Error::InvalidName {
            message: format!("{kind} name '{name}' is too short (minimum 3 characters)"),
        });
    }

    if name.len() > 63 {
        return Err(Error::InvalidName {
            message: format!("{kind} name '{name}' is too long (maximum 63 characters)"),
        });
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(Error::InvalidName {
            message: format!(
                "{kind} name '{name}' contains invalid characters (only lowercase letters, digits, and hyphens allowed)"
            ),
        });
    }

    if name.starts_with('-') || name.ends_with('-') {
        return Err(Error::InvalidName {
            message: format!("{kind} name '{name}' cannot start or end with a hyphen"),
        });
    }

    Ok(())
}

/// Name of a durable object-store bucket.
///
/// Bucket names must be 3-63 characters of lowercase alphanumerics and
/// hyphens, with no leading or trailing hyphen (DNS-compatible).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketName(String);

impl BucketName {
    /// Creates a new bucket name after validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_dns_name("bucket", &name)?;
        Ok(Self(name))
    }

    /// Creates a bucket name without validation.
    ///
    /// The caller must ensure the name is valid. This is intended for names
    /// that have already been validated (e.g., read back from a manifest).
    #[must_use]
    pub fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for BucketName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for BucketName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Name of a durable relay queue.
///
/// Same rule set as [`BucketName`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueName(String);

impl QueueName {
    /// Creates a new queue name after validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_dns_name("queue", &name)?;
        Ok(Self(name))
    }

    /// Creates a queue name without validation.
    #[must_use]
    pub fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for QueueName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for QueueName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Name of a durable key-value status table.
///
/// Table names follow the wider key-value store convention: 3-255
/// characters of lowercase alphanumerics, hyphens, and underscores
/// (`ingest_status`), starting and ending with an alphanumeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableName(String);

impl TableName {
    /// Creates a new table name after validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<()> {
        if name.len() < 3 {
            return Err(Error::InvalidName {
                message: format!("table name '{name}' is too short (minimum 3 characters)"),
            });
        }
        if name.len() > 255 {
            return Err(Error::InvalidName {
                message: format!("table name '{name}' is too long (maximum 255 characters)"),
            });
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(Error::InvalidName {
                message: format!(
                    "table name '{name}' contains invalid characters (only lowercase letters, digits, hyphens, and underscores allowed)"
                ),
            });
        }
        let bounds_ok = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric())
            && name
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric());
        if !bounds_ok {
            return Err(Error::InvalidName {
                message: format!(
                    "table name '{name}' must start and end with a letter or digit"
                ),
            });
        }
        Ok(())
    }

    /// Creates a table name without validation.
    #[must_use]
    pub fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for TableName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Identifier of an externally supplied processing unit.
///
/// Same rule set as [`BucketName`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionName(String);

impl FunctionName {
    /// Creates a new function name after validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_dns_name("function", &name)?;
        Ok(Self(name))
    }

    /// Creates a function name without validation.
    #[must_use]
    pub fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for FunctionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for FunctionName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Name of a managed search domain.
///
/// Domain names are 3-28 characters of lowercase alphanumerics and
/// hyphens and must start with a letter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainName(String);

impl DomainName {
    /// Creates a new domain name after validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Creates a domain name without validation.
    #[must_use]
    pub fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(name: &str) -> Result<()> {
        if name.len() < 3 {
            return Err(Error::InvalidName {
                message: format!("domain name '{name}' is too short (minimum 3 characters)"),
            });
        }
        if name.len() > 28 {
            return Err(Error::InvalidName {
                message: format!("domain name '{name}' is too long (maximum 28 characters)"),
            });
        }
        if !name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase())
        {
            return Err(Error::InvalidName {
                message: format!("domain name '{name}' must start with a lowercase letter"),
            });
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(Error::InvalidName {
                message: format!(
                    "domain name '{name}' contains invalid characters (only lowercase letters, digits, and hyphens allowed)"
                ),
            });
        }
        if name.ends_with('-') {
            return Err(Error::InvalidName {
                message: format!("domain name '{name}' cannot end with a hyphen"),
            });
        }
        Ok(())
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for DomainName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for DomainName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// A dotted DNS zone name (e.g. `data.example.com`).
///
/// Used to derive custom endpoints such as `search.{zone}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneName(String);

impl ZoneName {
    /// Creates a new zone name after validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the zone name is not a dotted lowercase DNS name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Returns the zone name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidName {
                message: "zone name cannot be empty".to_string(),
            });
        }
        if name.len() > 253 {
            return Err(Error::InvalidName {
                message: format!("zone name '{name}' is too long (maximum 253 characters)"),
            });
        }
        if !name.contains('.') {
            return Err(Error::InvalidName {
                message: format!("zone name '{name}' must contain at least one dot"),
            });
        }
        for label in name.split('.') {
            if label.is_empty() {
                return Err(Error::InvalidName {
                    message: format!("zone name '{name}' contains an empty label"),
                });
            }
            if !label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            {
                return Err(Error::InvalidName {
                    message: format!(
                        "zone name '{name}' contains invalid characters (only lowercase letters, digits, hyphens, and dots allowed)"
                    ),
                });
            }
            if label.starts_with('-') || label.ends_with('-') {
                return Err(Error::InvalidName {
                    message: format!(
                        "zone name '{name}' has a label starting or ending with a hyphen"
                    ),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for ZoneName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ZoneName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Key of an object within a bucket.
///
/// Keys are free-form paths; the only restrictions are non-emptiness,
/// a 1024-character ceiling, no leading slash, and no control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Creates a new object key after validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty, too long, absolute, or contains
    /// control characters.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        Self::validate(&key)?;
        Ok(Self(key))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(Error::InvalidName {
                message: "object key cannot be empty".to_string(),
            });
        }
        if key.len() > 1024 {
            return Err(Error::InvalidName {
                message: format!("object key is too long ({} > 1024 bytes)", key.len()),
            });
        }
        if key.starts_with('/') {
            return Err(Error::InvalidName {
                message: format!("object key '{key}' cannot start with '/'"),
            });
        }
        if key.chars().any(char::is_control) {
            return Err(Error::InvalidName {
                message: "object key contains control characters".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for ObjectKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
