//! Environment mappings with additive-only defaults.
//!
//! Processing units receive an environment assembled from two sources: the
//! entries the caller configured directly, and the entries the wiring layer
//! injects (bucket names, queue URLs, table names, endpoints). The merge
//! precedence is fixed and documented here once:
//!
//! **Existing keys win.** [`EnvMap::apply_defaults`] only adds a key that is
//! absent; it never overwrites a value the caller already defined. Applying
//! the same defaults twice therefore yields the same mapping as applying
//! them once.
//!
//! # Example
//!
//! ```rust
//! use gantry_core::env::EnvMap;
//!
//! let mut env = EnvMap::new().with("CONSOLE_LOG_LEVEL", "DEBUG");
//! let defaults = EnvMap::new()
//!     .with("CONSOLE_LOG_LEVEL", "INFO")
//!     .with("MAX_FILE_SIZE_MB", "100");
//!
//! let added = env.apply_defaults(&defaults);
//! assert_eq!(added, 1);
//! assert_eq!(env.get("CONSOLE_LOG_LEVEL"), Some("DEBUG"));
//! assert_eq!(env.get("MAX_FILE_SIZE_MB"), Some("100"));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An ordered environment mapping (key to value).
///
/// Backed by a `BTreeMap` so iteration order and serialized output are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvMap(BTreeMap<String, String>);

impl EnvMap {
    /// Creates an empty environment mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; overwrites an existing key.
    ///
    /// This is the caller's own assignment path. The additive-only path is
    /// [`apply_defaults`](Self::apply_defaults).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Inserts a key, overwriting any existing value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the value for a key, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns true if the key is defined.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the mapping is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Adds a single default entry if the key is absent.
    ///
    /// Returns true if the entry was added, false if the key was already
    /// defined (in which case the existing value is untouched).
    pub fn apply_default(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.0.contains_key(&key) {
            return false;
        }
        self.0.insert(key, value.into());
        true
    }

    /// Merges `defaults` into this mapping, additive-only.
    ///
    /// For each key in `defaults`: if this mapping already defines the key,
    /// the existing value is kept; otherwise the default value is added.
    /// Idempotent by construction. Returns the number of entries added.
    pub fn apply_defaults(&mut self, defaults: &Self) -> usize {
        let mut added = 0;
        for (key, value) in &defaults.0 {
            if !self.0.contains_key(key) {
                self.0.insert(key.clone(), value.clone());
                added += 1;
            }
        }
        added
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for EnvMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a EnvMap {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
