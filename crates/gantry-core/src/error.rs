//! Error types and result aliases for Gantry.
//!
//! This module defines the shared error types used across all Gantry crates.
//! Errors are structured for programmatic handling and include context for debugging.

use std::fmt;

/// The result type used throughout Gantry.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Gantry operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A resource name failed validation.
    #[error("invalid name: {message}")]
    InvalidName {
        /// Description of what made the name invalid.
        message: String,
    },

    /// An identifier could not be parsed.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// Description of what made the ID invalid.
        message: String,
    },

    /// An IP range could not be parsed or is out of bounds.
    #[error("invalid CIDR block: {message}")]
    InvalidCidr {
        /// Description of the malformed range.
        message: String,
    },

    /// The requested resource was not found.
    #[error("not found: {resource_type} '{name}'")]
    ResourceNotFound {
        /// The kind of resource that was not found.
        resource_type: &'static str,
        /// The name that was looked up.
        name: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A precondition for the operation was not met.
    #[error("precondition failed: {message}")]
    PreconditionFailed {
        /// Description of the failed precondition.
        message: String,
    },

    /// A ledger or store operation failed.
    #[error("ledger error: {message}")]
    Ledger {
        /// Description of the ledger failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new ledger error with the given message.
    #[must_use]
    pub fn ledger(message: impl Into<String>) -> Self {
        Self::Ledger {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new ledger error with a source cause.
    #[must_use]
    pub fn ledger_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Ledger {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new resource not found error.
    #[must_use]
    pub fn resource_not_found(resource_type: &'static str, name: impl fmt::Display) -> Self {
        Self::ResourceNotFound {
            resource_type,
            name: name.to_string(),
        }
    }

    /// Creates a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn not_found_display_includes_type_and_name() {
        let err = Error::resource_not_found("bucket", "dropbox");
        let msg = err.to_string();
        assert!(msg.contains("bucket"));
        assert!(msg.contains("dropbox"));
    }

    #[test]
    fn ledger_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = Error::ledger_with_source("failed to persist record", source);
        assert!(err.to_string().contains("ledger error"));
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn invalid_input_display() {
        let err = Error::InvalidInput("GANTRY_BATCH_SIZE must be a u32".to_string());
        assert!(err.to_string().contains("invalid input"));
    }
}
