//! Error types for the relay runtime.
//!
//! The runtime carries three kinds of failure, and only the first two
//! surface as `Err`:
//!
//! - configuration and wiring mistakes arrive from the blueprint layer
//!   and propagate unchanged through [`Error::Blueprint`];
//! - runtime plumbing failures (lock poisoning, a handle naming a queue
//!   the deployment never provisioned) are errors of this crate;
//! - processing failures are not errors at all from the relay's point of
//!   view. An invocation that fails is logged and left to the queue's
//!   declarative redelivery policy; the pump performs no retries of its
//!   own.

/// The result type used throughout gantry-relay.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the relay runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A processing unit rejected an invocation.
    ///
    /// Constructed by processing units themselves; the invocation pump
    /// logs it and leaves the message to redelivery.
    #[error("invocation failed in unit '{unit}': {message}")]
    Invocation {
        /// Name of the failing unit.
        unit: String,
        /// Description of the failure.
        message: String,
    },

    /// A handle named a resource the deployment never provisioned.
    #[error("not provisioned: {resource_type} '{name}'")]
    NotProvisioned {
        /// The kind of resource that was looked up.
        resource_type: &'static str,
        /// The name that was looked up.
        name: String,
    },

    /// An internal runtime error (lock poisoning and similar).
    #[error("internal relay error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },

    /// An error from the blueprint layer, propagated unchanged.
    #[error("blueprint error: {0}")]
    Blueprint(#[from] gantry_blueprint::error::Error),

    /// An error from gantry-core.
    #[error("core error: {0}")]
    Core(#[from] gantry_core::error::Error),
}

impl Error {
    /// Creates a new invocation error.
    #[must_use]
    pub fn invocation(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invocation {
            unit: unit.into(),
            message: message.into(),
        }
    }

    /// Creates a new not-provisioned error.
    #[must_use]
    pub fn not_provisioned(resource_type: &'static str, name: impl std::fmt::Display) -> Self {
        Self::NotProvisioned {
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

    #[test]
    fn invocation_display_names_the_unit() {
        let err = Error::invocation("dropbox-processor", "schema mismatch");
        let msg = err.to_string();
        assert!(msg.contains("dropbox-processor"));
        assert!(msg.contains("schema mismatch"));
    }

    #[test]
    fn blueprint_errors_propagate_unchanged() {
        let inner = gantry_blueprint::error::Error::wiring("dangling binding");
        let err = Error::from(inner);
        assert!(err.to_string().contains("dangling binding"));
    }
}
