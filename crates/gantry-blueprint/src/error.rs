//! Error types for blueprint construction and wiring.

/// The result type used throughout gantry-blueprint.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while declaring or wiring resources.
///
/// Every variant is a configuration error in the sense of the library
/// contract: it is raised synchronously, before any resource action, and
/// the blueprint is left unchanged by the failing call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A reference belongs to a different blueprint than the one operated on.
    #[error("foreign reference: {resource_type} '{name}' belongs to a different blueprint")]
    ForeignRef {
        /// The kind of resource the reference points at.
        resource_type: &'static str,
        /// The name carried by the reference.
        name: String,
    },

    /// A resource with the same name was already declared.
    #[error("duplicate {resource_type} name: {name}")]
    DuplicateName {
        /// The kind of resource being declared.
        resource_type: &'static str,
        /// The name that collided.
        name: String,
    },

    /// A spec carried an invalid combination of parameters.
    #[error("invalid {resource_type} spec '{name}': {message}")]
    InvalidSpec {
        /// The kind of resource being validated.
        resource_type: &'static str,
        /// The name of the offending spec.
        name: String,
        /// Description of the invalid parameter.
        message: String,
    },

    /// A wiring operation (notification, binding, grant) was rejected.
    #[error("wiring error: {message}")]
    Wiring {
        /// Description of the rejected wiring.
        message: String,
    },

    /// Manifest synthesis failed to serialize.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An error from gantry-core.
    #[error("core error: {0}")]
    Core(#[from] gantry_core::error::Error),
}

impl Error {
    /// Creates a new invalid-spec error.
    #[must_use]
    pub fn invalid_spec(
        resource_type: &'static str,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidSpec {
            resource_type,
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a new wiring error.
    #[must_use]
    pub fn wiring(message: impl Into<String>) -> Self {
        Self::Wiring {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_ref_display() {
        let err = Error::ForeignRef {
            resource_type: "bucket",
            name: "dropbox".into(),
        };
        assert!(err.to_string().contains("different blueprint"));
        assert!(err.to_string().contains("dropbox"));
    }

    #[test]
    fn invalid_spec_display() {
        let err = Error::invalid_spec("queue", "dropbox-queue", "visibility timeout must be positive");
        let msg = err.to_string();
        assert!(msg.contains("queue"));
        assert!(msg.contains("dropbox-queue"));
        assert!(msg.contains("visibility timeout"));
    }

    #[test]
    fn core_error_converts() {
        let core_err = gantry_core::name::BucketName::new("").unwrap_err();
        let err: Error = core_err.into();
        assert!(err.to_string().contains("core error"));
    }
}
