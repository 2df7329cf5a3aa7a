//! Processing function specs.

use std::time::Duration;

use gantry_core::env::EnvMap;
use gantry_core::name::FunctionName;

use crate::error::{Error, Result};

/// Default invocation timeout (15 minutes).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Default memory allocation in MiB.
pub const DEFAULT_MEMORY_MB: u32 = 512;

/// Smallest allowed memory allocation in MiB.
pub const MIN_MEMORY_MB: u32 = 128;

/// Declarative configuration for a processing function.
///
/// The function body itself is supplied by the caller and out of scope
/// here; the spec carries the name, the caller-defined environment, and
/// resource limits. Wiring operations on the blueprint later extend the
/// environment additively, never overwriting caller-defined keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpec {
    name: FunctionName,
    environment: EnvMap,
    timeout: Duration,
    memory_mb: u32,
}

impl FunctionSpec {
    /// Creates a function spec with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a valid function name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: FunctionName::new(name)?,
            environment: EnvMap::new(),
            timeout: DEFAULT_TIMEOUT,
            memory_mb: DEFAULT_MEMORY_MB,
        })
    }

    /// Replaces the caller-defined environment.
    #[must_use]
    pub fn with_environment(mut self, environment: EnvMap) -> Self {
        self.environment = environment;
        self
    }

    /// Sets a single environment variable, overwriting any existing value.
    #[must_use]
    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.set(key, value);
        self
    }

    /// Sets the invocation timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the memory allocation in MiB.
    #[must_use]
    pub fn with_memory_mb(mut self, memory_mb: u32) -> Self {
        self.memory_mb = memory_mb;
        self
    }

    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &FunctionName {
        &self.name
    }

    /// Returns the environment as currently declared.
    #[must_use]
    pub fn environment(&self) -> &EnvMap {
        &self.environment
    }

    pub(crate) fn environment_mut(&mut self) -> &mut EnvMap {
        &mut self.environment
    }

    /// Returns the invocation timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the memory allocation in MiB.
    #[must_use]
    pub fn memory_mb(&self) -> u32 {
        self.memory_mb
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::invalid_spec(
                "function",
                self.name.as_str(),
                "timeout must be positive",
            ));
        }
        if self.memory_mb < MIN_MEMORY_MB {
            return Err(Error::invalid_spec(
                "function",
                self.name.as_str(),
                format!("memory must be at least {MIN_MEMORY_MB} MiB"),
            ));
        }
        Ok(())
    }
}
