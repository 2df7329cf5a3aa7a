//! Local deployment of a blueprint.
//!
//! [`LocalDeployment`] provisions the in-memory rendition of a
//! synthesized blueprint: one [`RelayQueue`] per queue entry (dead-letter
//! targets first), an object store with every bucket and notification
//! subscription, and a [`MemoryStatusLedger`] per status table.
//! Processing units attach afterwards through
//! [`bind_unit`](LocalDeployment::bind_unit), which resolves the
//! declared binding and environment for the unit.
//!
//! [`DeployConfig`] tunes the harness from the process environment.
//! The declared queue parameters suit production (a 20 minute
//! visibility timeout makes sense for a real processing fleet, not for
//! a local loop), so the config can override visibility timeout,
//! receive budget, and batch size across the whole deployment:
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `GANTRY_LOG_FORMAT` | `json` or `pretty` log output |
//! | `GANTRY_VISIBILITY_TIMEOUT_SECS` | Visibility timeout override for every queue |
//! | `GANTRY_MAX_RECEIVE_COUNT` | Receive budget override for every dead-letter policy |
//! | `GANTRY_BATCH_SIZE` | Batch size override for every binding |

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use gantry_blueprint::blueprint::{BindingRule, Blueprint};
use gantry_blueprint::manifest::{Manifest, QueueEntry};
use gantry_core::env::EnvMap;
use gantry_core::error::Error as CoreError;
use gantry_core::name::{FunctionName, QueueName, TableName};
use gantry_core::observability::{blueprint_span, init_logging, LogFormat};

use crate::error::{Error, Result};
use crate::ledger::MemoryStatusLedger;
use crate::processor::{ProcessingUnit, QueueBinding};
use crate::queue::{RelayQueue, RelayQueueOptions};
use crate::store::MemoryObjectStore;

/// Environment variable selecting the log output format.
pub const ENV_LOG_FORMAT: &str = "GANTRY_LOG_FORMAT";
/// Environment variable overriding every queue's visibility timeout.
pub const ENV_VISIBILITY_TIMEOUT_SECS: &str = "GANTRY_VISIBILITY_TIMEOUT_SECS";
/// Environment variable overriding every dead-letter receive budget.
pub const ENV_MAX_RECEIVE_COUNT: &str = "GANTRY_MAX_RECEIVE_COUNT";
/// Environment variable overriding every binding's batch size.
pub const ENV_BATCH_SIZE: &str = "GANTRY_BATCH_SIZE";

/// Harness configuration for local deployments.
///
/// Overrides left as `None` fall back to the declared values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeployConfig {
    /// Log output format.
    pub log_format: LogFormat,
    /// Visibility timeout applied to every queue, when set.
    pub visibility_timeout: Option<Duration>,
    /// Receive budget applied to every dead-letter policy, when set.
    pub max_receive_count: Option<NonZeroU32>,
    /// Batch size applied to every binding, when set.
    pub batch_size: Option<NonZeroU32>,
}

impl DeployConfig {
    /// Loads the configuration from `GANTRY_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(format) = env_string(ENV_LOG_FORMAT) {
            config.log_format = parse_log_format(ENV_LOG_FORMAT, &format)?;
        }
        if let Some(secs) = env_u64(ENV_VISIBILITY_TIMEOUT_SECS)? {
            if secs == 0 {
                return Err(CoreError::InvalidInput(format!(
                    "{ENV_VISIBILITY_TIMEOUT_SECS} must be greater than 0"
                ))
                .into());
            }
            config.visibility_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(count) = env_u64(ENV_MAX_RECEIVE_COUNT)? {
            config.max_receive_count = Some(nonzero_u32(ENV_MAX_RECEIVE_COUNT, count)?);
        }
        if let Some(size) = env_u64(ENV_BATCH_SIZE)? {
            config.batch_size = Some(nonzero_u32(ENV_BATCH_SIZE, size)?);
        }
        Ok(config)
    }
}

/// An in-memory provisioning of a blueprint's resources.
#[derive(Debug)]
pub struct LocalDeployment {
    blueprint: String,
    store: Arc<MemoryObjectStore>,
    queues: HashMap<QueueName, Arc<RelayQueue>>,
    ledgers: HashMap<TableName, Arc<MemoryStatusLedger>>,
    environments: HashMap<FunctionName, EnvMap>,
    bindings: Vec<BindingRule>,
    batch_size_override: Option<NonZeroU32>,
}

impl LocalDeployment {
    /// Provisions a blueprint with the default harness configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the blueprint fails validation.
    pub fn provision(blueprint: &Blueprint) -> Result<Self> {
        Self::provision_with(blueprint, &DeployConfig::default())
    }

    /// Provisions a blueprint with an explicit harness configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the blueprint fails validation.
    pub fn provision_with(blueprint: &Blueprint, config: &DeployConfig) -> Result<Self> {
        let manifest = blueprint.synth()?;
        Self::from_manifest(&manifest, config)
    }

    /// Provisions a previously synthesized manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest references resources it does
    /// not declare, or carries values outside their valid range.
    pub fn from_manifest(manifest: &Manifest, config: &DeployConfig) -> Result<Self> {
        init_logging(config.log_format);
        let span = blueprint_span("provision", &manifest.blueprint);
        let _guard = span.enter();

        let queues = build_queues(&manifest.queues, config)?;

        let store = MemoryObjectStore::new();
        for bucket in &manifest.buckets {
            store.register_bucket(bucket.name.clone())?;
        }
        for rule in &manifest.notifications {
            let queue = queues
                .get(&rule.queue)
                .ok_or_else(|| Error::not_provisioned("queue", &rule.queue))?;
            store.subscribe(&rule.bucket, Arc::clone(queue))?;
        }

        let mut ledgers = HashMap::new();
        for table in &manifest.tables {
            ledgers.insert(
                table.name.clone(),
                Arc::new(MemoryStatusLedger::new(table.name.clone())),
            );
        }

        let mut environments = HashMap::new();
        for function in &manifest.functions {
            environments.insert(function.name.clone(), function.environment.clone());
        }
        for binding in &manifest.bindings {
            if !environments.contains_key(&binding.function) {
                return Err(Error::not_provisioned("function", &binding.function));
            }
            if !queues.contains_key(&binding.queue) {
                return Err(Error::not_provisioned("queue", &binding.queue));
            }
        }

        info!(
            blueprint = %manifest.blueprint,
            buckets = manifest.buckets.len(),
            queues = queues.len(),
            tables = ledgers.len(),
            functions = environments.len(),
            bindings = manifest.bindings.len(),
            "local deployment provisioned"
        );
        Ok(Self {
            blueprint: manifest.blueprint.clone(),
            store: Arc::new(store),
            queues,
            ledgers,
            environments,
            bindings: manifest.bindings.clone(),
            batch_size_override: config.batch_size,
        })
    }

    /// Returns the name of the provisioned blueprint.
    #[must_use]
    pub fn blueprint(&self) -> &str {
        &self.blueprint
    }

    /// Returns the object store. Clone the `Arc` to hand processing
    /// units their own handle.
    #[must_use]
    pub fn store(&self) -> &Arc<MemoryObjectStore> {
        &self.store
    }

    /// Looks up a provisioned queue.
    ///
    /// # Errors
    ///
    /// Returns an error if no such queue was provisioned.
    pub fn queue(&self, name: &QueueName) -> Result<&Arc<RelayQueue>> {
        self.queues
            .get(name)
            .ok_or_else(|| Error::not_provisioned("queue", name))
    }

    /// Looks up the ledger backing a provisioned status table.
    ///
    /// # Errors
    ///
    /// Returns an error if no such table was provisioned.
    pub fn ledger(&self, table: &TableName) -> Result<&Arc<MemoryStatusLedger>> {
        self.ledgers
            .get(table)
            .ok_or_else(|| Error::not_provisioned("table", table))
    }

    /// Looks up a provisioned function's resolved environment.
    ///
    /// # Errors
    ///
    /// Returns an error if no such function was provisioned.
    pub fn environment(&self, function: &FunctionName) -> Result<&EnvMap> {
        self.environments
            .get(function)
            .ok_or_else(|| Error::not_provisioned("function", function))
    }

    /// Attaches a processing unit to its declared binding.
    ///
    /// The declared batch size applies unless the harness configuration
    /// overrides it.
    ///
    /// # Errors
    ///
    /// Returns an error if the function has no binding, or more than
    /// one.
    pub fn bind_unit(
        &self,
        function: &FunctionName,
        unit: Arc<dyn ProcessingUnit>,
    ) -> Result<QueueBinding> {
        let mut rules = self
            .bindings
            .iter()
            .filter(|rule| &rule.function == function);
        let rule = rules
            .next()
            .ok_or_else(|| Error::not_provisioned("binding", function))?;
        if rules.next().is_some() {
            return Err(Error::internal(format!(
                "function '{function}' is bound to more than one queue"
            )));
        }
        let queue = self.queue(&rule.queue)?;
        let environment = self.environment(function)?.clone();
        let batch_size = self.batch_size_override.unwrap_or(rule.batch_size);
        Ok(QueueBinding::new(
            function.clone(),
            unit,
            Arc::clone(queue),
            environment,
            batch_size,
        ))
    }
}

/// Builds every queue, wiring dead-letter targets before their sources.
fn build_queues(
    entries: &[QueueEntry],
    config: &DeployConfig,
) -> Result<HashMap<QueueName, Arc<RelayQueue>>> {
    let mut queues = HashMap::new();
    let mut pending: VecDeque<&QueueEntry> = VecDeque::new();
    for entry in entries {
        if entry.dead_letter.is_none() {
            queues.insert(
                entry.name.clone(),
                Arc::new(RelayQueue::new(entry.name.clone(), queue_options(entry, config))),
            );
        } else {
            pending.push_back(entry);
        }
    }

    let mut stalled = 0usize;
    while let Some(entry) = pending.pop_front() {
        let Some(dead_letter) = &entry.dead_letter else {
            continue;
        };
        let Some(target) = queues.get(&dead_letter.queue) else {
            pending.push_back(entry);
            stalled += 1;
            if stalled > pending.len() {
                return Err(Error::not_provisioned("queue", &dead_letter.queue));
            }
            continue;
        };
        let declared = NonZeroU32::new(dead_letter.max_receive_count).ok_or_else(|| {
            CoreError::InvalidInput(format!(
                "queue '{}' dead-letter max receive count must be greater than 0",
                entry.name
            ))
        })?;
        let max = config.max_receive_count.unwrap_or(declared);
        let queue = RelayQueue::new(entry.name.clone(), queue_options(entry, config))
            .with_dead_letter(Arc::clone(target), max);
        queues.insert(entry.name.clone(), Arc::new(queue));
        stalled = 0;
    }
    Ok(queues)
}

fn queue_options(entry: &QueueEntry, config: &DeployConfig) -> RelayQueueOptions {
    RelayQueueOptions {
        visibility_timeout: config
            .visibility_timeout
            .unwrap_or(Duration::from_secs(entry.visibility_timeout_secs)),
        retention: Duration::from_secs(entry.retention_secs),
        delivery_order: entry.delivery_order,
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u64>()
        .map(Some)
        .map_err(|e| CoreError::InvalidInput(format!("{name} must be a u64: {e}")).into())
}

fn parse_log_format(name: &str, value: &str) -> Result<LogFormat> {
    let format = value.trim().to_ascii_lowercase();
    match format.as_str() {
        "json" => Ok(LogFormat::Json),
        "pretty" => Ok(LogFormat::Pretty),
        _ => Err(CoreError::InvalidInput(format!(
            "{name} must be one of: json, pretty (got {value})"
        ))
        .into()),
    }
}

fn nonzero_u32(name: &str, value: u64) -> Result<NonZeroU32> {
    let value = u32::try_from(value)
        .map_err(|_| CoreError::InvalidInput(format!("{name} must fit in a u32 (got {value})")))?;
    NonZeroU32::new(value)
        .ok_or_else(|| CoreError::InvalidInput(format!("{name} must be greater than 0")).into())
}
