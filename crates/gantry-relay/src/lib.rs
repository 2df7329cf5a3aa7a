//! # gantry-relay
//!
//! Executable rendition of the relay semantics `gantry-blueprint`
//! declares.
//!
//! The relay runs the three-stage pipeline in process memory: an
//! object [`store`] that publishes arrival notifications, a [`queue`]
//! with visibility timeouts, bounded redelivery, and dead-letter
//! routing, and a [`processor`] pump that invokes bound processing
//! units. A [`ledger`] offers processing units the minimal put/get
//! status surface, and [`deploy`] provisions all of it from a
//! synthesized blueprint manifest.
//!
//! Delivery is at least once. Messages that are not acknowledged
//! within the visibility window come back with an incremented receive
//! count, and processing units are required to tolerate duplicates
//! (see [`processor::ProcessingUnit`]).
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use bytes::Bytes;
//!
//! use gantry_blueprint::blueprint::Blueprint;
//! use gantry_blueprint::pipeline::{IngestPipeline, IngestPipelineConfig};
//! use gantry_relay::deploy::LocalDeployment;
//! use gantry_relay::processor::{Invocation, ProcessingUnit};
//!
//! #[derive(Debug)]
//! struct Acknowledger;
//!
//! #[async_trait]
//! impl ProcessingUnit for Acknowledger {
//!     async fn process(&self, _invocation: Invocation) -> gantry_relay::error::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> gantry_relay::error::Result<()> {
//! let mut blueprint = Blueprint::new("ingest");
//! let _refs = IngestPipeline::build(&mut blueprint, &IngestPipelineConfig::default())?;
//! let deployment = LocalDeployment::provision(&blueprint)?;
//!
//! deployment.store().put_object(
//!     &"dropbox".parse()?,
//!     "batch-001.csv".parse()?,
//!     Bytes::from_static(b"id,name\n1,alpha\n"),
//! )?;
//!
//! let binding = deployment.bind_unit(&"dropbox-processor".parse()?, Arc::new(Acknowledger))?;
//! let summary = binding.run_until_idle().await?;
//! assert_eq!(summary.succeeded, 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod deploy;
pub mod error;
pub mod ledger;
pub mod message;
pub mod metrics;
pub mod processor;
pub mod queue;
pub mod store;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use gantry_relay::prelude::*;
/// ```
pub mod prelude {
    pub use crate::deploy::{DeployConfig, LocalDeployment};
    pub use crate::error::{Error, Result};
    pub use crate::ledger::{MemoryStatusLedger, StatusLedger, StatusRecord, StatusValue};
    pub use crate::message::{ArrivalMessage, Delivery};
    pub use crate::processor::{Invocation, ProcessingUnit, QueueBinding, RunSummary};
    pub use crate::queue::{RelayQueue, RelayQueueOptions};
    pub use crate::store::MemoryObjectStore;
}

// Re-export key types at crate root for ergonomics
pub use crate::deploy::{DeployConfig, LocalDeployment};
pub use crate::error::{Error, Result};
pub use crate::ledger::{MemoryStatusLedger, StatusLedger, StatusRecord};
pub use crate::processor::{ProcessingUnit, QueueBinding};
pub use crate::queue::RelayQueue;
pub use crate::store::MemoryObjectStore;
