//! # gantry-blueprint
//!
//! Declarative blueprints for event-driven ingest wiring.
//!
//! A [`Blueprint`](blueprint::Blueprint) collects typed resource specs
//! (buckets, queues, tables, functions, search domains, certificates,
//! networks) and the wiring rules between them (arrival notifications,
//! queue-to-function bindings, additive environment injection, access
//! grants). Declaring is cheap and synchronous; every configuration
//! mistake surfaces as an [`Error`](error::Error) from the declaring
//! call, and nothing is provisioned until a deployment harness consumes
//! the synthesized [`Manifest`](manifest::Manifest).
//!
//! The [`pipeline`] module assembles the full ingest wiring in one
//! call. The executable rendition of the declared queue semantics lives
//! in the `gantry-relay` crate.
//!
//! ## Example
//!
//! ```rust
//! use gantry_blueprint::blueprint::{BindingOptions, Blueprint};
//! use gantry_blueprint::bucket::BucketSpec;
//! use gantry_blueprint::function::FunctionSpec;
//! use gantry_blueprint::queue::QueueSpec;
//!
//! # fn main() -> gantry_blueprint::error::Result<()> {
//! let mut blueprint = Blueprint::new("ingest");
//! let bucket = blueprint.add_bucket(BucketSpec::new("dropbox")?)?;
//! let queue = blueprint.add_queue(QueueSpec::new("dropbox-queue")?)?;
//! let function = blueprint.add_function(FunctionSpec::new("dropbox-processor")?)?;
//!
//! blueprint.notify_on_object_created(&bucket, &queue)?;
//! blueprint.bind_queue(&function, &queue, BindingOptions::default())?;
//!
//! let manifest = blueprint.synth()?;
//! assert_eq!(manifest.notifications.len(), 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod blueprint;
pub mod bucket;
pub mod certificate;
pub mod error;
pub mod function;
pub mod manifest;
pub mod network;
pub mod pipeline;
pub mod queue;
pub mod removal;
pub mod schedule;
pub mod search;
pub mod table;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use gantry_blueprint::prelude::*;
/// ```
pub mod prelude {
    pub use crate::blueprint::{
        BindingOptions, Blueprint, BucketRef, DomainRef, FunctionRef, QueueRef, TableRef,
    };
    pub use crate::bucket::BucketSpec;
    pub use crate::error::{Error, Result};
    pub use crate::function::FunctionSpec;
    pub use crate::manifest::Manifest;
    pub use crate::pipeline::{IngestPipeline, IngestPipelineConfig};
    pub use crate::queue::{DeliveryOrder, QueueSpec};
    pub use crate::removal::RemovalPolicy;
    pub use crate::table::TableSpec;
}

// Re-export key types at crate root for ergonomics
pub use crate::blueprint::{BindingOptions, Blueprint};
pub use crate::error::{Error, Result};
pub use crate::manifest::Manifest;
pub use crate::pipeline::{IngestPipeline, IngestPipelineConfig};
