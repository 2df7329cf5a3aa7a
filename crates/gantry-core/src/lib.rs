//! # gantry-core
//!
//! Core abstractions for the Gantry event relay library.
//!
//! This crate provides the foundational types used across all Gantry components:
//!
//! - **Validated Names**: DNS-compatible bucket/queue/table/function names and object keys
//! - **Identifiers**: Strongly-typed ULID message IDs and receipt handles
//! - **Environment Maps**: Additive-only default merging with fixed precedence
//! - **CIDR Blocks**: Parsed and validated IPv4 ranges
//! - **Clock**: Injectable time source for visibility and retention arithmetic
//! - **Error Types**: Shared error definitions and result types
//!
//! ## Crate Boundary
//!
//! `gantry-core` is the **only** crate allowed to define shared primitives.
//! The blueprint and relay crates build their contracts on the types defined
//! here.
//!
//! ## Example
//!
//! ```rust
//! use gantry_core::prelude::*;
//!
//! let bucket = BucketName::new("dropbox").unwrap();
//! let message_id = MessageId::generate();
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod cidr;
pub mod clock;
pub mod env;
pub mod error;
pub mod id;
pub mod name;
pub mod observability;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use gantry_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cidr::IpCidr;
    pub use crate::clock::{Clock, SystemClock, VirtualClock};
    pub use crate::env::EnvMap;
    pub use crate::error::{Error, Result};
    pub use crate::id::{MessageId, ReceiptHandle};
    pub use crate::name::{
        BucketName, DomainName, FunctionName, ObjectKey, QueueName, TableName, ZoneName,
    };
}

// Re-export key types at crate root for ergonomics
pub use cidr::IpCidr;
pub use clock::{Clock, SystemClock, VirtualClock};
pub use env::EnvMap;
pub use error::{Error, Result};
pub use id::{MessageId, ReceiptHandle};
pub use name::{BucketName, DomainName, FunctionName, ObjectKey, QueueName, TableName, ZoneName};
pub use observability::{LogFormat, init_logging};
