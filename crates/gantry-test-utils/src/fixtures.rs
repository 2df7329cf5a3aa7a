//! Fixture helpers for common test inputs.
//!
//! Factory functions that parse validated names and build payloads with
//! sensible defaults, panicking on invalid fixture input.

use bytes::Bytes;

use gantry_core::name::{BucketName, FunctionName, ObjectKey, QueueName, TableName};

/// Parses a bucket name fixture.
#[must_use]
pub fn bucket(name: &str) -> BucketName {
    name.parse().expect("valid bucket name fixture")
}

/// Parses a queue name fixture.
#[must_use]
pub fn queue(name: &str) -> QueueName {
    name.parse().expect("valid queue name fixture")
}

/// Parses a function name fixture.
#[must_use]
pub fn function(name: &str) -> FunctionName {
    name.parse().expect("valid function name fixture")
}

/// Parses a table name fixture.
#[must_use]
pub fn table(name: &str) -> TableName {
    name.parse().expect("valid table name fixture")
}

/// Parses an object key fixture.
#[must_use]
pub fn key(name: &str) -> ObjectKey {
    name.parse().expect("valid object key fixture")
}

/// Returns a unique lowercase resource name with the given prefix.
///
/// Useful when tests share a process and need non-colliding names.
#[must_use]
pub fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{}", ulid::Ulid::new().to_string().to_lowercase())
}

/// A small CSV payload for arrival tests.
#[must_use]
pub fn sample_csv() -> Bytes {
    Bytes::from_static(b"id,name\n1,alpha\n2,beta\n")
}
