//! Removal policy for provisioned resources.

use serde::{Deserialize, Serialize};

/// What happens to a resource when its blueprint is torn down.
///
/// Buckets, tables, and search domains carry a removal policy in the
/// synthesized manifest. Data-bearing resources that outlive deployments
/// (search domains, snapshot storage) default to [`RemovalPolicy::Retain`];
/// everything else defaults to [`RemovalPolicy::Destroy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemovalPolicy {
    /// Delete the resource and its contents on teardown.
    Destroy,
    /// Leave the resource in place on teardown.
    Retain,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&RemovalPolicy::Destroy).unwrap(),
            "\"DESTROY\""
        );
        assert_eq!(
            serde_json::to_string(&RemovalPolicy::Retain).unwrap(),
            "\"RETAIN\""
        );
    }
}
