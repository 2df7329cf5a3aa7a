//! Network specs.
//!
//! Declares the VPC-level layout shared by the provisioned resources: an
//! address range, availability zone spread, and subnet tiers. The default
//! layout matches a small data-center footprint with no NAT gateways and
//! a public plus an isolated tier.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use gantry_core::cidr::IpCidr;

use crate::error::{Error, Result};

/// Default VPC address range, `10.1.0.0/16`.
const DEFAULT_VPC_PREFIX_LEN: u8 = 16;

/// Default subnet mask width.
pub const DEFAULT_SUBNET_MASK: u8 = 24;

/// Widest subnet mask a provisioner accepts.
pub const MAX_SUBNET_MASK: u8 = 28;

/// Subnet placement tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubnetTier {
    /// Routable from the internet.
    Public,
    /// No route to or from the internet.
    Isolated,
}

/// A subnet tier declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSpec {
    /// Subnet name.
    pub name: String,
    /// Placement tier.
    pub tier: SubnetTier,
    /// Mask width; `/24` gives 254 usable addresses per zone.
    pub mask: u8,
}

/// Declarative configuration for the shared network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSpec {
    name: String,
    cidr: IpCidr,
    max_azs: u8,
    nat_gateways: u8,
    dns_hostnames: bool,
    dns_support: bool,
    subnets: Vec<SubnetSpec>,
}

impl NetworkSpec {
    /// Creates a network spec with the default layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::invalid_spec(
                "network",
                name,
                "network name cannot be empty",
            ));
        }
        // 10.1.0.0/16 is canonical for the prefix, so this cannot fail.
        let cidr = IpCidr::new(Ipv4Addr::new(10, 1, 0, 0), DEFAULT_VPC_PREFIX_LEN)?;
        Ok(Self {
            name,
            cidr,
            max_azs: 2,
            nat_gateways: 0,
            dns_hostnames: true,
            dns_support: true,
            subnets: vec![
                SubnetSpec {
                    name: "public".to_string(),
                    tier: SubnetTier::Public,
                    mask: DEFAULT_SUBNET_MASK,
                },
                SubnetSpec {
                    name: "isolated".to_string(),
                    tier: SubnetTier::Isolated,
                    mask: DEFAULT_SUBNET_MASK,
                },
            ],
        })
    }

    /// Sets the VPC address range.
    #[must_use]
    pub fn with_cidr(mut self, cidr: IpCidr) -> Self {
        self.cidr = cidr;
        self
    }

    /// Sets the maximum number of availability zones to spread across.
    #[must_use]
    pub fn with_max_azs(mut self, max_azs: u8) -> Self {
        self.max_azs = max_azs;
        self
    }

    /// Sets the number of NAT gateways.
    #[must_use]
    pub fn with_nat_gateways(mut self, nat_gateways: u8) -> Self {
        self.nat_gateways = nat_gateways;
        self
    }

    /// Replaces the subnet tiers.
    #[must_use]
    pub fn with_subnets(mut self, subnets: Vec<SubnetSpec>) -> Self {
        self.subnets = subnets;
        self
    }

    /// Returns the network name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the VPC address range.
    #[must_use]
    pub fn cidr(&self) -> IpCidr {
        self.cidr
    }

    /// Returns the maximum availability zone spread.
    #[must_use]
    pub fn max_azs(&self) -> u8 {
        self.max_azs
    }

    /// Returns the number of NAT gateways.
    #[must_use]
    pub fn nat_gateways(&self) -> u8 {
        self.nat_gateways
    }

    /// Returns whether instances receive public DNS hostnames.
    #[must_use]
    pub fn dns_hostnames(&self) -> bool {
        self.dns_hostnames
    }

    /// Returns whether DNS resolution is supported in the VPC.
    #[must_use]
    pub fn dns_support(&self) -> bool {
        self.dns_support
    }

    /// Returns the subnet tiers.
    #[must_use]
    pub fn subnets(&self) -> &[SubnetSpec] {
        &self.subnets
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_azs == 0 {
            return Err(Error::invalid_spec(
                "network",
                &self.name,
                "at least one availability zone is required",
            ));
        }
        if self.subnets.is_empty() {
            return Err(Error::invalid_spec(
                "network",
                &self.name,
                "at least one subnet tier is required",
            ));
        }
        for subnet in &self.subnets {
            if subnet.name.is_empty() {
                return Err(Error::invalid_spec(
                    "network",
                    &self.name,
                    "subnet names cannot be empty",
                ));
            }
            if subnet.mask < self.cidr.prefix_len() {
                return Err(Error::invalid_spec(
                    "network",
                    &self.name,
                    format!(
                        "subnet '{}' mask /{} is wider than the VPC range /{}",
                        subnet.name,
                        subnet.mask,
                        self.cidr.prefix_len()
                    ),
                ));
            }
            if subnet.mask > MAX_SUBNET_MASK {
                return Err(Error::invalid_spec(
                    "network",
                    &self.name,
                    format!(
                        "subnet '{}' mask /{} is narrower than the /{MAX_SUBNET_MASK} limit",
                        subnet.name, subnet.mask
                    ),
                ));
            }
        }
        let mut names: Vec<&str> = self.subnets.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.subnets.len() {
            return Err(Error::invalid_spec(
                "network",
                &self.name,
                "subnet names must be unique",
            ));
        }
        Ok(())
    }
}
