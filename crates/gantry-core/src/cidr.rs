//! IPv4 CIDR blocks for network and access configuration.
//!
//! Malformed ranges are configuration errors and are rejected synchronously
//! at parse time, before any resource is declared against them.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// An IPv4 CIDR block, e.g. `10.1.0.0/16`.
///
/// The address must be the canonical network address for the prefix length:
/// `10.1.0.1/16` is rejected rather than silently truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpCidr {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl IpCidr {
    /// Creates a CIDR block from a network address and prefix length.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length exceeds 32 or the address has
    /// bits set outside the network prefix.
    pub fn new(network: Ipv4Addr, prefix_len: u8) -> Result<Self> {
        if prefix_len > 32 {
            return Err(Error::InvalidCidr {
                message: format!("prefix length {prefix_len} exceeds 32"),
            });
        }
        let mask = prefix_mask(prefix_len);
        let addr = u32::from(network);
        if addr & !mask != 0 {
            return Err(Error::InvalidCidr {
                message: format!(
                    "'{network}/{prefix_len}' is not a network address (host bits set)"
                ),
            });
        }
        Ok(Self {
            network,
            prefix_len,
        })
    }

    /// The block that matches every IPv4 address (`0.0.0.0/0`).
    #[must_use]
    pub const fn unrestricted() -> Self {
        Self {
            network: Ipv4Addr::UNSPECIFIED,
            prefix_len: 0,
        }
    }

    /// Returns the network address.
    #[must_use]
    pub const fn network(&self) -> Ipv4Addr {
        self.network
    }

    /// Returns the prefix length.
    #[must_use]
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns true if the block matches every address.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.prefix_len == 0
    }

    /// Returns true if the address falls within this block.
    #[must_use]
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let mask = prefix_mask(self.prefix_len);
        u32::from(addr) & mask == u32::from(self.network)
    }
}

fn prefix_mask(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix_len))
    }
}

impl fmt::Display for IpCidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

impl FromStr for IpCidr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, len) = s.split_once('/').ok_or_else(|| Error::InvalidCidr {
            message: format!("'{s}' is missing a '/prefix' suffix"),
        })?;
        let network = addr.parse::<Ipv4Addr>().map_err(|e| Error::InvalidCidr {
            message: format!("'{s}' has an invalid address: {e}"),
        })?;
        let prefix_len = len.parse::<u8>().map_err(|e| Error::InvalidCidr {
            message: format!("'{s}' has an invalid prefix length: {e}"),
        })?;
        Self::new(network, prefix_len)
    }
}

impl Serialize for IpCidr {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IpCidr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_blocks() -> Result<()> {
        let vpc: IpCidr = "10.1.0.0/16".parse()?;
        assert_eq!(vpc.network(), Ipv4Addr::new(10, 1, 0, 0));
        assert_eq!(vpc.prefix_len(), 16);
        assert_eq!(vpc.to_string(), "10.1.0.0/16");
        Ok(())
    }

    #[test]
    fn rejects_host_bits() {
        assert!("10.1.0.1/16".parse::<IpCidr>().is_err());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!("10.1.0.0".parse::<IpCidr>().is_err());
        assert!("10.1.0.0/33".parse::<IpCidr>().is_err());
        assert!("not-an-address/8".parse::<IpCidr>().is_err());
        assert!("10.1.0.0/-1".parse::<IpCidr>().is_err());
    }

    #[test]
    fn unrestricted_matches_everything() {
        let open = IpCidr::unrestricted();
        assert!(open.is_unrestricted());
        assert!(open.contains(Ipv4Addr::new(203, 0, 113, 9)));
        assert_eq!(open.to_string(), "0.0.0.0/0");
    }

    #[test]
    fn containment() -> Result<()> {
        let block: IpCidr = "192.168.4.0/24".parse()?;
        assert!(block.contains(Ipv4Addr::new(192, 168, 4, 200)));
        assert!(!block.contains(Ipv4Addr::new(192, 168, 5, 1)));
        assert!(!block.is_unrestricted());
        Ok(())
    }

    #[test]
    fn serde_roundtrip() -> Result<()> {
        let block: IpCidr = "10.1.0.0/16".parse()?;
        let json = serde_json::to_string(&block).unwrap();
        assert_eq!(json, "\"10.1.0.0/16\"");
        let back: IpCidr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, block);
        Ok(())
    }
}
