//! Node and network identifiers.
//!
//! Both are compact newtypes that are cheap to copy, compare and hash, and
//! print in the fixed-width hex form operators expect.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// 40-bit node address assigned by the network stack.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Node addresses only use the low 40 bits.
    pub const MASK: u64 = 0xff_ffff_ffff;

    pub fn new(raw: u64) -> Self {
        Self(raw & Self::MASK)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:010x}", self.0)
    }
}

/// 64-bit virtual network identifier.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NetworkId(pub u64);

impl NetworkId {
    /// The public "Earth" network joined when no override is given.
    pub const EARTH: NetworkId = NetworkId(0x8056_c2e2_1c00_0001);
}

impl Default for NetworkId {
    fn default() -> Self {
        Self::EARTH
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for NetworkId {
    type Err = Error;

    /// Parses a hex network id, with or without a `0x` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.is_empty() || digits.len() > 16 {
            return Err(Error::InvalidNetworkId(s.to_string()));
        }
        u64::from_str_radix(digits, 16)
            .map(NetworkId)
            .map_err(|_| Error::InvalidNetworkId(s.to_string()))
    }
}
