//! ASIC type masks and scaling capabilities.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum number of front-panel ports on one ASIC.
pub const MAX_PORTS: usize = 130;

/// Maximum number of ASICs on one platform.
pub const MAX_ASICS: usize = 1;

/// Bitmask of silicon families.
///
/// A feature advertises the families it supports with a mask; a query
/// names a single family. [`AsicType::ALL`] is the wildcard mask used by
/// generic implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AsicType(u32);

impl AsicType {
    /// Trident2.
    pub const TD2: AsicType = AsicType(1 << 0);
    /// Tomahawk.
    pub const TH: AsicType = AsicType(1 << 1);
    /// Wildcard matching every family.
    pub const ALL: AsicType = AsicType(0xFFFF);

    /// Creates a mask from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        AsicType(bits)
    }

    /// Returns the raw bits.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns true if this is the wildcard mask.
    pub const fn is_all(&self) -> bool {
        self.0 == Self::ALL.0
    }

    /// Returns true if no family bit is set.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if every bit of `other` is set in this mask.
    pub const fn contains(&self, other: AsicType) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of two masks.
    pub const fn union(self, other: AsicType) -> Self {
        AsicType(self.0 | other.0)
    }
}

impl fmt::Display for AsicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            AsicType::TD2 => write!(f, "td2"),
            AsicType::TH => write!(f, "th"),
            AsicType::ALL => write!(f, "all"),
            AsicType(bits) => write!(f, "{:#06x}", bits),
        }
    }
}

impl FromStr for AsicType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "td2" | "trident2" => Ok(AsicType::TD2),
            "th" | "tomahawk" => Ok(AsicType::TH),
            "all" => Ok(AsicType::ALL),
            other => other
                .strip_prefix("0x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .map(AsicType)
                .ok_or_else(|| ParseError::InvalidAsicType(s.to_string())),
        }
    }
}

impl TryFrom<String> for AsicType {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AsicType> for String {
    fn from(t: AsicType) -> String {
        t.to_string()
    }
}

/// Scaling parameters of one ASIC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AsicCapabilities {
    pub num_ports: usize,
    pub num_unicast_queues: usize,
    pub num_unicast_queue_groups: usize,
    pub num_multicast_queues: usize,
    pub num_service_pools: usize,
    pub num_common_pools: usize,
    pub num_cpu_queues: usize,
    pub num_rqe_queues: usize,
    pub num_rqe_queue_pools: usize,
    pub num_priority_groups: usize,
    pub support_1588: bool,
    /// Bytes per buffer cell.
    pub cell_to_byte: u32,
}

impl AsicCapabilities {
    /// Trident2 scaling parameters for the given port count.
    pub fn trident2(num_ports: usize) -> Self {
        Self {
            num_ports,
            num_unicast_queues: 2960,
            num_unicast_queue_groups: 128,
            num_multicast_queues: 1040,
            num_service_pools: 4,
            num_common_pools: 1,
            num_cpu_queues: 8,
            num_rqe_queues: 11,
            num_rqe_queue_pools: 4,
            num_priority_groups: 8,
            support_1588: true,
            cell_to_byte: 208,
        }
    }
}

/// One ASIC as reported by a System feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asic {
    /// Unit number used to address the ASIC in every other call.
    pub unit: u32,
    pub asic_type: AsicType,
    pub capabilities: AsicCapabilities,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asic_type_contains() {
        let mask = AsicType::TD2.union(AsicType::TH);
        assert!(mask.contains(AsicType::TD2));
        assert!(mask.contains(AsicType::TH));
        assert!(!AsicType::TD2.contains(AsicType::TH));
        assert!(AsicType::ALL.contains(AsicType::TH));
        assert!(AsicType::ALL.is_all());
        assert!(!mask.is_all());
    }

    #[test]
    fn test_asic_type_parse() {
        assert_eq!("td2".parse::<AsicType>().unwrap(), AsicType::TD2);
        assert_eq!("Tomahawk".parse::<AsicType>().unwrap(), AsicType::TH);
        assert_eq!("0x0004".parse::<AsicType>().unwrap().bits(), 4);
        assert!("jericho".parse::<AsicType>().is_err());
    }

    #[test]
    fn test_asic_type_display() {
        assert_eq!(AsicType::TD2.to_string(), "td2");
        assert_eq!(AsicType::ALL.to_string(), "all");
        assert_eq!(AsicType::from_bits(4).to_string(), "0x0004");
    }

    #[test]
    fn test_trident2_capabilities() {
        let caps = AsicCapabilities::trident2(64);
        assert_eq!(caps.num_ports, 64);
        assert_eq!(caps.num_priority_groups, 8);
        assert_eq!(caps.cell_to_byte, 208);
    }
}
