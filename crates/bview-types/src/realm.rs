//! BST realms and the per-realm tracking mask.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical grouping of buffer counters.
///
/// The numeric value is the realm id; its bit in [`TrackingMask`] is
/// `1 << id`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Realm {
    Device = 1,
    EgressPortServicePool = 2,
    EgressServicePool = 3,
    EgressUcQueue = 4,
    EgressUcQueueGroup = 5,
    EgressMcQueue = 6,
    EgressCpuQueue = 7,
    EgressRqeQueue = 8,
    IngressPortPriorityGroup = 9,
    IngressPortServicePool = 10,
    IngressServicePool = 11,
}

impl Realm {
    /// Every realm in id order.
    pub const ALL: [Realm; 11] = [
        Realm::Device,
        Realm::EgressPortServicePool,
        Realm::EgressServicePool,
        Realm::EgressUcQueue,
        Realm::EgressUcQueueGroup,
        Realm::EgressMcQueue,
        Realm::EgressCpuQueue,
        Realm::EgressRqeQueue,
        Realm::IngressPortPriorityGroup,
        Realm::IngressPortServicePool,
        Realm::IngressServicePool,
    ];

    /// Returns the realm id.
    pub const fn id(&self) -> u8 {
        *self as u8
    }

    /// Returns the realm for an id.
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.id() == id)
    }

    /// Returns the name used in database row keys.
    pub const fn name(&self) -> &'static str {
        match self {
            Realm::Device => "device",
            Realm::EgressPortServicePool => "egress-port-service-pool",
            Realm::EgressServicePool => "egress-service-pool",
            Realm::EgressUcQueue => "egress-uc-queue",
            Realm::EgressUcQueueGroup => "egress-uc-queue-group",
            Realm::EgressMcQueue => "egress-mc-queue",
            Realm::EgressCpuQueue => "egress-cpu-queue",
            Realm::EgressRqeQueue => "egress-rqe-queue",
            Realm::IngressPortPriorityGroup => "ingress-port-priority-group",
            Realm::IngressPortServicePool => "ingress-port-service-pool",
            Realm::IngressServicePool => "ingress-service-pool",
        }
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Realm {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.name() == s)
            .ok_or_else(|| ParseError::InvalidRealm(s.to_string()))
    }
}

/// Bitset of realms with counter collection enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TrackingMask(u32);

impl TrackingMask {
    /// Creates an empty mask.
    pub const fn empty() -> Self {
        TrackingMask(0)
    }

    /// Creates a mask from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        TrackingMask(bits)
    }

    /// Creates a mask with every realm set.
    pub fn all() -> Self {
        Realm::ALL.iter().fold(Self::empty(), |m, r| m.with(*r))
    }

    /// Returns the raw bits.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Sets the realm bit.
    pub fn enable(&mut self, realm: Realm) {
        self.0 |= 1 << realm.id();
    }

    /// Clears the realm bit.
    pub fn disable(&mut self, realm: Realm) {
        self.0 &= !(1 << realm.id());
    }

    /// Returns a copy with the realm bit set.
    pub fn with(mut self, realm: Realm) -> Self {
        self.enable(realm);
        self
    }

    /// Returns true if the realm bit is set.
    pub const fn is_enabled(&self, realm: Realm) -> bool {
        self.0 & (1 << realm.id()) != 0
    }

    /// Returns true if no realm is set.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns the union of two masks.
    pub const fn union(self, other: TrackingMask) -> Self {
        TrackingMask(self.0 | other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realm_ids_are_stable() {
        assert_eq!(Realm::Device.id(), 1);
        assert_eq!(Realm::EgressRqeQueue.id(), 8);
        assert_eq!(Realm::IngressServicePool.id(), 11);
        for (i, realm) in Realm::ALL.iter().enumerate() {
            assert_eq!(realm.id() as usize, i + 1);
            assert_eq!(Realm::from_id(realm.id()), Some(*realm));
        }
        assert_eq!(Realm::from_id(0), None);
        assert_eq!(Realm::from_id(12), None);
    }

    #[test]
    fn test_realm_names_round_trip() {
        for realm in Realm::ALL {
            assert_eq!(realm.name().parse::<Realm>().unwrap(), realm);
        }
        assert!("egress-queue".parse::<Realm>().is_err());
    }

    #[test]
    fn test_tracking_mask_bits() {
        let mut mask = TrackingMask::empty();
        mask.enable(Realm::IngressPortPriorityGroup);
        assert_eq!(mask.bits(), 1 << 9);
        assert!(mask.is_enabled(Realm::IngressPortPriorityGroup));
        assert!(!mask.is_enabled(Realm::Device));
        mask.disable(Realm::IngressPortPriorityGroup);
        assert!(mask.is_empty());
    }

    #[test]
    fn test_tracking_mask_all() {
        let all = TrackingMask::all();
        assert!(Realm::ALL.iter().all(|r| all.is_enabled(*r)));
        assert_eq!(all.bits() & 1, 0);
    }
}
