//! Feature identifiers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum number of features known to the agent.
pub const MAX_FEATURES: usize = 16;

/// Maximum number of features one plugin may carry.
pub const MAX_FEATURES_PER_PLUGIN: usize = MAX_FEATURES + 1;

/// Identifier of a south-bound feature.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureId {
    System = 1 << 0,
    Bst = 1 << 1,
    PacketTrace = 1 << 2,
}

impl FeatureId {
    /// Returns the bit used for this feature in a [`FeatureMask`].
    pub const fn bit(&self) -> u32 {
        *self as u32
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FeatureId::System => "system",
            FeatureId::Bst => "bst",
            FeatureId::PacketTrace => "packet-trace",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for FeatureId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(FeatureId::System),
            "bst" => Ok(FeatureId::Bst),
            "packet-trace" => Ok(FeatureId::PacketTrace),
            _ => Err(ParseError::InvalidFeature(s.to_string())),
        }
    }
}

/// Set of features supported by a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureMask(u32);

impl FeatureMask {
    /// Creates an empty mask.
    pub const fn empty() -> Self {
        FeatureMask(0)
    }

    /// Returns the raw bits.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Adds a feature.
    pub fn enable(&mut self, feature: FeatureId) {
        self.0 |= feature.bit();
    }

    /// Returns a copy with the feature added.
    pub fn with(mut self, feature: FeatureId) -> Self {
        self.enable(feature);
        self
    }

    /// Returns true if the feature is present.
    pub const fn is_enabled(&self, feature: FeatureId) -> bool {
        self.0 & feature.bit() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_mask() {
        let mask = FeatureMask::empty()
            .with(FeatureId::System)
            .with(FeatureId::Bst);
        assert!(mask.is_enabled(FeatureId::System));
        assert!(mask.is_enabled(FeatureId::Bst));
        assert!(!mask.is_enabled(FeatureId::PacketTrace));
        assert_eq!(mask.bits(), 0b11);
    }

    #[test]
    fn test_feature_id_parse() {
        assert_eq!("BST".parse::<FeatureId>().unwrap(), FeatureId::Bst);
        assert_eq!(FeatureId::PacketTrace.to_string(), "packet-trace");
        assert!("sflow".parse::<FeatureId>().is_err());
    }
}
