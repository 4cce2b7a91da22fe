//! Common BroadView types for buffer instrumentation.
//!
//! This crate provides the vocabulary shared by the redirector and every
//! south-bound plugin:
//!
//! - [`BviewError`] / [`BviewStatus`]: error taxonomy and numeric status codes
//! - [`AsicType`], [`Asic`], [`AsicCapabilities`]: silicon identity and scaling
//! - [`FeatureId`], [`FeatureMask`]: south-bound feature identifiers
//! - [`Realm`], [`TrackingMask`]: BST counter groupings
//! - [`BstConfig`], [`BstEvent`], [`BstSnapshot`], [`BstThreshold`]: BST data
//! - [`MacAddress`]: management interface identity

mod asic;
mod bst;
mod error;
mod feature;
mod mac;
mod realm;

pub use asic::{Asic, AsicCapabilities, AsicType, MAX_ASICS, MAX_PORTS};
pub use bst::{
    BstConfig, BstEvent, BstSnapshot, BstThreshold, ConfigChange, EgressPortSpCounters,
    EgressSpCounters, PortPgCounters, QueueCounter, RealmData, Timestamped, TrackingMode,
    TriggerInfo, DEFAULT_MAX_TRIGGERS,
};
pub use error::{BviewError, BviewStatus, Result};
pub use feature::{FeatureId, FeatureMask, MAX_FEATURES, MAX_FEATURES_PER_PLUGIN};
pub use mac::MacAddress;
pub use realm::{Realm, TrackingMask};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid ASIC type: {0}")]
    InvalidAsicType(String),

    #[error("invalid feature: {0}")]
    InvalidFeature(String),

    #[error("invalid realm: {0}")]
    InvalidRealm(String),

    #[error("invalid tracking mode: {0}")]
    InvalidTrackingMode(String),

    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),
}

impl From<ParseError> for BviewError {
    fn from(e: ParseError) -> Self {
        BviewError::invalid_parameter(e.to_string())
    }
}
