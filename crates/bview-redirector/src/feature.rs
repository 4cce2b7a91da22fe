//! South-bound feature traits.
//!
//! A plugin implements one trait per feature it offers. Every method has a
//! default body returning [`BviewError::Unsupported`], so an implementation
//! only overrides what its silicon backend can do and callers can tell
//! "no such operation" apart from "operation failed".

use async_trait::async_trait;
use bview_types::{
    Asic, BstConfig, BstEvent, BstSnapshot, BstThreshold, BviewError, FeatureMask, MacAddress,
    Realm, RealmData, Result, Timestamped,
};
use chrono::{DateTime, Utc};
use std::net::Ipv4Addr;
use tokio::sync::broadcast;

/// Buffer Statistics Tracking operations for one family of ASICs.
///
/// # Thread Safety
///
/// Implementations are shared as `Arc<dyn BstFeature>` between request
/// handlers, so they must be `Send + Sync` and do their own locking.
#[async_trait]
pub trait BstFeature: Send + Sync {
    /// Applies a BST configuration to the ASIC.
    async fn config_set(&self, _asic: u32, _config: &BstConfig) -> Result<()> {
        Err(BviewError::unsupported("bst config set"))
    }

    /// Returns the current BST configuration.
    async fn config_get(&self, _asic: u32) -> Result<BstConfig> {
        Err(BviewError::unsupported("bst config get"))
    }

    /// Returns statistics of every realm.
    async fn snapshot_get(&self, _asic: u32) -> Result<Timestamped<BstSnapshot>> {
        Err(BviewError::unsupported("bst snapshot get"))
    }

    /// Returns statistics of a single realm.
    async fn realm_data_get(&self, _asic: u32, realm: Realm) -> Result<Timestamped<RealmData>> {
        Err(BviewError::unsupported(format!("bst {} data get", realm)))
    }

    /// Programs a threshold.
    async fn threshold_set(&self, _asic: u32, threshold: &BstThreshold) -> Result<()> {
        Err(BviewError::unsupported(format!(
            "bst {} threshold set",
            threshold.realm()
        )))
    }

    /// Returns the configured thresholds of every realm.
    async fn threshold_get(&self, _asic: u32) -> Result<Timestamped<BstSnapshot>> {
        Err(BviewError::unsupported("bst threshold get"))
    }

    /// Resets all statistics.
    async fn clear_stats(&self, _asic: u32) -> Result<()> {
        Err(BviewError::unsupported("bst clear stats"))
    }

    /// Restores all thresholds to their defaults.
    async fn clear_thresholds(&self, _asic: u32) -> Result<()> {
        Err(BviewError::unsupported("bst clear thresholds"))
    }

    /// Subscribes to trigger and configuration-change events.
    ///
    /// Events for every unit are delivered; receivers filter on
    /// [`BstEvent::asic`].
    fn register_trigger(&self, _asic: u32) -> Result<broadcast::Receiver<BstEvent>> {
        Err(BviewError::unsupported("bst register trigger"))
    }
}

/// Platform identity and capability operations.
///
/// Every implementation must report its ASIC list; the rest is optional.
pub trait SystemFeature: Send + Sync {
    /// ASICs managed by this implementation.
    fn asics(&self) -> Vec<Asic>;

    /// Features available on the platform.
    fn feature_mask(&self) -> FeatureMask {
        FeatureMask::empty()
    }

    fn name(&self) -> Result<String> {
        Err(BviewError::unsupported("system name get"))
    }

    fn mac(&self) -> Result<MacAddress> {
        Err(BviewError::unsupported("system mac get"))
    }

    fn ip4(&self) -> Result<Ipv4Addr> {
        Err(BviewError::unsupported("system ip4 get"))
    }

    fn time(&self) -> Result<DateTime<Utc>> {
        Ok(Utc::now())
    }

    /// Converts an application ASIC identifier to a unit number.
    fn asic_translate_from_notation(&self, _src: &str) -> Result<u32> {
        Err(BviewError::unsupported("asic translate from notation"))
    }

    /// Converts a unit number to its application identifier.
    fn asic_translate_to_notation(&self, _asic: u32) -> Result<String> {
        Err(BviewError::unsupported("asic translate to notation"))
    }

    fn port_translate_from_notation(&self, _src: &str) -> Result<u32> {
        Err(BviewError::unsupported("port translate from notation"))
    }

    fn port_translate_to_notation(&self, _asic: u32, _port: u32) -> Result<String> {
        Err(BviewError::unsupported("port translate to notation"))
    }

    fn lag_translate_to_notation(&self, _asic: u32, _lag: u32) -> Result<String> {
        Err(BviewError::unsupported("lag translate to notation"))
    }

    fn network_os(&self) -> Result<String> {
        Err(BviewError::unsupported("network os get"))
    }

    /// Unique agent identifier.
    fn uid(&self) -> Result<String> {
        Err(BviewError::unsupported("uid get"))
    }

    /// Factory maximum buffer values of every realm.
    fn max_buf_snapshot_get(&self, _asic: u32) -> Result<Timestamped<BstSnapshot>> {
        Err(BviewError::unsupported("max buf snapshot get"))
    }
}
