//! BST forwarding API.
//!
//! Each call maps the unit to its ASIC type, resolves the BST feature for
//! that type and forwards. A unit without a backend yields `NotFound`
//! rather than zeroed data.

use crate::feature::BstFeature;
use crate::redirector::Redirector;
use bview_types::{
    BstConfig, BstEvent, BstSnapshot, BstThreshold, Realm, RealmData, Result, Timestamped,
};
use std::sync::Arc;
use tokio::sync::broadcast;

impl Redirector {
    fn bst_for_unit(&self, unit: u32) -> Result<Arc<dyn BstFeature>> {
        let asic_type = self.unit_asic_type(unit)?;
        self.bst_feature(asic_type)
    }

    pub async fn bst_config_set(&self, unit: u32, config: &BstConfig) -> Result<()> {
        self.bst_for_unit(unit)?.config_set(unit, config).await
    }

    pub async fn bst_config_get(&self, unit: u32) -> Result<BstConfig> {
        self.bst_for_unit(unit)?.config_get(unit).await
    }

    /// Returns every counter of a unit.
    pub async fn bst_snapshot_get(&self, unit: u32) -> Result<Timestamped<BstSnapshot>> {
        self.bst_for_unit(unit)?.snapshot_get(unit).await
    }

    pub async fn bst_realm_data_get(
        &self,
        unit: u32,
        realm: Realm,
    ) -> Result<Timestamped<RealmData>> {
        self.bst_for_unit(unit)?.realm_data_get(unit, realm).await
    }

    pub async fn bst_threshold_set(&self, unit: u32, threshold: &BstThreshold) -> Result<()> {
        self.bst_for_unit(unit)?
            .threshold_set(unit, threshold)
            .await
    }

    pub async fn bst_threshold_get(&self, unit: u32) -> Result<Timestamped<BstSnapshot>> {
        self.bst_for_unit(unit)?.threshold_get(unit).await
    }

    pub async fn bst_clear_stats(&self, unit: u32) -> Result<()> {
        self.bst_for_unit(unit)?.clear_stats(unit).await
    }

    pub async fn bst_clear_thresholds(&self, unit: u32) -> Result<()> {
        self.bst_for_unit(unit)?.clear_thresholds(unit).await
    }

    /// Subscribes to trigger and configuration-change events of a unit's
    /// backend.
    pub fn bst_register_trigger(&self, unit: u32) -> Result<broadcast::Receiver<BstEvent>> {
        self.bst_for_unit(unit)?.register_trigger(unit)
    }
}

#[cfg(test)]
mod tests {
    use crate::plugin::{FeatureDescriptor, Plugin};
    use crate::redirector::tests::{FakeSystem, TaggedBst};
    use crate::redirector::Redirector;
    use bview_types::{AsicType, BstConfig, BviewError, Realm};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn redirector() -> Redirector {
        let redirector = Redirector::new();
        redirector
            .register(
                Plugin::new("platform")
                    .with_feature(FeatureDescriptor::system(
                        AsicType::ALL,
                        FakeSystem::single(AsicType::TD2, 32),
                    ))
                    .with_feature(FeatureDescriptor::bst(
                        AsicType::TD2.union(AsicType::TH),
                        Arc::new(TaggedBst(42)),
                    )),
            )
            .unwrap();
        redirector
    }

    #[tokio::test]
    async fn test_forwards_to_unit_backend() {
        let redirector = redirector();
        let config = redirector.bst_config_get(0).await.unwrap();
        assert_eq!(config.collection_interval_secs, 42);
    }

    #[tokio::test]
    async fn test_missing_slot_is_unsupported() {
        let redirector = redirector();
        let err = redirector
            .bst_config_set(0, &BstConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BviewError::Unsupported { .. }));

        let err = redirector
            .bst_realm_data_get(0, Realm::EgressCpuQueue)
            .await
            .unwrap_err();
        assert!(matches!(err, BviewError::Unsupported { .. }));
        assert!(redirector.bst_register_trigger(0).is_err());
    }

    #[tokio::test]
    async fn test_unknown_unit() {
        let redirector = redirector();
        let err = redirector.bst_clear_stats(5).await.unwrap_err();
        assert!(matches!(err, BviewError::NotFound { .. }));
    }
}
