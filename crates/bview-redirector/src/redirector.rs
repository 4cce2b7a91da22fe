//! Fixed-capacity plugin registry and feature resolution.

use crate::feature::{BstFeature, SystemFeature};
use crate::plugin::{FeatureTable, Plugin};
use bview_types::{
    AsicCapabilities, AsicType, BviewError, FeatureId, Result, MAX_ASICS,
    MAX_FEATURES_PER_PLUGIN,
};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Number of plugin slots in a default registry.
pub const MAX_PLUGINS: usize = 8;

/// Registry of south-bound plugins.
///
/// Slots are filled in order and never released. Resolution prefers a
/// feature whose mask names the requested ASIC type over one registered
/// with [`AsicType::ALL`].
///
/// The registry lock is only held while resolving; the returned
/// implementation is cloned out so callers never hold it across an
/// `await` or while taking a feature's own locks.
pub struct Redirector {
    slots: RwLock<Vec<Option<Plugin>>>,
}

impl Redirector {
    pub fn new() -> Self {
        Self::with_capacity(MAX_PLUGINS)
    }

    /// Creates a registry with `capacity` plugin slots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: RwLock::new(vec![None; capacity]),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Option<Plugin>>>> {
        self.slots
            .read()
            .map_err(|_| BviewError::failure("plugin registry lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Option<Plugin>>>> {
        self.slots
            .write()
            .map_err(|_| BviewError::failure("plugin registry lock poisoned"))
    }

    /// Stores a plugin in the first free slot and returns the slot index.
    pub fn register(&self, plugin: Plugin) -> Result<usize> {
        if plugin.features.len() > MAX_FEATURES_PER_PLUGIN {
            return Err(BviewError::invalid_parameter(format!(
                "plugin {} has {} features, at most {} allowed",
                plugin.name,
                plugin.features.len(),
                MAX_FEATURES_PER_PLUGIN
            )));
        }

        for descriptor in &plugin.features {
            if let FeatureTable::System(system) = &descriptor.table {
                let num_asics = system.asics().len();
                if num_asics > MAX_ASICS {
                    return Err(BviewError::invalid_parameter(format!(
                        "plugin {} reports {} ASICs, at most {} allowed",
                        plugin.name, num_asics, MAX_ASICS
                    )));
                }
            }
        }

        let mut slots = self.write()?;
        let slot = slots
            .iter()
            .position(Option::is_none)
            .ok_or_else(|| BviewError::table_full("plugin registry"))?;

        info!(
            plugin = %plugin.name,
            slot,
            features = plugin.features.len(),
            "Registered plugin"
        );
        slots[slot] = Some(plugin);
        Ok(slot)
    }

    /// Names of the registered plugins in slot order.
    pub fn plugin_names(&self) -> Result<Vec<String>> {
        Ok(self.read()?.iter().flatten().map(|p| p.name.clone()).collect())
    }

    /// Finds the implementation of `feature` for `asic_type`.
    pub fn resolve(&self, asic_type: AsicType, feature: FeatureId) -> Result<FeatureTable> {
        if asic_type.is_empty() {
            return Err(BviewError::invalid_parameter(format!(
                "{} lookup with an empty ASIC type",
                feature
            )));
        }
        let slots = self.read()?;
        let mut fallback: Option<&FeatureTable> = None;

        for descriptor in slots
            .iter()
            .flatten()
            .flat_map(|p| p.features.iter())
            .filter(|d| d.feature_id() == feature)
        {
            if descriptor.supported_asics.is_all() {
                if fallback.is_none() {
                    fallback = Some(&descriptor.table);
                }
            } else if descriptor.supported_asics.contains(asic_type) {
                return Ok(descriptor.table.clone());
            }
        }

        match fallback {
            Some(table) => Ok(table.clone()),
            None => {
                debug!(%asic_type, %feature, "No feature implementation registered");
                Err(BviewError::not_found(format!(
                    "{} feature for ASIC type {}",
                    feature, asic_type
                )))
            }
        }
    }

    /// Resolves the BST feature for an ASIC type.
    pub fn bst_feature(&self, asic_type: AsicType) -> Result<Arc<dyn BstFeature>> {
        match self.resolve(asic_type, FeatureId::Bst)? {
            FeatureTable::Bst(bst) => Ok(bst),
            other => Err(BviewError::failure(format!(
                "BST lookup resolved to {:?}",
                other
            ))),
        }
    }

    /// Resolves the System feature for an ASIC type.
    pub fn system_feature(&self, asic_type: AsicType) -> Result<Arc<dyn SystemFeature>> {
        match self.resolve(asic_type, FeatureId::System)? {
            FeatureTable::System(system) => Ok(system),
            other => Err(BviewError::failure(format!(
                "System lookup resolved to {:?}",
                other
            ))),
        }
    }

    /// Returns the scaling parameters of an ASIC type.
    pub fn asic_capabilities(&self, asic_type: AsicType) -> Result<AsicCapabilities> {
        self.system_feature(asic_type)?
            .asics()
            .into_iter()
            .find(|asic| asic.asic_type == asic_type)
            .map(|asic| asic.capabilities)
            .ok_or_else(|| BviewError::not_found(format!("capabilities of ASIC type {}", asic_type)))
    }
}

impl Default for Redirector {
    fn default() -> Self {
        Self::new()
    }
}
