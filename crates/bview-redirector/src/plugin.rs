//! Plugin and feature descriptors.

use crate::feature::{BstFeature, SystemFeature};
use bview_types::{AsicType, FeatureId};
use std::fmt;
use std::sync::Arc;

/// Implementation behind one feature.
#[derive(Clone)]
pub enum FeatureTable {
    System(Arc<dyn SystemFeature>),
    Bst(Arc<dyn BstFeature>),
}

impl FeatureTable {
    /// Returns the feature this table implements.
    pub fn feature_id(&self) -> FeatureId {
        match self {
            FeatureTable::System(_) => FeatureId::System,
            FeatureTable::Bst(_) => FeatureId::Bst,
        }
    }
}

impl fmt::Debug for FeatureTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FeatureTable({})", self.feature_id())
    }
}

/// One feature offered by a plugin, tagged with the ASIC families it serves.
#[derive(Debug, Clone)]
pub struct FeatureDescriptor {
    /// Families this implementation supports; [`AsicType::ALL`] marks a
    /// generic fallback.
    pub supported_asics: AsicType,
    pub table: FeatureTable,
}

impl FeatureDescriptor {
    pub fn system(supported_asics: AsicType, feature: Arc<dyn SystemFeature>) -> Self {
        Self {
            supported_asics,
            table: FeatureTable::System(feature),
        }
    }

    pub fn bst(supported_asics: AsicType, feature: Arc<dyn BstFeature>) -> Self {
        Self {
            supported_asics,
            table: FeatureTable::Bst(feature),
        }
    }

    pub fn feature_id(&self) -> FeatureId {
        self.table.feature_id()
    }
}

/// A south-bound plugin: a named, immutable list of features.
#[derive(Debug, Clone)]
pub struct Plugin {
    pub name: String,
    pub features: Vec<FeatureDescriptor>,
}

impl Plugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: Vec::new(),
        }
    }

    /// Adds a feature to the plugin.
    pub fn with_feature(mut self, feature: FeatureDescriptor) -> Self {
        self.features.push(feature);
        self
    }
}
