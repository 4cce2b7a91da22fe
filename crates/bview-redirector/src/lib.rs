//! South-bound feature redirector for BroadView.
//!
//! This crate decouples the agent's request handlers from the silicon
//! backends that serve them:
//!
//! - [`BstFeature`]: Buffer Statistics Tracking operations
//! - [`SystemFeature`]: platform identity and ASIC capabilities
//! - [`Plugin`] / [`FeatureDescriptor`]: what a backend registers
//! - [`Redirector`]: fixed-capacity registry and public forwarding API
//!
//! # Architecture
//!
//! 1. A plugin starts its backend and builds a [`Plugin`] listing its
//!    features, each tagged with the ASIC families it supports
//! 2. The composition root registers the plugin with a [`Redirector`]
//! 3. A request names an ASIC unit; the redirector maps it to an ASIC type
//!    through the System feature
//! 4. The BST or System feature for that type is resolved, preferring an
//!    exact family match over an [`AsicType::ALL`](bview_types::AsicType::ALL)
//!    fallback
//! 5. The call is forwarded; unimplemented operations return `Unsupported`

mod api;
mod feature;
mod plugin;
mod redirector;

pub use feature::{BstFeature, SystemFeature};
pub use plugin::{FeatureDescriptor, FeatureTable, Plugin};
pub use redirector::{Redirector, MAX_PLUGINS};
