//! OVSDB plugin composition root.

use crate::bst_feature::OvsdbBstFeature;
use crate::cache::BstCache;
use crate::commit::CommitPath;
use crate::config::BviewConfig;
use crate::monitor::{ConfigRowHandle, SyncEngine, SyncHandle};
use crate::system_feature::{discover_num_ports, OvsdbSystemFeature};
use bview_redirector::{FeatureDescriptor, Plugin, SystemFeature};
use bview_types::{AsicType, BstEvent, Result};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Name the plugin registers under.
pub const PLUGIN_NAME: &str = "ovsdb";

/// Depth of the event channel before slow subscribers start lagging.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// A started OVSDB backend.
pub struct OvsdbPlugin {
    plugin: Plugin,
    sync: SyncHandle,
    cache: Arc<BstCache>,
    events: broadcast::Sender<BstEvent>,
}

impl OvsdbPlugin {
    /// Connects to the database and waits for the initial snapshot.
    ///
    /// # Steps
    ///
    /// 1. Determine the port count from the config or by discovery
    /// 2. Build the cache, event channel and commit path
    /// 3. Spawn the sync engine and wait for the first configuration data
    /// 4. Assemble the System (all ASIC types) and BST (TD2 | TH) features
    pub async fn start(config: &BviewConfig) -> Result<Self> {
        config.validate()?;
        let endpoint = config.endpoint()?;
        let asic_type = config.asic_type()?;
        let database = config.ovsdb.database.clone();

        let num_ports = match config.system.num_ports {
            Some(ports) => ports,
            None => {
                discover_num_ports(
                    &endpoint,
                    &database,
                    config.reply_timeout(),
                    config.discovery_retry(),
                    config.init_timeout(),
                    config.max_message_bytes(),
                )
                .await?
            }
        };
        info!(%endpoint, %asic_type, num_ports, "Starting OVSDB plugin");

        let system = Arc::new(OvsdbSystemFeature::new(
            config.system.management_interface.clone(),
            asic_type,
            num_ports,
        ));
        let asics = system.asics();

        let cache = Arc::new(BstCache::new(asics.len()));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let config_row = ConfigRowHandle::default();
        let commit = Arc::new(CommitPath::new(
            endpoint.clone(),
            database.clone(),
            config.reply_timeout(),
            config_row.clone(),
        )
        .with_max_line_length(config.max_message_bytes()));

        let mut sync = SyncEngine::spawn(
            endpoint,
            database,
            Arc::clone(&cache),
            events.clone(),
            config_row,
            config.max_message_bytes(),
        );
        if let Err(e) = sync.wait_initialized(config.init_timeout()).await {
            error!(error = %e, "OVSDB plugin failed to initialize");
            sync.shutdown();
            return Err(e);
        }

        let bst = Arc::new(OvsdbBstFeature::new(
            asics,
            Arc::clone(&cache),
            commit,
            events.clone(),
        ));
        let plugin = Plugin::new(PLUGIN_NAME)
            .with_feature(FeatureDescriptor::system(AsicType::ALL, system))
            .with_feature(FeatureDescriptor::bst(AsicType::TD2.union(AsicType::TH), bst));

        info!("OVSDB plugin initialized");
        Ok(Self {
            plugin,
            sync,
            cache,
            events,
        })
    }

    /// Feature list to hand to the redirector.
    pub fn plugin(&self) -> Plugin {
        self.plugin.clone()
    }

    pub fn cache(&self) -> &Arc<BstCache> {
        &self.cache
    }

    pub fn sync(&self) -> &SyncHandle {
        &self.sync
    }

    /// Receives every trigger and configuration change of all units.
    pub fn subscribe(&self) -> broadcast::Receiver<BstEvent> {
        self.events.subscribe()
    }

    pub fn shutdown(&self) {
        self.sync.shutdown();
    }

    /// Waits for the sync engine to stop.
    pub async fn join(self) -> Result<()> {
        self.sync.join().await
    }
}
