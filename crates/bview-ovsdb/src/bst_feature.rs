//! OVSDB-backed BST feature.

use crate::bid::{resolve_logical_index, Bid};
use crate::cache::{BstCache, CounterEntry};
use crate::commit::CommitPath;
use crate::snapshot::{build_realm, build_snapshot};
use async_trait::async_trait;
use bview_redirector::BstFeature;
use bview_types::{
    Asic, AsicCapabilities, BstConfig, BstEvent, BstSnapshot, BstThreshold, BviewError, Realm,
    RealmData, Result, Timestamped,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// One counter write derived from a threshold request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdWrite {
    pub bid: Bid,
    pub port: u32,
    pub index: u32,
    pub value: u64,
}

impl ThresholdWrite {
    fn new(bid: Bid, port: u32, index: u32, value: u64) -> Self {
        Self {
            bid,
            port,
            index,
            value,
        }
    }
}

/// Expands a threshold request into the counters it sets.
pub fn threshold_writes(threshold: &BstThreshold) -> Vec<ThresholdWrite> {
    use ThresholdWrite as W;
    match *threshold {
        BstThreshold::Device { threshold } => vec![W::new(Bid::Device, 0, 0, threshold)],
        BstThreshold::IngressPortPriorityGroup {
            port,
            pg,
            um_share,
            um_headroom,
        } => vec![
            W::new(Bid::PriGroupShared, port, pg, um_share),
            W::new(Bid::PriGroupHeadroom, port, pg, um_headroom),
        ],
        BstThreshold::IngressPortServicePool { port, sp, um_share } => {
            vec![W::new(Bid::PortPool, port, sp, um_share)]
        }
        BstThreshold::IngressServicePool { sp, um_share } => {
            vec![W::new(Bid::IngressPool, 0, sp, um_share)]
        }
        BstThreshold::EgressPortServicePool {
            port,
            sp,
            uc_share,
            um_share,
        } => vec![
            W::new(Bid::EgressUcastPortShared, port, sp, uc_share),
            W::new(Bid::EgressPortShared, port, sp, um_share),
        ],
        BstThreshold::EgressServicePool {
            sp,
            um_share,
            mc_share,
        } => vec![
            W::new(Bid::EgressPool, 0, sp, um_share),
            W::new(Bid::EgressMcastPool, 0, sp, mc_share),
        ],
        BstThreshold::EgressUcQueue { queue, uc_buffer } => {
            vec![W::new(Bid::Ucast, 0, queue, uc_buffer)]
        }
        BstThreshold::EgressUcQueueGroup { group, uc_buffer } => {
            vec![W::new(Bid::UcastGroup, 0, group, uc_buffer)]
        }
        BstThreshold::EgressMcQueue { queue, mc_buffer } => {
            vec![W::new(Bid::Mcast, 0, queue, mc_buffer)]
        }
        BstThreshold::EgressCpuQueue { queue, cpu_buffer } => {
            vec![W::new(Bid::CpuQueue, 0, queue, cpu_buffer)]
        }
        BstThreshold::EgressRqeQueue { queue, rqe_buffer } => {
            vec![W::new(Bid::RqeQueue, 0, queue, rqe_buffer)]
        }
    }
}

fn validate_write(caps: &AsicCapabilities, write: &ThresholdWrite) -> Result<()> {
    let d = write.bid.descriptor();
    if write.value == 0 || write.value > d.default_threshold {
        return Err(BviewError::invalid_parameter(format!(
            "{} threshold {} outside 1..={}",
            write.bid, write.value, d.default_threshold
        )));
    }
    if d.double_indexed && (write.port == 0 || write.port as usize > caps.num_ports) {
        return Err(BviewError::invalid_parameter(format!(
            "{} port {} outside 1..={}",
            write.bid, write.port, caps.num_ports
        )));
    }
    resolve_logical_index(write.bid, write.port, write.index)
        .map_err(|e| BviewError::invalid_parameter(e.to_string()))?;
    Ok(())
}

/// BST feature backed by the counter cache and the OVSDB commit path.
pub struct OvsdbBstFeature {
    asics: Vec<Asic>,
    cache: Arc<BstCache>,
    commit: Arc<CommitPath>,
    events: broadcast::Sender<BstEvent>,
}

impl OvsdbBstFeature {
    pub fn new(
        asics: Vec<Asic>,
        cache: Arc<BstCache>,
        commit: Arc<CommitPath>,
        events: broadcast::Sender<BstEvent>,
    ) -> Self {
        Self {
            asics,
            cache,
            commit,
            events,
        }
    }

    fn capabilities(&self, asic: u32) -> Result<&AsicCapabilities> {
        self.asics
            .iter()
            .find(|a| a.unit == asic)
            .map(|a| &a.capabilities)
            .ok_or_else(|| BviewError::invalid_parameter(format!("unknown ASIC unit {}", asic)))
    }

    fn collect(
        &self,
        asic: u32,
        pick: fn(&CounterEntry) -> u64,
    ) -> Result<Timestamped<BstSnapshot>> {
        let caps = self.capabilities(asic)?;
        let snapshot = self.cache.with_unit(asic, |view| {
            build_snapshot(caps, &mut |bid, port, index| {
                view.get(bid, port, index).map(|e| pick(&e))
            })
        })??;
        Ok(Timestamped::now(snapshot))
    }
}

#[async_trait]
impl BstFeature for OvsdbBstFeature {
    async fn config_set(&self, asic: u32, config: &BstConfig) -> Result<()> {
        self.capabilities(asic)?;
        let mut config = *config;
        config.trigger_collection_enabled = true;

        self.commit.commit_config(asic, &config).await?;
        if !config.track_init {
            self.commit.commit_tracking(asic, &config).await?;
        }
        self.cache.set_config(asic, &config)?;
        info!(asic, enabled = config.enabled, "BST configuration applied");
        Ok(())
    }

    async fn config_get(&self, asic: u32) -> Result<BstConfig> {
        self.cache.config(asic)
    }

    async fn snapshot_get(&self, asic: u32) -> Result<Timestamped<BstSnapshot>> {
        self.collect(asic, |e| e.stat)
    }

    async fn realm_data_get(&self, asic: u32, realm: Realm) -> Result<Timestamped<RealmData>> {
        let caps = self.capabilities(asic)?;
        let data = self.cache.with_unit(asic, |view| {
            build_realm(caps, realm, &mut |bid, port, index| {
                view.get(bid, port, index).map(|e| e.stat)
            })
        })??;
        Ok(Timestamped::now(data))
    }

    async fn threshold_set(&self, asic: u32, threshold: &BstThreshold) -> Result<()> {
        let caps = self.capabilities(asic)?;
        let writes = threshold_writes(threshold);
        for write in &writes {
            validate_write(caps, write)?;
        }
        for write in writes {
            self.commit
                .commit_threshold(asic, write.port, write.index, write.bid, write.value)
                .await?;
        }
        debug!(asic, realm = %threshold.realm(), "Threshold set");
        Ok(())
    }

    async fn threshold_get(&self, asic: u32) -> Result<Timestamped<BstSnapshot>> {
        self.collect(asic, |e| e.threshold)
    }

    async fn clear_stats(&self, asic: u32) -> Result<()> {
        self.capabilities(asic)?;
        self.commit.commit_clear_stats(asic).await
    }

    async fn clear_thresholds(&self, asic: u32) -> Result<()> {
        self.capabilities(asic)?;
        self.commit.commit_clear_thresholds(asic).await
    }

    fn register_trigger(&self, asic: u32) -> Result<broadcast::Receiver<BstEvent>> {
        self.capabilities(asic)?;
        Ok(self.events.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonrpc::Endpoint;
    use crate::monitor::ConfigRowHandle;
    use bview_types::AsicType;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::time::Duration;

    fn feature() -> (OvsdbBstFeature, Arc<BstCache>) {
        let cache = Arc::new(BstCache::new(1));
        let commit = Arc::new(CommitPath::new(
            Endpoint::Unix(PathBuf::from("/nonexistent/db.sock")),
            "OpenSwitch",
            Duration::from_secs(1),
            ConfigRowHandle::default(),
        ));
        let (events, _) = broadcast::channel(8);
        let asics = vec![Asic {
            unit: 0,
            asic_type: AsicType::TD2,
            capabilities: AsicCapabilities::trident2(4),
        }];
        (
            OvsdbBstFeature::new(asics, Arc::clone(&cache), commit, events),
            cache,
        )
    }

    #[test]
    fn test_threshold_writes_pairs() {
        let writes = threshold_writes(&BstThreshold::EgressPortServicePool {
            port: 2,
            sp: 1,
            uc_share: 10,
            um_share: 20,
        });
        assert_eq!(
            writes,
            vec![
                ThresholdWrite::new(Bid::EgressUcastPortShared, 2, 1, 10),
                ThresholdWrite::new(Bid::EgressPortShared, 2, 1, 20),
            ]
        );
    }

    #[test]
    fn test_validate_write() {
        let caps = AsicCapabilities::trident2(4);
        let ok = ThresholdWrite::new(Bid::PortPool, 4, 0, 100);
        assert!(validate_write(&caps, &ok).is_ok());

        for bad in [
            ThresholdWrite::new(Bid::PortPool, 4, 0, 0),
            ThresholdWrite::new(Bid::PortPool, 5, 0, 100),
            ThresholdWrite::new(Bid::PortPool, 0, 0, 100),
            ThresholdWrite::new(Bid::PortPool, 1, 5, 100),
            ThresholdWrite::new(Bid::CpuQueue, 0, 8, 100),
            ThresholdWrite::new(
                Bid::Ucast,
                0,
                1,
                Bid::Ucast.descriptor().default_threshold + 1,
            ),
        ] {
            assert!(
                matches!(
                    validate_write(&caps, &bad),
                    Err(BviewError::InvalidParameter { .. })
                ),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[tokio::test]
    async fn test_snapshot_reads_cache() {
        let (feature, cache) = feature();
        let entry = CounterEntry {
            stat: 42,
            threshold: 99,
            enabled: true,
        };
        cache.update_stat(0, Bid::PriGroupShared, 2, 3, false, entry).unwrap();
        cache.update_stat(0, Bid::CpuQueue, 0, 7, false, entry).unwrap();

        let stats = feature.snapshot_get(0).await.unwrap().data;
        assert_eq!(stats.ingress_port_pg[1][3].um_share, 42);
        assert_eq!(stats.egress_cpu_queue[7].buffer_count, 42);

        let thresholds = feature.threshold_get(0).await.unwrap().data;
        assert_eq!(thresholds.ingress_port_pg[1][3].um_share, 99);

        let realm = feature
            .realm_data_get(0, Realm::EgressCpuQueue)
            .await
            .unwrap()
            .data;
        let RealmData::EgressCpuQueue(queues) = realm else {
            panic!("wrong realm");
        };
        assert_eq!(queues[7].buffer_count, 42);
    }

    #[tokio::test]
    async fn test_config_get_applies_trigger_default() {
        let (feature, _) = feature();
        assert_eq!(feature.config_get(0).await.unwrap().max_triggers, 60);
    }

    #[tokio::test]
    async fn test_config_set_without_config_row() {
        let (feature, cache) = feature();
        let config = BstConfig {
            enabled: true,
            ..Default::default()
        };
        let err = feature.config_set(0, &config).await.unwrap_err();
        assert!(matches!(err, BviewError::NotFound { .. }));
        assert!(!cache.config(0).unwrap().enabled);
    }

    #[tokio::test]
    async fn test_unknown_unit_rejected() {
        let (feature, _) = feature();
        assert!(feature.register_trigger(1).is_err());
        assert!(feature.snapshot_get(1).await.is_err());
        let err = feature
            .threshold_set(
                0,
                &BstThreshold::EgressCpuQueue {
                    queue: 9,
                    cpu_buffer: 10,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BviewError::InvalidParameter { .. }));
    }
}
