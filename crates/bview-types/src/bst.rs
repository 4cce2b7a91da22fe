//! Buffer Statistics Tracking (BST) data types.
//!
//! These types cross the redirector boundary: configuration, trigger
//! events, per-realm counter data and threshold requests. The same
//! [`BstSnapshot`] layout carries current statistics, configured thresholds
//! and factory maxima, so callers can diff them field by field.

use crate::asic::AsicCapabilities;
use crate::realm::{Realm, TrackingMask};
use crate::ParseError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trigger rate limit used when none has been configured.
pub const DEFAULT_MAX_TRIGGERS: u32 = 60;

/// How counters are sampled.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// Instantaneous occupancy.
    #[default]
    Current = 1,
    /// High-water mark since the last clear.
    Peak = 2,
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingMode::Current => write!(f, "current"),
            TrackingMode::Peak => write!(f, "peak"),
        }
    }
}

impl FromStr for TrackingMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "current" => Ok(TrackingMode::Current),
            "peak" => Ok(TrackingMode::Peak),
            _ => Err(ParseError::InvalidTrackingMode(s.to_string())),
        }
    }
}

/// Per-ASIC BST configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BstConfig {
    pub enabled: bool,
    pub tracking_mode: TrackingMode,
    pub periodic_collection: bool,
    pub collection_interval_secs: u32,
    /// Triggers allowed per window; 0 means "not initialized".
    pub max_triggers: u32,
    pub send_snapshot_on_trigger: bool,
    pub trigger_collection_enabled: bool,
    pub tracking_mask: TrackingMask,
    /// Tracking state was already pushed; `config_set` skips re-committing it.
    pub track_init: bool,
}

/// Details of a threshold crossing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerInfo {
    pub realm: Realm,
    pub counter: String,
    pub port: u32,
    /// Zero-based queue or pool index; -1 when the counter is not indexed.
    pub queue: i32,
}

/// Which part of the configuration changed upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigChange {
    /// One of the feature-level settings.
    Feature,
    /// The set of tracked realms.
    Tracking,
}

/// Event published by a BST implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BstEvent {
    Trigger { asic: u32, info: TriggerInfo },
    ConfigChanged { asic: u32, change: ConfigChange },
}

impl BstEvent {
    /// Returns the ASIC unit the event belongs to.
    pub fn asic(&self) -> u32 {
        match self {
            BstEvent::Trigger { asic, .. } | BstEvent::ConfigChanged { asic, .. } => *asic,
        }
    }
}

/// Value paired with the local time it was read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamped<T> {
    pub data: T,
    pub time: DateTime<Utc>,
}

impl<T> Timestamped<T> {
    /// Stamps `data` with the current time.
    pub fn now(data: T) -> Self {
        Self {
            data,
            time: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortPgCounters {
    pub um_share: u64,
    pub um_headroom: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EgressPortSpCounters {
    pub uc_share: u64,
    pub um_share: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EgressSpCounters {
    pub um_share: u64,
    pub mc_share: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueCounter {
    /// Owning port, 0 when the queue is not bound to one.
    pub port: u32,
    pub buffer_count: u64,
}

/// Counter values of a single realm.
///
/// Port-indexed realms are laid out `[port - 1][index]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RealmData {
    Device(u64),
    IngressPortPriorityGroup(Vec<Vec<PortPgCounters>>),
    IngressPortServicePool(Vec<Vec<u64>>),
    IngressServicePool(Vec<u64>),
    EgressPortServicePool(Vec<Vec<EgressPortSpCounters>>),
    EgressServicePool(Vec<EgressSpCounters>),
    EgressUcQueue(Vec<QueueCounter>),
    EgressUcQueueGroup(Vec<QueueCounter>),
    EgressMcQueue(Vec<QueueCounter>),
    EgressCpuQueue(Vec<QueueCounter>),
    EgressRqeQueue(Vec<QueueCounter>),
}

impl RealmData {
    /// Returns the realm this data belongs to.
    pub fn realm(&self) -> Realm {
        match self {
            RealmData::Device(_) => Realm::Device,
            RealmData::IngressPortPriorityGroup(_) => Realm::IngressPortPriorityGroup,
            RealmData::IngressPortServicePool(_) => Realm::IngressPortServicePool,
            RealmData::IngressServicePool(_) => Realm::IngressServicePool,
            RealmData::EgressPortServicePool(_) => Realm::EgressPortServicePool,
            RealmData::EgressServicePool(_) => Realm::EgressServicePool,
            RealmData::EgressUcQueue(_) => Realm::EgressUcQueue,
            RealmData::EgressUcQueueGroup(_) => Realm::EgressUcQueueGroup,
            RealmData::EgressMcQueue(_) => Realm::EgressMcQueue,
            RealmData::EgressCpuQueue(_) => Realm::EgressCpuQueue,
            RealmData::EgressRqeQueue(_) => Realm::EgressRqeQueue,
        }
    }
}

/// Values of every realm of one ASIC.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BstSnapshot {
    pub device: u64,
    pub ingress_port_pg: Vec<Vec<PortPgCounters>>,
    pub ingress_port_sp: Vec<Vec<u64>>,
    pub ingress_sp: Vec<u64>,
    pub egress_port_sp: Vec<Vec<EgressPortSpCounters>>,
    pub egress_sp: Vec<EgressSpCounters>,
    pub egress_uc_queue: Vec<QueueCounter>,
    pub egress_uc_queue_group: Vec<QueueCounter>,
    pub egress_mc_queue: Vec<QueueCounter>,
    pub egress_cpu_queue: Vec<QueueCounter>,
    pub egress_rqe_queue: Vec<QueueCounter>,
}

impl BstSnapshot {
    /// Creates a zero-filled snapshot sized for the given ASIC.
    pub fn zeroed(caps: &AsicCapabilities) -> Self {
        let ports = caps.num_ports;
        let sp = caps.num_service_pools;
        Self {
            device: 0,
            ingress_port_pg: vec![vec![PortPgCounters::default(); caps.num_priority_groups]; ports],
            ingress_port_sp: vec![vec![0; sp]; ports],
            ingress_sp: vec![0; sp],
            egress_port_sp: vec![vec![EgressPortSpCounters::default(); sp]; ports],
            egress_sp: vec![EgressSpCounters::default(); sp],
            egress_uc_queue: vec![QueueCounter::default(); caps.num_unicast_queues],
            egress_uc_queue_group: vec![QueueCounter::default(); caps.num_unicast_queue_groups],
            egress_mc_queue: vec![QueueCounter::default(); caps.num_multicast_queues],
            egress_cpu_queue: vec![QueueCounter::default(); caps.num_cpu_queues],
            egress_rqe_queue: vec![QueueCounter::default(); caps.num_rqe_queues],
        }
    }

    /// Replaces the values of one realm.
    pub fn set_realm(&mut self, data: RealmData) {
        match data {
            RealmData::Device(v) => self.device = v,
            RealmData::IngressPortPriorityGroup(v) => self.ingress_port_pg = v,
            RealmData::IngressPortServicePool(v) => self.ingress_port_sp = v,
            RealmData::IngressServicePool(v) => self.ingress_sp = v,
            RealmData::EgressPortServicePool(v) => self.egress_port_sp = v,
            RealmData::EgressServicePool(v) => self.egress_sp = v,
            RealmData::EgressUcQueue(v) => self.egress_uc_queue = v,
            RealmData::EgressUcQueueGroup(v) => self.egress_uc_queue_group = v,
            RealmData::EgressMcQueue(v) => self.egress_mc_queue = v,
            RealmData::EgressCpuQueue(v) => self.egress_cpu_queue = v,
            RealmData::EgressRqeQueue(v) => self.egress_rqe_queue = v,
        }
    }

    /// Returns a copy of one realm's values.
    pub fn realm(&self, realm: Realm) -> RealmData {
        match realm {
            Realm::Device => RealmData::Device(self.device),
            Realm::IngressPortPriorityGroup => {
                RealmData::IngressPortPriorityGroup(self.ingress_port_pg.clone())
            }
            Realm::IngressPortServicePool => {
                RealmData::IngressPortServicePool(self.ingress_port_sp.clone())
            }
            Realm::IngressServicePool => RealmData::IngressServicePool(self.ingress_sp.clone()),
            Realm::EgressPortServicePool => {
                RealmData::EgressPortServicePool(self.egress_port_sp.clone())
            }
            Realm::EgressServicePool => RealmData::EgressServicePool(self.egress_sp.clone()),
            Realm::EgressUcQueue => RealmData::EgressUcQueue(self.egress_uc_queue.clone()),
            Realm::EgressUcQueueGroup => {
                RealmData::EgressUcQueueGroup(self.egress_uc_queue_group.clone())
            }
            Realm::EgressMcQueue => RealmData::EgressMcQueue(self.egress_mc_queue.clone()),
            Realm::EgressCpuQueue => RealmData::EgressCpuQueue(self.egress_cpu_queue.clone()),
            Realm::EgressRqeQueue => RealmData::EgressRqeQueue(self.egress_rqe_queue.clone()),
        }
    }
}

/// A threshold write for one counter position.
///
/// Ports are 1-based; pool, group and queue indices are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BstThreshold {
    Device {
        threshold: u64,
    },
    IngressPortPriorityGroup {
        port: u32,
        pg: u32,
        um_share: u64,
        um_headroom: u64,
    },
    IngressPortServicePool {
        port: u32,
        sp: u32,
        um_share: u64,
    },
    IngressServicePool {
        sp: u32,
        um_share: u64,
    },
    EgressPortServicePool {
        port: u32,
        sp: u32,
        uc_share: u64,
        um_share: u64,
    },
    EgressServicePool {
        sp: u32,
        um_share: u64,
        mc_share: u64,
    },
    EgressUcQueue {
        queue: u32,
        uc_buffer: u64,
    },
    EgressUcQueueGroup {
        group: u32,
        uc_buffer: u64,
    },
    EgressMcQueue {
        queue: u32,
        mc_buffer: u64,
    },
    EgressCpuQueue {
        queue: u32,
        cpu_buffer: u64,
    },
    EgressRqeQueue {
        queue: u32,
        rqe_buffer: u64,
    },
}

impl BstThreshold {
    /// Returns the realm the threshold applies to.
    pub fn realm(&self) -> Realm {
        match self {
            BstThreshold::Device { .. } => Realm::Device,
            BstThreshold::IngressPortPriorityGroup { .. } => Realm::IngressPortPriorityGroup,
            BstThreshold::IngressPortServicePool { .. } => Realm::IngressPortServicePool,
            BstThreshold::IngressServicePool { .. } => Realm::IngressServicePool,
            BstThreshold::EgressPortServicePool { .. } => Realm::EgressPortServicePool,
            BstThreshold::EgressServicePool { .. } => Realm::EgressServicePool,
            BstThreshold::EgressUcQueue { .. } => Realm::EgressUcQueue,
            BstThreshold::EgressUcQueueGroup { .. } => Realm::EgressUcQueueGroup,
            BstThreshold::EgressMcQueue { .. } => Realm::EgressMcQueue,
            BstThreshold::EgressCpuQueue { .. } => Realm::EgressCpuQueue,
            BstThreshold::EgressRqeQueue { .. } => Realm::EgressRqeQueue,
        }
    }
}
