//! Realm data assembly.
//!
//! Walks the counters of a realm in the shape of [`RealmData`], reading
//! each value through a caller-supplied accessor so the same walk serves
//! statistics, thresholds and factory maxima.

use crate::bid::Bid;
use bview_types::{
    AsicCapabilities, BstSnapshot, EgressPortSpCounters, EgressSpCounters, PortPgCounters,
    QueueCounter, Realm, RealmData, Result,
};

fn per_port<T>(
    caps: &AsicCapabilities,
    columns: usize,
    mut cell: impl FnMut(u32, u32) -> Result<T>,
) -> Result<Vec<Vec<T>>> {
    (1..=caps.num_ports as u32)
        .map(|port| (0..columns as u32).map(|i| cell(port, i)).collect())
        .collect()
}

fn queues(
    count: usize,
    bid: Bid,
    read: &mut impl FnMut(Bid, u32, u32) -> Result<u64>,
) -> Result<Vec<QueueCounter>> {
    (0..count as u32)
        .map(|q| {
            Ok(QueueCounter {
                port: 0,
                buffer_count: read(bid, 0, q)?,
            })
        })
        .collect()
}

/// Builds one realm's values.
pub fn build_realm(
    caps: &AsicCapabilities,
    realm: Realm,
    read: &mut impl FnMut(Bid, u32, u32) -> Result<u64>,
) -> Result<RealmData> {
    let sp = caps.num_service_pools;
    Ok(match realm {
        Realm::Device => RealmData::Device(read(Bid::Device, 0, 0)?),
        Realm::IngressPortPriorityGroup => {
            RealmData::IngressPortPriorityGroup(per_port(caps, caps.num_priority_groups, |p, pg| {
                Ok(PortPgCounters {
                    um_share: read(Bid::PriGroupShared, p, pg)?,
                    um_headroom: read(Bid::PriGroupHeadroom, p, pg)?,
                })
            })?)
        }
        Realm::IngressPortServicePool => RealmData::IngressPortServicePool(per_port(
            caps,
            sp,
            |p, s| read(Bid::PortPool, p, s),
        )?),
        Realm::IngressServicePool => RealmData::IngressServicePool(
            (0..sp as u32)
                .map(|s| read(Bid::IngressPool, 0, s))
                .collect::<Result<_>>()?,
        ),
        Realm::EgressPortServicePool => {
            RealmData::EgressPortServicePool(per_port(caps, sp, |p, s| {
                Ok(EgressPortSpCounters {
                    uc_share: read(Bid::EgressUcastPortShared, p, s)?,
                    um_share: read(Bid::EgressPortShared, p, s)?,
                })
            })?)
        }
        Realm::EgressServicePool => RealmData::EgressServicePool(
            (0..sp as u32)
                .map(|s| {
                    Ok(EgressSpCounters {
                        um_share: read(Bid::EgressPool, 0, s)?,
                        mc_share: read(Bid::EgressMcastPool, 0, s)?,
                    })
                })
                .collect::<Result<_>>()?,
        ),
        Realm::EgressUcQueue => {
            RealmData::EgressUcQueue(queues(caps.num_unicast_queues, Bid::Ucast, read)?)
        }
        Realm::EgressUcQueueGroup => RealmData::EgressUcQueueGroup(queues(
            caps.num_unicast_queue_groups,
            Bid::UcastGroup,
            read,
        )?),
        Realm::EgressMcQueue => {
            RealmData::EgressMcQueue(queues(caps.num_multicast_queues, Bid::Mcast, read)?)
        }
        Realm::EgressCpuQueue => {
            RealmData::EgressCpuQueue(queues(caps.num_cpu_queues, Bid::CpuQueue, read)?)
        }
        Realm::EgressRqeQueue => {
            RealmData::EgressRqeQueue(queues(caps.num_rqe_queues, Bid::RqeQueue, read)?)
        }
    })
}

/// Builds every realm.
pub fn build_snapshot(
    caps: &AsicCapabilities,
    read: &mut impl FnMut(Bid, u32, u32) -> Result<u64>,
) -> Result<BstSnapshot> {
    let mut snapshot = BstSnapshot::zeroed(caps);
    for realm in Realm::ALL {
        snapshot.set_realm(build_realm(caps, realm, read)?);
    }
    Ok(snapshot)
}
