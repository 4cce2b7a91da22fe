//! BID metadata table.
//!
//! A BID names one class of countable buffer resource. The table below is
//! the single source of truth for row-key names, array shapes and factory
//! thresholds; the cache layout is derived from it once at start-up.

use bview_types::{BviewError, Realm, Result};
use std::fmt;
use std::ops::Range;

/// Bytes per buffer cell on Trident2.
pub const CELL_TO_BYTE: u64 = 208;

const DEFAULT_THRESHOLD: u64 = 0x1FFFF * CELL_TO_BYTE;
const QUEUE_THRESHOLD: u64 = 0x3FFF * CELL_TO_BYTE;
const HEADROOM_THRESHOLD: u64 = 0xFFF * CELL_TO_BYTE;

/// Number of BIDs.
pub const NUM_BIDS: usize = 15;

/// Buffer statistic identifier.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bid {
    Device = 0,
    EgressPool,
    EgressMcastPool,
    IngressPool,
    PortPool,
    PriGroupShared,
    PriGroupHeadroom,
    Ucast,
    Mcast,
    EgressUcastPortShared,
    EgressPortShared,
    RqeQueue,
    RqePool,
    UcastGroup,
    CpuQueue,
}

impl Bid {
    pub const ALL: [Bid; NUM_BIDS] = [
        Bid::Device,
        Bid::EgressPool,
        Bid::EgressMcastPool,
        Bid::IngressPool,
        Bid::PortPool,
        Bid::PriGroupShared,
        Bid::PriGroupHeadroom,
        Bid::Ucast,
        Bid::Mcast,
        Bid::EgressUcastPortShared,
        Bid::EgressPortShared,
        Bid::RqeQueue,
        Bid::RqePool,
        Bid::UcastGroup,
        Bid::CpuQueue,
    ];

    pub const fn id(&self) -> usize {
        *self as usize
    }

    /// Returns the static metadata of this BID.
    pub fn descriptor(&self) -> &'static BidDescriptor {
        &BID_TABLE[self.id()]
    }

    /// Finds the BID with the given realm and counter names.
    pub fn lookup(realm: &str, counter: &str) -> Option<Bid> {
        BID_TABLE
            .iter()
            .find(|d| d.realm.name() == realm && d.counter == counter)
            .map(|d| d.bid)
    }
}

impl fmt::Display for Bid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.descriptor();
        write!(f, "{}/{}", d.realm, d.counter)
    }
}

/// Static description of one BID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BidDescriptor {
    pub bid: Bid,
    pub realm: Realm,
    pub counter: &'static str,
    pub indexed: bool,
    /// Port is the first index, pool/group the second.
    pub double_indexed: bool,
    pub rows: usize,
    pub columns: usize,
    /// Factory threshold in bytes.
    pub default_threshold: u64,
}

impl BidDescriptor {
    pub const fn size(&self) -> usize {
        self.rows * self.columns
    }
}

const fn bid(
    bid: Bid,
    realm: Realm,
    counter: &'static str,
    double_indexed: bool,
    rows: usize,
    columns: usize,
    default_threshold: u64,
) -> BidDescriptor {
    BidDescriptor {
        bid,
        realm,
        counter,
        indexed: !matches!(bid, Bid::Device),
        double_indexed,
        rows,
        columns,
        default_threshold,
    }
}

/// Every BID, indexed by [`Bid::id`].
pub static BID_TABLE: [BidDescriptor; NUM_BIDS] = [
    bid(Bid::Device, Realm::Device, "data", false, 1, 1, DEFAULT_THRESHOLD),
    bid(Bid::EgressPool, Realm::EgressServicePool, "um-share-buffer-count", false, 1, 4, DEFAULT_THRESHOLD),
    bid(Bid::EgressMcastPool, Realm::EgressServicePool, "mc-share-buffer-count", false, 1, 4, DEFAULT_THRESHOLD),
    bid(Bid::IngressPool, Realm::IngressServicePool, "um-share-buffer-count", false, 1, 5, DEFAULT_THRESHOLD),
    bid(Bid::PortPool, Realm::IngressPortServicePool, "um-share-buffer-count", true, 130, 5, DEFAULT_THRESHOLD),
    bid(Bid::PriGroupShared, Realm::IngressPortPriorityGroup, "um-share-buffer-count", true, 130, 8, DEFAULT_THRESHOLD),
    bid(Bid::PriGroupHeadroom, Realm::IngressPortPriorityGroup, "um-headroom-buffer-count", true, 130, 8, HEADROOM_THRESHOLD),
    bid(Bid::Ucast, Realm::EgressUcQueue, "uc-buffer-count", false, 1, 4096, QUEUE_THRESHOLD),
    bid(Bid::Mcast, Realm::EgressMcQueue, "mc-buffer-count", false, 1, 1040, DEFAULT_THRESHOLD),
    bid(Bid::EgressUcastPortShared, Realm::EgressPortServicePool, "uc-share-buffer-count", true, 130, 4, QUEUE_THRESHOLD),
    bid(Bid::EgressPortShared, Realm::EgressPortServicePool, "um-share-buffer-count", true, 130, 4, DEFAULT_THRESHOLD),
    bid(Bid::RqeQueue, Realm::EgressRqeQueue, "rqe-buffer-count", false, 1, 11, DEFAULT_THRESHOLD),
    bid(Bid::RqePool, Realm::EgressRqeQueue, "rqe-queue-count", false, 1, 11, DEFAULT_THRESHOLD),
    bid(Bid::UcastGroup, Realm::EgressUcQueueGroup, "uc-buffer-count", false, 1, 128, QUEUE_THRESHOLD),
    bid(Bid::CpuQueue, Realm::EgressCpuQueue, "cpu-buffer-count", false, 1, 8, DEFAULT_THRESHOLD),
];

/// Computes the position of a counter inside its BID's array.
///
/// Double-indexed BIDs take a 1-based port and a 0-based index within the
/// row; single-indexed BIDs ignore the port; non-indexed BIDs always map
/// to 0.
pub fn resolve_logical_index(bid: Bid, port: u32, index: u32) -> Result<usize> {
    let d = bid.descriptor();
    let logical = if d.double_indexed {
        if port == 0 || index as usize >= d.columns {
            return Err(BviewError::out_of_range(
                format!("{} port {} index {}", bid, port, index),
                index as usize,
                d.columns,
            ));
        }
        (port as usize - 1) * d.columns + index as usize
    } else if d.indexed {
        index as usize
    } else {
        0
    };

    if logical >= d.size() {
        return Err(BviewError::out_of_range(bid.to_string(), logical, d.size()));
    }
    Ok(logical)
}

/// Offsets of every BID inside one flat per-ASIC counter array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidLayout {
    offsets: [usize; NUM_BIDS],
    total: usize,
}

impl BidLayout {
    pub fn new() -> Self {
        let mut offsets = [0; NUM_BIDS];
        let mut total = 0;
        for d in BID_TABLE.iter() {
            offsets[d.bid.id()] = total;
            total += d.size();
        }
        Self { offsets, total }
    }

    /// Number of counters per ASIC.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Slice of the flat array owned by a BID.
    pub fn range(&self, bid: Bid) -> Range<usize> {
        let start = self.offsets[bid.id()];
        start..start + bid.descriptor().size()
    }

    /// Flat array position of a counter.
    pub fn position(&self, bid: Bid, port: u32, index: u32) -> Result<usize> {
        Ok(self.offsets[bid.id()] + resolve_logical_index(bid, port, index)?)
    }
}

impl Default for BidLayout {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_table_is_indexed_by_id() {
        for (i, d) in BID_TABLE.iter().enumerate() {
            assert_eq!(d.bid.id(), i);
            assert_eq!(Bid::ALL[i], d.bid);
            assert_eq!(d.size(), d.rows * d.columns);
            if d.double_indexed {
                assert!(d.indexed);
            }
        }
    }

    #[test]
    fn test_realm_counter_pairs_are_unique() {
        for a in BID_TABLE.iter() {
            assert_eq!(Bid::lookup(a.realm.name(), a.counter), Some(a.bid));
        }
        assert_eq!(Bid::lookup("egress-uc-queue", "mc-buffer-count"), None);
    }

    #[test]
    fn test_default_thresholds() {
        assert_eq!(Bid::Device.descriptor().default_threshold, 131071 * 208);
        assert_eq!(Bid::Ucast.descriptor().default_threshold, 16383 * 208);
        assert_eq!(Bid::PriGroupHeadroom.descriptor().default_threshold, 4095 * 208);
    }

    #[test]
    fn test_double_indexed_formula() {
        let columns = Bid::PriGroupShared.descriptor().columns as u32;
        for port in [1u32, 3, 130] {
            for idx in 0..columns {
                let logical = resolve_logical_index(Bid::PriGroupShared, port, idx).unwrap();
                assert_eq!(logical, ((port - 1) * columns + idx) as usize);
                assert!(logical < Bid::PriGroupShared.descriptor().size());
            }
        }
        assert!(resolve_logical_index(Bid::PriGroupShared, 0, 0).is_err());
        assert!(resolve_logical_index(Bid::PriGroupShared, 131, 0).is_err());
        assert!(resolve_logical_index(Bid::PriGroupShared, 1, 8).is_err());
    }

    #[test]
    fn test_single_and_non_indexed() {
        assert_eq!(resolve_logical_index(Bid::Ucast, 7, 5).unwrap(), 5);
        assert_eq!(resolve_logical_index(Bid::Ucast, 0, 4095).unwrap(), 4095);
        assert!(matches!(
            resolve_logical_index(Bid::Ucast, 0, 4096),
            Err(BviewError::OutOfRange { .. })
        ));
        assert_eq!(resolve_logical_index(Bid::Device, 9, 9).unwrap(), 0);
    }

    #[test]
    fn test_layout_ranges_are_contiguous() {
        let layout = BidLayout::new();
        let mut expected = 0;
        for bid in Bid::ALL {
            let range = layout.range(bid);
            assert_eq!(range.start, expected);
            expected = range.end;
        }
        assert_eq!(layout.total(), expected);
        assert_eq!(
            layout.position(Bid::Ucast, 0, 5).unwrap(),
            layout.range(Bid::Ucast).start + 5
        );
    }
}
