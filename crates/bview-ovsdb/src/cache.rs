//! Per-ASIC BST counter cache.
//!
//! Every ASIC owns one flat array of [`CounterEntry`] laid out by
//! [`BidLayout`] plus its [`BstConfig`]. A single reader/writer lock guards
//! all units; each operation holds it for its whole duration so readers
//! never see a half-applied update.

use crate::bid::{Bid, BidLayout};
use bview_types::{BstConfig, BviewError, Result, TrackingMask, DEFAULT_MAX_TRIGGERS};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Cached state of one counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterEntry {
    pub stat: u64,
    pub threshold: u64,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
struct AsicCache {
    entries: Vec<CounterEntry>,
    config: BstConfig,
}

/// Read-only view of one unit, valid while the cache read lock is held.
pub struct UnitView<'a> {
    layout: &'a BidLayout,
    entries: &'a [CounterEntry],
}

impl UnitView<'_> {
    pub fn get(&self, bid: Bid, port: u32, index: u32) -> Result<CounterEntry> {
        let pos = self
            .layout
            .position(bid, port, index)
            .map_err(|e| BviewError::invalid_parameter(e.to_string()))?;
        Ok(self.entries[pos])
    }
}

/// Diagnostic copy of one unit's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDump {
    pub config: BstConfig,
    /// Counters with a non-zero stat or threshold: (BID, logical index, entry).
    pub entries: Vec<(Bid, usize, CounterEntry)>,
}

/// Counter and configuration store for every ASIC unit.
pub struct BstCache {
    layout: BidLayout,
    units: RwLock<Vec<AsicCache>>,
}

fn with_trigger_default(mut config: BstConfig) -> BstConfig {
    if config.max_triggers == 0 {
        config.max_triggers = DEFAULT_MAX_TRIGGERS;
    }
    config
}

impl BstCache {
    pub fn new(num_units: usize) -> Self {
        let layout = BidLayout::new();
        let unit = AsicCache {
            entries: vec![CounterEntry::default(); layout.total()],
            config: BstConfig::default(),
        };
        Self {
            layout,
            units: RwLock::new(vec![unit; num_units]),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<AsicCache>>> {
        self.units
            .read()
            .map_err(|_| BviewError::failure("BST cache lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<AsicCache>>> {
        self.units
            .write()
            .map_err(|_| BviewError::failure("BST cache lock poisoned"))
    }

    fn unit_error(asic: u32) -> BviewError {
        BviewError::invalid_parameter(format!("unknown ASIC unit {}", asic))
    }

    pub fn num_units(&self) -> usize {
        self.read().map(|u| u.len()).unwrap_or(0)
    }

    /// Returns a copy of one counter.
    pub fn get(&self, asic: u32, bid: Bid, port: u32, index: u32) -> Result<CounterEntry> {
        self.with_unit(asic, |view| view.get(bid, port, index))?
    }

    /// Stores an observed counter.
    ///
    /// With `default` set the entry's threshold is replaced by the BID's
    /// factory threshold.
    pub fn update_stat(
        &self,
        asic: u32,
        bid: Bid,
        port: u32,
        index: u32,
        default: bool,
        mut entry: CounterEntry,
    ) -> Result<()> {
        let pos = self
            .layout
            .position(bid, port, index)
            .map_err(|e| BviewError::invalid_parameter(e.to_string()))?;
        if default {
            entry.threshold = bid.descriptor().default_threshold;
        }

        let mut units = self.write()?;
        let unit = units
            .get_mut(asic as usize)
            .ok_or_else(|| Self::unit_error(asic))?;
        unit.entries[pos] = entry;
        Ok(())
    }

    /// Runs `f` over one unit under the read lock.
    pub fn with_unit<R>(&self, asic: u32, f: impl FnOnce(&UnitView<'_>) -> R) -> Result<R> {
        let units = self.read()?;
        let unit = units.get(asic as usize).ok_or_else(|| Self::unit_error(asic))?;
        let view = UnitView {
            layout: &self.layout,
            entries: &unit.entries,
        };
        Ok(f(&view))
    }

    pub fn config(&self, asic: u32) -> Result<BstConfig> {
        let units = self.read()?;
        let unit = units.get(asic as usize).ok_or_else(|| Self::unit_error(asic))?;
        Ok(with_trigger_default(unit.config))
    }

    pub fn set_config(&self, asic: u32, config: &BstConfig) -> Result<()> {
        self.update_config(asic, |c| *c = with_trigger_default(*config))
    }

    /// Mutates one unit's configuration in place under the write lock.
    pub fn update_config<R>(&self, asic: u32, f: impl FnOnce(&mut BstConfig) -> R) -> Result<R> {
        let mut units = self.write()?;
        let unit = units
            .get_mut(asic as usize)
            .ok_or_else(|| Self::unit_error(asic))?;
        Ok(f(&mut unit.config))
    }

    /// ORs realm bits into the stored tracking mask; returns true if it changed.
    pub fn merge_tracking(&self, asic: u32, observed: TrackingMask) -> Result<bool> {
        self.update_config(asic, |c| {
            let merged = c.tracking_mask.union(observed);
            let changed = merged != c.tracking_mask;
            c.tracking_mask = merged;
            changed
        })
    }

    /// Returns the configuration and every non-zero counter of one unit.
    pub fn dump(&self, asic: u32) -> Result<CacheDump> {
        let units = self.read()?;
        let unit = units.get(asic as usize).ok_or_else(|| Self::unit_error(asic))?;

        let mut entries = Vec::new();
        for bid in Bid::ALL {
            let range = self.layout.range(bid);
            for (logical, entry) in unit.entries[range].iter().enumerate() {
                if entry.stat != 0 || entry.threshold != 0 {
                    entries.push((bid, logical, *entry));
                }
            }
        }

        debug!(
            asic,
            enabled = unit.config.enabled,
            mode = %unit.config.tracking_mode,
            counters = entries.len(),
            "BST cache dump"
        );
        Ok(CacheDump {
            config: unit.config,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bview_types::{Realm, TrackingMode};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_update_and_get() {
        let cache = BstCache::new(1);
        let entry = CounterEntry {
            stat: 128,
            threshold: 1000,
            enabled: true,
        };
        cache.update_stat(0, Bid::Ucast, 0, 5, false, entry).unwrap();
        assert_eq!(cache.get(0, Bid::Ucast, 0, 5).unwrap(), entry);
        assert_eq!(cache.get(0, Bid::Ucast, 0, 6).unwrap(), CounterEntry::default());
    }

    #[test]
    fn test_default_threshold_fallback() {
        let cache = BstCache::new(1);
        let entry = CounterEntry {
            stat: 7,
            threshold: 12345,
            enabled: false,
        };
        cache
            .update_stat(0, Bid::PriGroupHeadroom, 2, 3, true, entry)
            .unwrap();
        let got = cache.get(0, Bid::PriGroupHeadroom, 2, 3).unwrap();
        assert_eq!(got.stat, 7);
        assert_eq!(
            got.threshold,
            Bid::PriGroupHeadroom.descriptor().default_threshold
        );
    }

    #[test]
    fn test_out_of_range_is_invalid_parameter() {
        let cache = BstCache::new(1);
        assert!(matches!(
            cache.get(0, Bid::CpuQueue, 0, 8),
            Err(BviewError::InvalidParameter { .. })
        ));
        assert!(matches!(
            cache.get(1, Bid::CpuQueue, 0, 0),
            Err(BviewError::InvalidParameter { .. })
        ));
        assert!(cache
            .update_stat(3, Bid::Device, 0, 0, false, CounterEntry::default())
            .is_err());
    }

    #[test]
    fn test_max_triggers_sentinel() {
        let cache = BstCache::new(1);
        assert_eq!(cache.config(0).unwrap().max_triggers, DEFAULT_MAX_TRIGGERS);

        let config = BstConfig {
            enabled: true,
            tracking_mode: TrackingMode::Peak,
            max_triggers: 5,
            ..Default::default()
        };
        cache.set_config(0, &config).unwrap();
        assert_eq!(cache.config(0).unwrap(), config);

        cache
            .set_config(0, &BstConfig { max_triggers: 0, ..config })
            .unwrap();
        assert_eq!(cache.config(0).unwrap().max_triggers, DEFAULT_MAX_TRIGGERS);
    }

    #[test]
    fn test_merge_tracking() {
        let cache = BstCache::new(1);
        let pg = TrackingMask::empty().with(Realm::IngressPortPriorityGroup);
        assert!(cache.merge_tracking(0, pg).unwrap());
        assert!(!cache.merge_tracking(0, pg).unwrap());
        assert!(cache
            .config(0)
            .unwrap()
            .tracking_mask
            .is_enabled(Realm::IngressPortPriorityGroup));
    }

    #[test]
    fn test_dump_lists_non_zero_entries() {
        let cache = BstCache::new(1);
        let entry = CounterEntry {
            stat: 1,
            threshold: 2,
            enabled: false,
        };
        cache.update_stat(0, Bid::PortPool, 2, 1, false, entry).unwrap();
        let dump = cache.dump(0).unwrap();
        assert_eq!(dump.entries, vec![(Bid::PortPool, 6, entry)]);
    }

    #[test]
    fn test_readers_never_see_torn_entries() {
        let cache = Arc::new(BstCache::new(1));
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let cache = Arc::clone(&cache);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                for i in 1..=2000u64 {
                    let entry = CounterEntry {
                        stat: i,
                        threshold: i * 2,
                        enabled: true,
                    };
                    cache.update_stat(0, Bid::Mcast, 0, 9, false, entry).unwrap();
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    while !done.load(Ordering::SeqCst) {
                        let entry = cache.get(0, Bid::Mcast, 0, 9).unwrap();
                        assert_eq!(entry.threshold, entry.stat * 2);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(cache.get(0, Bid::Mcast, 0, 9).unwrap().stat, 2000);
    }
}
