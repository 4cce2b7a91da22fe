//! Inbound sync engine.
//!
//! The engine subscribes to the `bufmon` counter table and the `System`
//! configuration column with a single `monitor` request, then folds the
//! initial snapshot and every later `update` notification into the
//! [`BstCache`].
//!
//! # States
//!
//! `Disconnected -> Connecting -> Subscribing -> Streaming`. A transport
//! failure ends the engine in `Disconnected`; restarting it is left to the
//! embedding process. Cancelling the handle's token stops it at the next
//! suspension point.
//!
//! # Notifications
//!
//! Per update message the engine publishes at most one
//! `ConfigChanged(Tracking)` and one `ConfigChanged(Feature)` event per
//! unit, plus one `Trigger` per row reporting `status == "triggered"`.

use crate::cache::{BstCache, CounterEntry};
use crate::jsonrpc::{Endpoint, JsonRpcClient, Message};
use crate::row_key;
use crate::schema::{self, config_key};
use bview_types::{
    BstConfig, BstEvent, BviewError, ConfigChange, Result, TrackingMask, TrackingMode,
    TriggerInfo,
};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Length of a textual row UUID.
const UUID_LEN: usize = 36;

/// Connection state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Disconnected,
    Connecting,
    Subscribing,
    Streaming,
}

/// UUID of the row holding the BST configuration, shared with the commit path.
#[derive(Debug, Clone, Default)]
pub struct ConfigRowHandle(Arc<RwLock<Option<Uuid>>>);

impl ConfigRowHandle {
    pub fn get(&self) -> Option<Uuid> {
        match self.0.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set(&self, uuid: Uuid) {
        match self.0.write() {
            Ok(mut guard) => *guard = Some(uuid),
            Err(poisoned) => *poisoned.into_inner() = Some(uuid),
        }
    }
}

/// What one update message did to the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub rows_applied: usize,
    pub rows_skipped: usize,
    pub triggers: usize,
    /// Units whose tracking mask gained a realm.
    pub tracking_changed: Vec<u32>,
    /// Units whose configuration changed.
    pub config_changed: Vec<u32>,
    /// True if the message carried configuration data.
    pub config_seen: bool,
}

/// Applies table updates to the cache and publishes the resulting events.
pub struct UpdateProcessor {
    cache: Arc<BstCache>,
    events: broadcast::Sender<BstEvent>,
    config_row: ConfigRowHandle,
    initialized: watch::Sender<bool>,
}

fn column<'a>(row: &'a Value, name: &str) -> Option<&'a Value> {
    row.get("new")
        .and_then(|new| new.get(name))
        .or_else(|| row.get("old").and_then(|old| old.get(name)))
}

fn parse_bool(key: &str, value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => {
            warn!(key, value, "Ignoring non-boolean config value");
            None
        }
    }
}

fn parse_u32(key: &str, value: &str) -> Option<u32> {
    value
        .parse()
        .map_err(|_| warn!(key, value, "Ignoring non-numeric config value"))
        .ok()
}

/// Applies one `bufmon_config` key to `config`; returns true if it changed.
fn apply_config_key(config: &mut BstConfig, key: &str, value: &str) -> bool {
    fn set<T: PartialEq>(field: &mut T, value: Option<T>) -> bool {
        match value {
            Some(v) if *field != v => {
                *field = v;
                true
            }
            _ => false,
        }
    }

    match key {
        config_key::ENABLED => set(&mut config.enabled, parse_bool(key, value)),
        config_key::COUNTERS_MODE => {
            let mode = value
                .parse::<TrackingMode>()
                .map_err(|e| warn!(error = %e, "Ignoring unknown counters mode"))
                .ok();
            set(&mut config.tracking_mode, mode)
        }
        config_key::PERIODIC_COLLECTION => {
            set(&mut config.periodic_collection, parse_bool(key, value))
        }
        config_key::COLLECTION_PERIOD => {
            set(&mut config.collection_interval_secs, parse_u32(key, value))
        }
        config_key::TRIGGER_COLLECTION => {
            set(&mut config.trigger_collection_enabled, parse_bool(key, value))
        }
        config_key::SNAPSHOT_ON_TRIGGER => {
            set(&mut config.send_snapshot_on_trigger, parse_bool(key, value))
        }
        config_key::TRIGGER_RATE_LIMIT => set(&mut config.max_triggers, parse_u32(key, value)),
        _ => {
            debug!(key, "Ignoring unknown config key");
            false
        }
    }
}

impl UpdateProcessor {
    pub fn new(
        cache: Arc<BstCache>,
        events: broadcast::Sender<BstEvent>,
        config_row: ConfigRowHandle,
        initialized: watch::Sender<bool>,
    ) -> Self {
        Self {
            cache,
            events,
            config_row,
            initialized,
        }
    }

    fn publish(&self, event: BstEvent) {
        // No subscriber is not an error
        let _ = self.events.send(event);
    }

    /// Folds one `<table-updates>` object into the cache.
    pub fn process_update(&self, updates: &Value, initial: bool) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let Some(tables) = updates.as_object() else {
            warn!(initial, "Table update is not an object");
            return outcome;
        };

        for (table, rows) in tables {
            let Some(rows) = rows.as_object() else {
                warn!(table = %table, "Table rows are not an object");
                continue;
            };
            match table.as_str() {
                schema::BUFMON_TABLE => self.process_counters(rows, &mut outcome),
                schema::SYSTEM_TABLE => self.process_config(rows, &mut outcome),
                other => debug!(table = other, "Ignoring update for unmonitored table"),
            }
        }

        if outcome.config_seen {
            let first = self.initialized.send_if_modified(|done| !std::mem::replace(done, true));
            if first {
                info!("Initial BST configuration received");
            }
        }

        debug!(
            initial,
            applied = outcome.rows_applied,
            skipped = outcome.rows_skipped,
            triggers = outcome.triggers,
            "Processed table update"
        );
        outcome
    }

    fn process_counters(&self, rows: &Map<String, Value>, outcome: &mut BatchOutcome) {
        let num_units = self.cache.num_units();
        let mut observed: BTreeMap<u32, TrackingMask> = BTreeMap::new();

        for (uuid, row) in rows {
            let unit = column(row, "hw_unit_id").and_then(Value::as_u64);
            let name = column(row, "name").and_then(Value::as_str);
            let (Some(unit), Some(name)) = (unit, name) else {
                warn!(row = %uuid, "Counter row lacks hw_unit_id or name");
                outcome.rows_skipped += 1;
                continue;
            };
            if unit >= num_units as u64 {
                warn!(row = %uuid, unit, "Counter row names an unknown unit");
                outcome.rows_skipped += 1;
                continue;
            }
            let unit = unit as u32;

            let key = match row_key::decode(name) {
                Ok(key) => key,
                Err(e) => {
                    debug!(row = %name, error = %e, "Skipping undecodable counter row");
                    outcome.rows_skipped += 1;
                    continue;
                }
            };

            let stat = column(row, "counter_value")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let threshold = column(row, "trigger_threshold").and_then(Value::as_u64);
            let enabled = column(row, "enabled").and_then(Value::as_bool) == Some(true);
            let entry = CounterEntry {
                stat,
                threshold: threshold.unwrap_or(0),
                enabled,
            };

            let realm = key.bid.descriptor().realm;
            if enabled {
                observed.entry(unit).or_default().enable(realm);
            }

            if let Err(e) =
                self.cache
                    .update_stat(unit, key.bid, key.port, key.index, threshold.is_none(), entry)
            {
                warn!(row = %name, error = %e, "Failed to update counter");
                outcome.rows_skipped += 1;
                continue;
            }
            outcome.rows_applied += 1;

            if column(row, "status").and_then(Value::as_str) == Some(schema::STATUS_TRIGGERED) {
                // Upstream queue numbering is 1-based
                let info = TriggerInfo {
                    realm,
                    counter: key.bid.descriptor().counter.to_string(),
                    port: key.port,
                    queue: key.index as i32 - 1,
                };
                info!(unit, row = %name, "Threshold triggered");
                outcome.triggers += 1;
                self.publish(BstEvent::Trigger { asic: unit, info });
            }
        }

        for (unit, mask) in observed {
            match self.cache.merge_tracking(unit, mask) {
                Ok(true) => {
                    info!(unit, mask = mask.bits(), "Tracking mask changed");
                    outcome.tracking_changed.push(unit);
                    self.publish(BstEvent::ConfigChanged {
                        asic: unit,
                        change: ConfigChange::Tracking,
                    });
                }
                Ok(false) => {}
                Err(e) => warn!(unit, error = %e, "Failed to merge tracking mask"),
            }
        }
    }

    fn process_config(&self, rows: &Map<String, Value>, outcome: &mut BatchOutcome) {
        let mut changed_units = BTreeSet::new();

        for (uuid, row) in rows {
            let Some(config) = row.get("new").and_then(|n| n.get(schema::BUFMON_CONFIG_COLUMN))
            else {
                continue;
            };

            if uuid.len() == UUID_LEN {
                match Uuid::parse_str(uuid) {
                    Ok(id) => self.config_row.set(id),
                    Err(e) => warn!(row = %uuid, error = %e, "Config row has a bad UUID"),
                }
            } else {
                warn!(row = %uuid, "Config row UUID has the wrong length");
            }

            let pairs: Vec<(&str, &str)> = schema::map_pairs(config)
                .filter_map(|(k, v)| v.as_str().map(|v| (k, v)))
                .collect();
            outcome.config_seen = true;

            for unit in 0..self.cache.num_units() as u32 {
                let updated = self.cache.update_config(unit, |cfg| {
                    pairs
                        .iter()
                        .fold(false, |acc, (k, v)| apply_config_key(cfg, k, v) | acc)
                });
                match updated {
                    Ok(true) => {
                        changed_units.insert(unit);
                    }
                    Ok(false) => {}
                    Err(e) => warn!(unit, error = %e, "Failed to update config"),
                }
            }
        }

        for unit in changed_units {
            info!(unit, "BST configuration changed");
            outcome.config_changed.push(unit);
            self.publish(BstEvent::ConfigChanged {
                asic: unit,
                change: ConfigChange::Feature,
            });
        }
    }
}

/// Handle to a running engine.
pub struct SyncHandle {
    initialized: watch::Receiver<bool>,
    state: watch::Receiver<SyncState>,
    cancel: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl SyncHandle {
    /// Waits until the first configuration data has been applied.
    pub async fn wait_initialized(&mut self, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.initialized.wait_for(|done| *done)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(BviewError::transport(
                "sync engine stopped before the initial snapshot",
            )),
            Err(_) => Err(BviewError::failure(format!(
                "no initial snapshot within {:?}",
                timeout
            ))),
        }
    }

    pub fn is_initialized(&self) -> bool {
        *self.initialized.borrow()
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Token that stops the engine when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Waits for the engine to exit and returns why it stopped.
    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| BviewError::failure(format!("sync engine task failed: {}", e)))?
    }
}

/// Long-running monitor client.
pub struct SyncEngine {
    endpoint: Endpoint,
    database: String,
    max_line_length: usize,
    processor: UpdateProcessor,
    state: watch::Sender<SyncState>,
    cancel: CancellationToken,
}

impl SyncEngine {
    /// Starts the engine on the current runtime.
    pub fn spawn(
        endpoint: Endpoint,
        database: impl Into<String>,
        cache: Arc<BstCache>,
        events: broadcast::Sender<BstEvent>,
        config_row: ConfigRowHandle,
        max_line_length: usize,
    ) -> SyncHandle {
        let (init_tx, init_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(SyncState::Disconnected);
        let cancel = CancellationToken::new();

        let engine = SyncEngine {
            endpoint,
            database: database.into(),
            max_line_length,
            processor: UpdateProcessor::new(cache, events, config_row, init_tx),
            state: state_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(engine.run());

        SyncHandle {
            initialized: init_rx,
            state: state_rx,
            cancel,
            task,
        }
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn run(self) -> Result<()> {
        let result = self.stream().await;
        self.state.send_replace(SyncState::Disconnected);
        match &result {
            Ok(()) => info!("Sync engine stopped"),
            Err(e) => error!(error = %e, "Sync engine terminated"),
        }
        result
    }

    async fn stream(&self) -> Result<()> {
        self.state.send_replace(SyncState::Connecting);
        let mut client = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(()),
            client = JsonRpcClient::connect(&self.endpoint, self.max_line_length) => client?,
        };

        self.state.send_replace(SyncState::Subscribing);
        let monitor_id = client
            .send_request("monitor", schema::monitor_params(&self.database))
            .await?;
        info!(monitor_id, "Monitor subscription sent");

        self.state.send_replace(SyncState::Streaming);
        loop {
            let message = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                message = client.recv() => message?,
            };
            let Some(message) = message else {
                return Err(BviewError::transport(format!(
                    "{} closed the connection",
                    self.endpoint
                )));
            };
            self.dispatch(message, monitor_id)?;

            for message in client.drain_ready().await? {
                self.dispatch(message, monitor_id)?;
            }
        }
    }

    fn dispatch(&self, message: Message, monitor_id: u64) -> Result<()> {
        match message {
            Message::Reply { result, id } if id.as_u64() == Some(monitor_id) => {
                self.processor.process_update(&result, true);
            }
            Message::Error { error, id } if id.as_u64() == Some(monitor_id) => {
                return Err(BviewError::failure(format!(
                    "monitor request rejected: {}",
                    error
                )));
            }
            Message::Notify { method, params } if method == "update" => {
                match params.as_array().map(Vec::as_slice) {
                    Some([Value::Null, updates]) => {
                        self.processor.process_update(updates, false);
                    }
                    _ => warn!("Malformed update notification"),
                }
            }
            other => debug!(?other, "Ignoring message"),
        }
        Ok(())
    }
}
