//! OVSDB table names, columns and request payloads.

use bview_types::{BstConfig, Realm, TrackingMode};
use serde_json::{json, Value};
use uuid::Uuid;

/// Counter table.
pub const BUFMON_TABLE: &str = "bufmon";
/// Table holding the BST configuration row.
pub const SYSTEM_TABLE: &str = "System";
pub const SUBSYSTEM_TABLE: &str = "Subsystem";

pub const BUFMON_COLUMNS: [&str; 8] = [
    "counter_value",
    "counter_vendor_specific_info",
    "enabled",
    "hw_unit_id",
    "name",
    "status",
    "trigger_threshold",
    "_version",
];

pub const BUFMON_CONFIG_COLUMN: &str = "bufmon_config";
pub const BUFMON_INFO_COLUMN: &str = "bufmon_info";

/// Keys of the configuration map column.
pub mod config_key {
    pub const ENABLED: &str = "enabled";
    pub const COUNTERS_MODE: &str = "counters_mode";
    pub const PERIODIC_COLLECTION: &str = "periodic_collection_enabled";
    pub const SNAPSHOT_ON_TRIGGER: &str = "snapshot_on_threshold_trigger";
    pub const COLLECTION_PERIOD: &str = "collection_period";
    pub const TRIGGER_RATE_LIMIT: &str = "threshold_trigger_rate_limit";
    pub const TRIGGER_COLLECTION: &str = "threshold_trigger_collection_enabled";
}

/// Value of `status` for a counter that crossed its threshold.
pub const STATUS_TRIGGERED: &str = "triggered";

/// OVSDB empty set, used to clear an optional column.
pub fn empty_set() -> Value {
    json!(["set", []])
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// `monitor` params subscribing to counters and configuration.
pub fn monitor_params(database: &str) -> Value {
    json!([
        database,
        null,
        {
            BUFMON_TABLE: [{"columns": BUFMON_COLUMNS}],
            SYSTEM_TABLE: [
                {"columns": [BUFMON_CONFIG_COLUMN]},
                {"columns": [BUFMON_INFO_COLUMN]}
            ]
        }
    ])
}

/// Sets the threshold of the counter row named `row_key`.
pub fn threshold_update(database: &str, row_key: &str, value: u64) -> Value {
    json!([
        database,
        {
            "op": "update",
            "table": BUFMON_TABLE,
            "row": {"trigger_threshold": value},
            "where": [["name", "==", row_key]]
        }
    ])
}

/// The configuration map exactly as stored in the `bufmon_config` column.
pub fn config_map(config: &BstConfig) -> Value {
    let mode = match config.tracking_mode {
        TrackingMode::Peak => "peak",
        TrackingMode::Current => "current",
    };
    json!([
        "map",
        [
            [config_key::ENABLED, bool_str(config.enabled)],
            [config_key::COUNTERS_MODE, mode],
            [config_key::PERIODIC_COLLECTION, bool_str(config.periodic_collection)],
            [config_key::SNAPSHOT_ON_TRIGGER, bool_str(config.send_snapshot_on_trigger)],
            [config_key::COLLECTION_PERIOD, config.collection_interval_secs.to_string()],
            [config_key::TRIGGER_RATE_LIMIT, config.max_triggers.to_string()],
            [config_key::TRIGGER_COLLECTION, bool_str(config.trigger_collection_enabled)]
        ]
    ])
}

/// Replaces the whole configuration map of the row `uuid`.
pub fn config_update(database: &str, uuid: &Uuid, config: &BstConfig) -> Value {
    json!([
        database,
        {
            "op": "update",
            "table": SYSTEM_TABLE,
            "row": {BUFMON_CONFIG_COLUMN: config_map(config)},
            "where": [["_uuid", "==", ["uuid", uuid.to_string()]]]
        }
    ])
}

fn unit_update(database: &str, row: Value, asic: u32) -> Value {
    json!([
        database,
        {
            "op": "update",
            "table": BUFMON_TABLE,
            "row": row,
            "where": [["hw_unit_id", "==", asic]]
        }
    ])
}

/// Resets every threshold of a unit to unset.
pub fn clear_thresholds(database: &str, asic: u32) -> Value {
    unit_update(database, json!({"trigger_threshold": empty_set()}), asic)
}

/// Zeroes every counter of a unit.
pub fn clear_stats(database: &str, asic: u32) -> Value {
    unit_update(database, json!({"counter_value": 0}), asic)
}

/// Enables or disables every counter row of a realm.
///
/// The filter matches on the vendor info map rather than a key, so one
/// operation covers all rows of the realm.
pub fn tracking_update(database: &str, realm: Realm, enabled: bool) -> Value {
    let value = if enabled { json!(true) } else { empty_set() };
    json!([
        database,
        {
            "op": "update",
            "table": BUFMON_TABLE,
            "row": {"enabled": value},
            "where": [[
                "counter_vendor_specific_info",
                "includes",
                ["map", [["realm", realm.name()]]]
            ]]
        }
    ])
}

/// Reads `System.cur_cfg`.
pub fn select_cur_cfg(database: &str) -> Value {
    json!([
        database,
        {"op": "select", "table": SYSTEM_TABLE, "where": [], "columns": ["cur_cfg"]}
    ])
}

/// Reads `Subsystem.other_info`.
pub fn select_subsystem_info(database: &str) -> Value {
    json!([
        database,
        {"op": "select", "table": SUBSYSTEM_TABLE, "where": [], "columns": ["other_info"]}
    ])
}

/// Iterates the pairs of an OVSDB `["map", [[k, v], ...]]` value.
pub fn map_pairs(value: &Value) -> impl Iterator<Item = (&str, &Value)> {
    value
        .as_array()
        .filter(|a| a.len() == 2 && a[0] == "map")
        .and_then(|a| a[1].as_array())
        .into_iter()
        .flatten()
        .filter_map(|pair| {
            let pair = pair.as_array()?;
            match pair.as_slice() {
                [Value::String(k), v] => Some((k.as_str(), v)),
                _ => None,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_monitor_params() {
        let params = monitor_params("OpenSwitch");
        assert_eq!(params[0], "OpenSwitch");
        assert!(params[1].is_null());
        assert_eq!(params[2]["bufmon"][0]["columns"].as_array().unwrap().len(), 8);
        assert_eq!(params[2]["System"][0]["columns"], json!(["bufmon_config"]));
        assert_eq!(params[2]["System"][1]["columns"], json!(["bufmon_info"]));
    }

    #[test]
    fn test_threshold_update() {
        let params = threshold_update("OpenSwitch", "egress-uc-queue/uc-buffer-count/5/NONE", 4096);
        assert_eq!(
            params,
            json!([
                "OpenSwitch",
                {
                    "op": "update",
                    "table": "bufmon",
                    "row": {"trigger_threshold": 4096},
                    "where": [["name", "==", "egress-uc-queue/uc-buffer-count/5/NONE"]]
                }
            ])
        );
    }

    #[test]
    fn test_config_map() {
        let config = BstConfig {
            enabled: true,
            tracking_mode: TrackingMode::Peak,
            collection_interval_secs: 30,
            max_triggers: 5,
            trigger_collection_enabled: true,
            ..Default::default()
        };
        let map: Vec<(String, Value)> = map_pairs(&config_map(&config))
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        assert_eq!(map.len(), 7);
        assert_eq!(map[0], ("enabled".to_string(), json!("true")));
        assert_eq!(map[1], ("counters_mode".to_string(), json!("peak")));
        assert_eq!(map[4], ("collection_period".to_string(), json!("30")));
        assert_eq!(map[5], ("threshold_trigger_rate_limit".to_string(), json!("5")));
    }

    #[test]
    fn test_config_update_targets_uuid() {
        let uuid = Uuid::parse_str("0c1f4a3e-8d46-4c83-9e2a-5c1f0e4c9b11").unwrap();
        let params = config_update("OpenSwitch", &uuid, &BstConfig::default());
        assert_eq!(params[1]["table"], "System");
        assert_eq!(
            params[1]["where"],
            json!([["_uuid", "==", ["uuid", "0c1f4a3e-8d46-4c83-9e2a-5c1f0e4c9b11"]]])
        );
    }

    #[test]
    fn test_tracking_update() {
        let on = tracking_update("OpenSwitch", Realm::EgressCpuQueue, true);
        assert_eq!(on[1]["row"], json!({"enabled": true}));
        assert_eq!(
            on[1]["where"][0][2],
            json!(["map", [["realm", "egress-cpu-queue"]]])
        );
        let off = tracking_update("OpenSwitch", Realm::EgressCpuQueue, false);
        assert_eq!(off[1]["row"], json!({"enabled": ["set", []]}));
    }

    #[test]
    fn test_clear_payloads() {
        assert_eq!(
            clear_thresholds("OpenSwitch", 0)[1]["row"],
            json!({"trigger_threshold": ["set", []]})
        );
        let stats = clear_stats("OpenSwitch", 0);
        assert_eq!(stats[1]["row"], json!({"counter_value": 0}));
        assert_eq!(stats[1]["where"], json!([["hw_unit_id", "==", 0]]));
    }

    #[test]
    fn test_map_pairs_ignores_non_maps() {
        assert_eq!(map_pairs(&json!(["set", []])).count(), 0);
        assert_eq!(map_pairs(&json!("x")).count(), 0);
        let map = json!(["map", [["a", "1"], ["b"], [2, "x"]]]);
        let pairs: Vec<_> = map_pairs(&map).collect();
        assert_eq!(pairs, vec![("a", &json!("1"))]);
    }
}
