//! In-process OVSDB stand-in speaking newline-delimited JSON-RPC.

#![allow(dead_code)]

use bview_ovsdb::BviewConfig;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const CONFIG_UUID: &str = "0f8e7d6c-5b4a-4392-8170-6f5e4d3c2b1a";

struct State {
    initial: Value,
    cur_cfg: Mutex<i64>,
    interface_count: Mutex<String>,
    requests: Mutex<Vec<(String, Value)>>,
    monitors: Mutex<Vec<mpsc::UnboundedSender<String>>>,
    connections: AtomicUsize,
}

impl State {
    fn transact_result(&self, params: &Value) -> Value {
        let ops = params
            .as_array()
            .map(|a| a[1..].to_vec())
            .unwrap_or_default();
        let results: Vec<Value> = ops
            .iter()
            .map(|op| match (op["op"].as_str(), op["table"].as_str()) {
                (Some("select"), Some("System")) => {
                    json!({"rows": [{"cur_cfg": *self.cur_cfg.lock().unwrap()}]})
                }
                (Some("select"), Some("Subsystem")) => json!({"rows": [{"other_info": [
                    "map",
                    [["interface_count", self.interface_count.lock().unwrap().clone()]]
                ]}]}),
                _ => json!({"count": 1}),
            })
            .collect();
        Value::Array(results)
    }
}

/// Mock database listening on a unix socket in a temporary directory.
pub struct MockOvsdb {
    _dir: TempDir,
    path: PathBuf,
    state: Arc<State>,
    task: JoinHandle<()>,
}

impl MockOvsdb {
    /// Starts the server; `initial` is the reply to every `monitor` request.
    pub fn start(initial: Value) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let state = Arc::new(State {
            initial,
            cur_cfg: Mutex::new(1),
            interface_count: Mutex::new("32".to_string()),
            requests: Mutex::new(Vec::new()),
            monitors: Mutex::new(Vec::new()),
            connections: AtomicUsize::new(0),
        });

        let accept_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_state.connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(stream, Arc::clone(&accept_state)));
            }
        });

        Self {
            _dir: dir,
            path,
            state,
            task,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("unix:{}", self.path.display())
    }

    /// Daemon configuration pointing at this server.
    pub fn config(&self) -> BviewConfig {
        let mut config = BviewConfig::default();
        config.ovsdb.endpoint = self.endpoint();
        config.ovsdb.init_timeout_secs = 5;
        config.ovsdb.reply_timeout_secs = 2;
        config.ovsdb.discovery_retry_ms = 20;
        config.system.num_ports = Some(32);
        config
    }

    pub fn set_cur_cfg(&self, cur_cfg: i64) {
        *self.state.cur_cfg.lock().unwrap() = cur_cfg;
    }

    pub fn set_interface_count(&self, count: &str) {
        *self.state.interface_count.lock().unwrap() = count.to_string();
    }

    /// Sends an `update` notification to every monitoring connection.
    pub fn push_update(&self, updates: Value) {
        let line = json!({"method": "update", "params": [null, updates], "id": null}).to_string();
        for monitor in self.state.monitors.lock().unwrap().iter() {
            let _ = monitor.send(line.clone());
        }
    }

    /// Number of accepted connections so far.
    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Params of every `transact` request that is not a select.
    pub fn writes(&self) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|(method, params)| method == "transact" && params[1]["op"] != "select")
            .map(|(_, params)| params)
            .collect()
    }

    /// Waits until at least `count` write transactions arrived.
    pub async fn wait_for_writes(&self, count: usize) -> Vec<Value> {
        for _ in 0..200 {
            let writes = self.writes();
            if writes.len() >= count {
                return writes;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} writes, got {:?}", count, self.writes());
    }
}

impl Drop for MockOvsdb {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(stream: UnixStream, state: Arc<State>) {
    let (read, mut write) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if write.write_all(format!("{}\n", line).as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(read).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Ok(request) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        let Some(method) = request["method"].as_str().map(str::to_string) else {
            continue;
        };
        let params = request["params"].clone();
        state
            .requests
            .lock()
            .unwrap()
            .push((method.clone(), params.clone()));

        let result = match method.as_str() {
            "monitor" => state.initial.clone(),
            "transact" => state.transact_result(&params),
            "echo" => params,
            _ => Value::Null,
        };
        let reply = json!({"result": result, "error": null, "id": request["id"]});
        let _ = tx.send(reply.to_string());
        if method == "monitor" {
            state.monitors.lock().unwrap().push(tx.clone());
        }
    }
}

/// `System` table update carrying the BST configuration map.
pub fn config_table(pairs: &[(&str, &str)]) -> Value {
    let map: Vec<Value> = pairs.iter().map(|(k, v)| json!([k, v])).collect();
    json!({ CONFIG_UUID: {"new": {"bufmon_config": ["map", map]}} })
}

/// One `bufmon` row.
pub fn counter_row(name: &str, value: u64, threshold: Option<u64>, enabled: bool) -> Value {
    let mut row = json!({
        "hw_unit_id": 0,
        "name": name,
        "counter_value": value,
        "enabled": enabled,
        "status": "ok"
    });
    if let Some(threshold) = threshold {
        row["trigger_threshold"] = json!(threshold);
    }
    row
}

/// `bufmon` table update with one synthetic row UUID per row.
pub fn counter_table(rows: Vec<Value>) -> Value {
    let mut table = serde_json::Map::new();
    for (i, row) in rows.into_iter().enumerate() {
        table.insert(
            format!("00000000-0000-4000-8000-{:012x}", i + 1),
            json!({"new": row}),
        );
    }
    Value::Object(table)
}

/// Full `<table-updates>` object.
pub fn table_updates(config: Option<Value>, rows: Vec<Value>) -> Value {
    let mut updates = serde_json::Map::new();
    if let Some(config) = config {
        updates.insert("System".to_string(), config);
    }
    if !rows.is_empty() {
        updates.insert("bufmon".to_string(), counter_table(rows));
    }
    Value::Object(updates)
}

/// Waits for the cache to reflect an asynchronous update.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}
