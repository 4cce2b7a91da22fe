//! OVSDB south-bound plugin for BroadView
//!
//! This crate mirrors the switch database's buffer-monitoring tables into
//! an in-memory BST cache and serves the redirector's BST and System
//! features from it.
//!
//! - [`bid`]: static table of countable resources and their layout
//! - [`row_key`]: `<realm>/<counter>/<index1>/<index2>` row identifiers
//! - [`cache`]: per-ASIC counter and configuration store
//! - [`jsonrpc`]: newline-delimited JSON-RPC client over unix/tcp sockets
//! - [`monitor`]: inbound sync engine (`monitor` + `update`)
//! - [`commit`]: outbound `transact` path
//! - [`plugin`]: composition root producing a registrable [`Plugin`](bview_redirector::Plugin)
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐  monitor/update  ┌──────────────┐      ┌──────────────┐
//! │    OVSDB      │ ───────────────▶ │  SyncEngine  │ ───▶ │   BstCache   │
//! │ bufmon/System │                  └──────────────┘      └──────┬───────┘
//! │               │     transact     ┌──────────────┐             │
//! │               │ ◀─────────────── │  CommitPath  │ ◀── OvsdbBstFeature
//! └───────────────┘                  └──────────────┘
//! ```
//!
//! 1. [`OvsdbPlugin::start`] discovers the port count and spawns the sync engine
//! 2. The engine applies the initial snapshot, then every `update` notification
//! 3. Triggers and configuration changes are published as [`BstEvent`](bview_types::BstEvent)s
//! 4. Local writes go out through [`CommitPath`] and come back through the monitor

pub mod bid;
pub mod bst_feature;
pub mod cache;
pub mod commit;
pub mod config;
pub mod jsonrpc;
pub mod monitor;
pub mod plugin;
pub mod row_key;
pub mod schema;
pub mod snapshot;
pub mod system_feature;

pub use bid::{Bid, BidDescriptor, BidLayout};
pub use bst_feature::OvsdbBstFeature;
pub use cache::{BstCache, CounterEntry};
pub use commit::CommitPath;
pub use config::{BviewConfig, DEFAULT_CONFIG_PATH};
pub use jsonrpc::{Endpoint, JsonRpcClient, Message};
pub use monitor::{ConfigRowHandle, SyncEngine, SyncHandle, SyncState, UpdateProcessor};
pub use plugin::{OvsdbPlugin, PLUGIN_NAME};
pub use row_key::RowKey;
pub use system_feature::OvsdbSystemFeature;
