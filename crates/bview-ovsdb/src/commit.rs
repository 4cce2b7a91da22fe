//! Outbound commit path.
//!
//! Turns local writes into `transact` requests. Threshold writes come in
//! bursts, so they share one cached connection and do not wait for the
//! reply; every other commit opens its own connection and waits.
//!
//! The cached connection sits idle between bursts and nothing answers the
//! server's echo requests meanwhile, so the server may have closed it. A write
//! that fails on it is sent once more over a fresh connection.

use crate::bid::Bid;
use crate::jsonrpc::{
    check_transaction, Endpoint, JsonRpcClient, Message, DEFAULT_MAX_LINE_LENGTH,
};
use crate::monitor::ConfigRowHandle;
use crate::row_key;
use crate::schema;
use bview_types::{BstConfig, BviewError, Realm, Result};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Writes BST state to the database.
pub struct CommitPath {
    endpoint: Endpoint,
    database: String,
    reply_timeout: Duration,
    max_line_length: usize,
    config_row: ConfigRowHandle,
    threshold_conn: Mutex<Option<JsonRpcClient>>,
}

impl CommitPath {
    pub fn new(
        endpoint: Endpoint,
        database: impl Into<String>,
        reply_timeout: Duration,
        config_row: ConfigRowHandle,
    ) -> Self {
        Self {
            endpoint,
            database: database.into(),
            reply_timeout,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            config_row,
            threshold_conn: Mutex::new(None),
        }
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    async fn connect(&self) -> Result<JsonRpcClient> {
        JsonRpcClient::connect(&self.endpoint, self.max_line_length)
            .await
            .map_err(|e| {
                warn!(endpoint = %self.endpoint, error = %e, "Commit connection failed");
                e
            })
    }

    async fn transact_once(&self, params: Value) -> Result<()> {
        let mut client = self.connect().await?;
        client
            .transact_block(params, self.reply_timeout)
            .await
            .map(|_| ())
            .map_err(|e| {
                warn!(error = %e, "Transaction failed");
                e
            })
    }

    /// Writes one counter threshold without waiting for the reply.
    #[instrument(skip(self))]
    pub async fn commit_threshold(
        &self,
        asic: u32,
        port: u32,
        index: u32,
        bid: Bid,
        value: u64,
    ) -> Result<()> {
        let key = row_key::encode(bid, port, index);
        let params = schema::threshold_update(&self.database, &key, value);

        let mut conn = self.threshold_conn.lock().await;
        if let Some(client) = conn.as_mut() {
            match send_threshold(client, params.clone()).await {
                Ok(id) => {
                    debug!(row = %key, id, "Threshold committed");
                    return Ok(());
                }
                Err(e) => {
                    debug!(
                        row = %key,
                        error = %e,
                        "Cached threshold connection failed, reconnecting"
                    );
                    *conn = None;
                }
            }
        }

        let mut client = self.connect().await?;
        match send_threshold(&mut client, params).await {
            Ok(id) => {
                debug!(row = %key, id, "Threshold committed");
                *conn = Some(client);
                Ok(())
            }
            Err(e) => {
                warn!(row = %key, error = %e, "Threshold commit failed");
                Err(e)
            }
        }
    }

    /// Replaces the whole configuration map of the config row.
    #[instrument(skip(self, config))]
    pub async fn commit_config(&self, asic: u32, config: &BstConfig) -> Result<()> {
        let uuid = self
            .config_row
            .get()
            .ok_or_else(|| BviewError::not_found("BST configuration row"))?;
        self.transact_once(schema::config_update(&self.database, &uuid, config))
            .await?;
        info!(%uuid, "BST configuration committed");
        Ok(())
    }

    /// Enables or disables every realm according to the config's tracking mask.
    ///
    /// All realms go out over one connection; only the last one waits for
    /// its reply.
    #[instrument(skip(self, config), fields(mask = config.tracking_mask.bits()))]
    pub async fn commit_tracking(&self, asic: u32, config: &BstConfig) -> Result<()> {
        let realms = Realm::ALL;
        let Some((last, rest)) = realms.split_last() else {
            return Ok(());
        };
        let mut client = self.connect().await?;

        for realm in rest {
            let enabled = config.tracking_mask.is_enabled(*realm);
            client
                .transact(schema::tracking_update(&self.database, *realm, enabled))
                .await?;
        }

        let enabled = config.tracking_mask.is_enabled(*last);
        client
            .transact_block(
                schema::tracking_update(&self.database, *last, enabled),
                self.reply_timeout,
            )
            .await
            .map_err(|e| {
                warn!(error = %e, "Tracking commit failed");
                e
            })?;
        debug!("Tracking committed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn commit_clear_thresholds(&self, asic: u32) -> Result<()> {
        self.transact_once(schema::clear_thresholds(&self.database, asic))
            .await
    }

    #[instrument(skip(self))]
    pub async fn commit_clear_stats(&self, asic: u32) -> Result<()> {
        self.transact_once(schema::clear_stats(&self.database, asic))
            .await
    }
}

/// Logs replies to earlier writes, then sends `params` without waiting.
async fn send_threshold(client: &mut JsonRpcClient, params: Value) -> Result<u64> {
    log_replies(client.drain_ready().await?);
    client.transact(params).await
}

fn log_replies(replies: Vec<Message>) {
    for reply in replies {
        match reply {
            Message::Reply { result, id } => {
                if check_transaction(&result).is_err() {
                    warn!(%id, "Earlier threshold transaction failed");
                }
            }
            Message::Error { error, id } => warn!(%id, %error, "Threshold request rejected"),
            other => debug!(?other, "Ignoring message on threshold connection"),
        }
    }
}
