//! Newline-delimited JSON-RPC client.
//!
//! Each message is one JSON object on its own line. The client numbers
//! its requests, answers the server's `echo` requests on its own and offers
//! both fire-and-forget and blocking request styles.

use bview_types::{BviewError, Result};
use futures::{FutureExt, SinkExt, StreamExt};
use serde_json::{json, Value};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, warn};

/// Longest message accepted when the caller has no configured limit.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

/// Where the database listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    /// `host:port`
    Tcp(String),
}

impl Endpoint {
    /// Parses `unix:<path>`, `tcp:<host>:<port>` or a bare absolute path.
    pub fn parse(s: &str) -> Result<Self> {
        if let Some(path) = s.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(BviewError::invalid_parameter("empty unix socket path"));
            }
            Ok(Endpoint::Unix(PathBuf::from(path)))
        } else if let Some(addr) = s.strip_prefix("tcp:") {
            match addr.rsplit_once(':') {
                Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                    Ok(Endpoint::Tcp(addr.to_string()))
                }
                _ => Err(BviewError::invalid_parameter(format!(
                    "bad tcp endpoint {}",
                    s
                ))),
            }
        } else if s.starts_with('/') {
            Ok(Endpoint::Unix(PathBuf::from(s)))
        } else {
            Err(BviewError::invalid_parameter(format!("bad endpoint {}", s)))
        }
    }

    async fn connect(&self) -> Result<Box<dyn Transport>> {
        match self {
            Endpoint::Unix(path) => Ok(Box::new(UnixStream::connect(path).await?)),
            Endpoint::Tcp(addr) => Ok(Box::new(TcpStream::connect(addr.as_str()).await?)),
        }
    }
}

impl FromStr for Endpoint {
    type Err = BviewError;

    fn from_str(s: &str) -> Result<Self> {
        Endpoint::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "tcp:{}", addr),
        }
    }
}

trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

/// One JSON-RPC message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request {
        method: String,
        params: Value,
        id: Value,
    },
    Notify {
        method: String,
        params: Value,
    },
    Reply {
        result: Value,
        id: Value,
    },
    Error {
        error: Value,
        id: Value,
    },
}

impl Message {
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut obj) = value else {
            return Err(BviewError::invalid_parameter("JSON-RPC message is not an object"));
        };
        let id = obj.remove("id").unwrap_or(Value::Null);

        if let Some(method) = obj.remove("method") {
            let Value::String(method) = method else {
                return Err(BviewError::invalid_parameter("JSON-RPC method is not a string"));
            };
            let params = obj.remove("params").unwrap_or(Value::Null);
            return Ok(if id.is_null() {
                Message::Notify { method, params }
            } else {
                Message::Request { method, params, id }
            });
        }

        match (obj.remove("result"), obj.remove("error")) {
            (_, Some(error)) if !error.is_null() => Ok(Message::Error { error, id }),
            (Some(result), _) => Ok(Message::Reply { result, id }),
            _ => Err(BviewError::invalid_parameter(
                "JSON-RPC message has neither method nor result",
            )),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Message::Request { method, params, id } => {
                json!({"method": method, "params": params, "id": id})
            }
            Message::Notify { method, params } => {
                json!({"method": method, "params": params, "id": null})
            }
            Message::Reply { result, id } => json!({"result": result, "error": null, "id": id}),
            Message::Error { error, id } => json!({"result": null, "error": error, "id": id}),
        }
    }

    /// Id of a reply or error reply.
    pub fn reply_id(&self) -> Option<&Value> {
        match self {
            Message::Reply { id, .. } | Message::Error { id, .. } => Some(id),
            _ => None,
        }
    }
}

fn codec_error(e: LinesCodecError) -> BviewError {
    BviewError::transport(e.to_string())
}

/// Connection to a JSON-RPC server.
pub struct JsonRpcClient {
    endpoint: Endpoint,
    framed: Framed<Box<dyn Transport>, LinesCodec>,
    next_id: u64,
}

impl JsonRpcClient {
    /// Connects to `endpoint`. Lines longer than `max_line_length` bytes
    /// fail the receive with a transport error.
    pub async fn connect(endpoint: &Endpoint, max_line_length: usize) -> Result<Self> {
        let stream = endpoint.connect().await?;
        debug!(%endpoint, max_line_length, "Connected to JSON-RPC server");
        Ok(Self {
            endpoint: endpoint.clone(),
            framed: Framed::new(stream, LinesCodec::new_with_max_length(max_line_length)),
            next_id: 0,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub async fn send(&mut self, message: &Message) -> Result<()> {
        self.framed
            .send(message.to_value().to_string())
            .await
            .map_err(codec_error)
    }

    /// Sends a request and returns its id without waiting for the reply.
    pub async fn send_request(&mut self, method: &str, params: Value) -> Result<u64> {
        let id = self.next_id;
        self.next_id += 1;
        self.send(&Message::Request {
            method: method.to_string(),
            params,
            id: Value::from(id),
        })
        .await?;
        Ok(id)
    }

    pub async fn notify(&mut self, method: &str, params: Value) -> Result<()> {
        self.send(&Message::Notify {
            method: method.to_string(),
            params,
        })
        .await
    }

    /// Answers `echo` requests; returns the message if the caller should see it.
    async fn filter(&mut self, line: &str) -> Result<Option<Message>> {
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Discarding malformed JSON-RPC line");
                return Ok(None);
            }
        };
        let message = match Message::from_value(value) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "Discarding invalid JSON-RPC message");
                return Ok(None);
            }
        };

        if let Message::Request { method, params, id } = &message {
            if method == "echo" {
                let reply = Message::Reply {
                    result: params.clone(),
                    id: id.clone(),
                };
                self.send(&reply).await?;
                return Ok(None);
            }
        }
        Ok(Some(message))
    }

    /// Waits for the next message. Returns `None` when the server closes
    /// the connection.
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        loop {
            let Some(line) = self.framed.next().await else {
                return Ok(None);
            };
            if let Some(message) = self.filter(&line.map_err(codec_error)?).await? {
                return Ok(Some(message));
            }
        }
    }

    /// Returns already-buffered messages without waiting for more.
    pub async fn drain_ready(&mut self) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        while let Some(next) = self.framed.next().now_or_never() {
            let Some(line) = next else {
                return Err(BviewError::transport(format!(
                    "{} closed the connection",
                    self.endpoint
                )));
            };
            if let Some(message) = self.filter(&line.map_err(codec_error)?).await? {
                messages.push(message);
            }
        }
        Ok(messages)
    }

    /// Sends a request and waits for its reply.
    ///
    /// Unrelated messages received meanwhile are discarded.
    pub async fn request_block(
        &mut self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value> {
        let id = self.send_request(method, params).await?;
        tokio::time::timeout(timeout, self.wait_reply(method, id))
            .await
            .map_err(|_| {
                BviewError::transport(format!("{} reply timed out after {:?}", method, timeout))
            })?
    }

    async fn wait_reply(&mut self, method: &str, id: u64) -> Result<Value> {
        loop {
            match self.recv().await? {
                None => {
                    return Err(BviewError::transport(format!(
                        "{} closed the connection",
                        self.endpoint
                    )))
                }
                Some(Message::Reply { result, id: rid }) if rid.as_u64() == Some(id) => {
                    return Ok(result)
                }
                Some(Message::Error { error, id: rid }) if rid.as_u64() == Some(id) => {
                    return Err(BviewError::failure(format!("{} failed: {}", method, error)))
                }
                Some(other) => debug!(?other, "Discarding unrelated message"),
            }
        }
    }

    /// Runs a transaction and waits for its outcome.
    pub async fn transact_block(&mut self, params: Value, timeout: Duration) -> Result<Value> {
        let result = self.request_block("transact", params, timeout).await?;
        check_transaction(&result)?;
        Ok(result)
    }

    /// Sends a transaction without waiting for the reply.
    pub async fn transact(&mut self, params: Value) -> Result<u64> {
        self.send_request("transact", params).await
    }
}

/// Fails if any operation result of a transaction carries an `error` member.
pub fn check_transaction(result: &Value) -> Result<()> {
    let Some(ops) = result.as_array() else {
        return Ok(());
    };
    for op in ops {
        if let Some(error) = op.get("error") {
            let details = op.get("details").and_then(Value::as_str).unwrap_or("");
            warn!(%error, details, "Transaction failed");
            return Err(BviewError::failure(format!(
                "transaction error {} {}",
                error, details
            )));
        }
    }
    Ok(())
}
