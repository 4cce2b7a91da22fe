//! Configuration file support for bviewd
//!
//! Loads and validates daemon configuration from TOML files.
//! Default location: /etc/bview/bviewd.toml

use crate::jsonrpc::{Endpoint, DEFAULT_MAX_LINE_LENGTH};
use bview_types::{AsicType, BviewError, Result, MAX_PORTS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/bview/bviewd.toml";

/// Database connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OvsdbConfig {
    /// `unix:<path>`, `tcp:<host>:<port>` or an absolute socket path
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Database name used in every request
    #[serde(default = "default_database")]
    pub database: String,

    /// Bound on discovery and on the wait for the first snapshot, in seconds
    #[serde(default = "default_init_timeout")]
    pub init_timeout_secs: u64,

    /// Bound on each blocking request, in seconds
    #[serde(default = "default_reply_timeout")]
    pub reply_timeout_secs: u64,

    /// Delay between discovery polls, in milliseconds
    #[serde(default = "default_discovery_retry")]
    pub discovery_retry_ms: u64,

    /// Longest JSON-RPC message accepted from the database, in bytes
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

/// Platform configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Interface whose addresses identify the agent
    #[serde(default = "default_management_interface")]
    pub management_interface: String,

    /// Silicon family of unit 0
    #[serde(default = "default_asic_type")]
    pub asic_type: String,

    /// Port count; skips discovery when set
    #[serde(default)]
    pub num_ports: Option<usize>,
}

/// Complete bviewd configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BviewConfig {
    #[serde(default)]
    pub ovsdb: OvsdbConfig,

    #[serde(default)]
    pub system: SystemConfig,
}

// Default functions
fn default_endpoint() -> String {
    "unix:/var/run/openvswitch/db.sock".to_string()
}

fn default_database() -> String {
    "OpenSwitch".to_string()
}

fn default_init_timeout() -> u64 {
    40
}

fn default_reply_timeout() -> u64 {
    10
}

fn default_discovery_retry() -> u64 {
    1000
}

fn default_max_message_bytes() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}

fn default_management_interface() -> String {
    "eth0".to_string()
}

fn default_asic_type() -> String {
    "td2".to_string()
}

impl Default for OvsdbConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            database: default_database(),
            init_timeout_secs: default_init_timeout(),
            reply_timeout_secs: default_reply_timeout(),
            discovery_retry_ms: default_discovery_retry(),
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            management_interface: default_management_interface(),
            asic_type: default_asic_type(),
            num_ports: None,
        }
    }
}

impl BviewConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                BviewError::invalid_parameter(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(BviewError::failure(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub fn endpoint(&self) -> Result<Endpoint> {
        Endpoint::parse(&self.ovsdb.endpoint)
    }

    pub fn asic_type(&self) -> Result<AsicType> {
        Ok(self.system.asic_type.parse()?)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.ovsdb.init_timeout_secs)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.ovsdb.reply_timeout_secs)
    }

    pub fn max_message_bytes(&self) -> usize {
        self.ovsdb.max_message_bytes
    }

    pub fn discovery_retry(&self) -> Duration {
        Duration::from_millis(self.ovsdb.discovery_retry_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.ovsdb.init_timeout_secs == 0 || self.ovsdb.reply_timeout_secs == 0 {
            return Err(BviewError::invalid_parameter("timeouts must be > 0"));
        }

        if self.ovsdb.max_message_bytes == 0 {
            return Err(BviewError::invalid_parameter("max_message_bytes must be > 0"));
        }

        if self.ovsdb.database.is_empty() {
            return Err(BviewError::invalid_parameter("database must not be empty"));
        }

        if let Some(ports) = self.system.num_ports {
            if ports == 0 || ports > MAX_PORTS {
                return Err(BviewError::invalid_parameter(format!(
                    "num_ports must be 1-{}",
                    MAX_PORTS
                )));
            }
        }

        self.endpoint()?;
        self.asic_type()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = BviewConfig::default();
        assert_eq!(config.ovsdb.endpoint, "unix:/var/run/openvswitch/db.sock");
        assert_eq!(config.ovsdb.database, "OpenSwitch");
        assert_eq!(config.init_timeout(), Duration::from_secs(40));
        assert_eq!(config.system.management_interface, "eth0");
        assert_eq!(config.ovsdb.max_message_bytes, DEFAULT_MAX_LINE_LENGTH);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
[ovsdb]
endpoint = "tcp:127.0.0.1:6640"

[system]
asic_type = "th"
num_ports = 32
"#;
        let config: BviewConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.endpoint().unwrap(),
            Endpoint::Tcp("127.0.0.1:6640".to_string())
        );
        assert_eq!(config.asic_type().unwrap(), AsicType::TH);
        assert_eq!(config.system.num_ports, Some(32));
        // Unspecified values should use defaults
        assert_eq!(config.ovsdb.reply_timeout_secs, 10);
        assert_eq!(config.discovery_retry(), Duration::from_millis(1000));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = BviewConfig::default();
        config.ovsdb.init_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = BviewConfig::default();
        config.ovsdb.endpoint = "db.sock".to_string();
        assert!(config.validate().is_err());

        let mut config = BviewConfig::default();
        config.system.asic_type = "jericho".to_string();
        assert!(config.validate().is_err());

        let mut config = BviewConfig::default();
        config.system.num_ports = Some(MAX_PORTS + 1);
        assert!(config.validate().is_err());

        let mut config = BviewConfig::default();
        config.ovsdb.max_message_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ovsdb]\ndatabase = \"Test\"").unwrap();
        let config = BviewConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.ovsdb.database, "Test");

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "[ovsdb\n").unwrap();
        assert!(BviewConfig::load_or_default(bad.path()).is_err());
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = BviewConfig::load_or_default("/nonexistent/bviewd.toml").unwrap();
        assert_eq!(config, BviewConfig::default());
    }
}
