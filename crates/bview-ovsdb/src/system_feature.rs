//! OVSDB-backed System feature and ASIC discovery.

use crate::jsonrpc::{Endpoint, JsonRpcClient};
use crate::schema;
use crate::snapshot::build_snapshot;
use bview_redirector::SystemFeature;
use bview_types::{
    Asic, AsicCapabilities, AsicType, BstSnapshot, BviewError, FeatureId, FeatureMask,
    MacAddress, Result, Timestamped, MAX_PORTS,
};
use serde_json::Value;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const PLUGIN_SYSTEM_NAME: &str = "OVSDB-PLUGIN";
pub const NETWORK_OS: &str = "ovsdb";

/// Platform identity and the ASIC list of an OVSDB-managed switch.
pub struct OvsdbSystemFeature {
    interface: String,
    asics: Vec<Asic>,
}

impl OvsdbSystemFeature {
    /// Describes a single-ASIC switch.
    pub fn new(interface: impl Into<String>, asic_type: AsicType, num_ports: usize) -> Self {
        Self {
            interface: interface.into(),
            asics: vec![Asic {
                unit: 0,
                asic_type,
                capabilities: AsicCapabilities::trident2(num_ports),
            }],
        }
    }

    fn asic(&self, unit: u32) -> Result<&Asic> {
        self.asics
            .iter()
            .find(|a| a.unit == unit)
            .ok_or_else(|| BviewError::invalid_parameter(format!("unknown ASIC unit {}", unit)))
    }
}

impl SystemFeature for OvsdbSystemFeature {
    fn asics(&self) -> Vec<Asic> {
        self.asics.clone()
    }

    fn feature_mask(&self) -> FeatureMask {
        FeatureMask::empty()
            .with(FeatureId::System)
            .with(FeatureId::Bst)
    }

    fn name(&self) -> Result<String> {
        Ok(PLUGIN_SYSTEM_NAME.to_string())
    }

    fn mac(&self) -> Result<MacAddress> {
        iface::mac(&self.interface)
    }

    fn ip4(&self) -> Result<Ipv4Addr> {
        iface::ip4(&self.interface)
    }

    /// Application ASIC ids start at "1".
    fn asic_translate_from_notation(&self, src: &str) -> Result<u32> {
        let id: u32 = src
            .trim()
            .parse()
            .map_err(|_| BviewError::invalid_parameter(format!("bad ASIC id '{}'", src)))?;
        let unit = id
            .checked_sub(1)
            .ok_or_else(|| BviewError::invalid_parameter(format!("bad ASIC id '{}'", src)))?;
        self.asic(unit)?;
        Ok(unit)
    }

    fn asic_translate_to_notation(&self, asic: u32) -> Result<String> {
        self.asic(asic)?;
        Ok((asic + 1).to_string())
    }

    fn port_translate_from_notation(&self, src: &str) -> Result<u32> {
        src.trim()
            .parse()
            .map_err(|_| BviewError::invalid_parameter(format!("bad port '{}'", src)))
    }

    fn port_translate_to_notation(&self, asic: u32, port: u32) -> Result<String> {
        self.asic(asic)?;
        Ok(port.to_string())
    }

    fn lag_translate_to_notation(&self, asic: u32, lag: u32) -> Result<String> {
        self.asic(asic)?;
        Ok(lag.to_string())
    }

    fn network_os(&self) -> Result<String> {
        Ok(NETWORK_OS.to_string())
    }

    fn uid(&self) -> Result<String> {
        Ok(self.mac()?.to_uid())
    }

    fn max_buf_snapshot_get(&self, asic: u32) -> Result<Timestamped<BstSnapshot>> {
        let caps = &self.asic(asic)?.capabilities;
        let snapshot = build_snapshot(caps, &mut |bid, _, _| {
            Ok(bid.descriptor().default_threshold)
        })?;
        Ok(Timestamped::now(snapshot))
    }
}

#[cfg(target_os = "linux")]
mod iface {
    use bview_types::{BviewError, MacAddress, Result};
    use nix::ifaddrs::getifaddrs;
    use nix::sys::socket::SockaddrStorage;
    use std::net::{Ipv4Addr, SocketAddrV4};

    fn lookup<T>(
        name: &str,
        what: &str,
        pick: impl Fn(&SockaddrStorage) -> Option<T>,
    ) -> Result<T> {
        let addrs = getifaddrs()
            .map_err(|e| BviewError::failure(format!("getifaddrs failed: {}", e)))?;
        addrs
            .filter(|ifa| ifa.interface_name == name)
            .find_map(|ifa| ifa.address.as_ref().and_then(&pick))
            .ok_or_else(|| BviewError::not_found(format!("{} of interface {}", what, name)))
    }

    pub fn mac(name: &str) -> Result<MacAddress> {
        lookup(name, "MAC address", |addr| {
            addr.as_link_addr().and_then(|l| l.addr()).map(MacAddress::new)
        })
    }

    pub fn ip4(name: &str) -> Result<Ipv4Addr> {
        lookup(name, "IPv4 address", |addr| {
            addr.as_sockaddr_in().map(|sin| *SocketAddrV4::from(*sin).ip())
        })
    }
}

#[cfg(not(target_os = "linux"))]
mod iface {
    use bview_types::{BviewError, MacAddress, Result};
    use std::net::Ipv4Addr;

    pub fn mac(_name: &str) -> Result<MacAddress> {
        Err(BviewError::unsupported("interface MAC lookup"))
    }

    pub fn ip4(_name: &str) -> Result<Ipv4Addr> {
        Err(BviewError::unsupported("interface IPv4 lookup"))
    }
}

fn first_row(result: &Value) -> Option<&Value> {
    result.get(0)?.get("rows")?.get(0)
}

/// Extracts `cur_cfg` from a select result.
fn parse_cur_cfg(result: &Value) -> Option<i64> {
    first_row(result)?.get("cur_cfg")?.as_i64()
}

/// Extracts `interface_count` from a select on `Subsystem.other_info`.
fn parse_interface_count(result: &Value) -> Option<usize> {
    let rows = result.get(0)?.get("rows")?.as_array()?;
    rows.iter()
        .filter_map(|row| row.get("other_info"))
        .flat_map(schema::map_pairs)
        .find(|(k, _)| *k == "interface_count")
        .and_then(|(_, v)| v.as_str()?.trim().parse().ok())
}

async fn poll_cur_cfg(
    endpoint: &Endpoint,
    database: &str,
    reply_timeout: Duration,
    max_line_length: usize,
) -> Result<i64> {
    let mut client = JsonRpcClient::connect(endpoint, max_line_length).await?;
    let result = client
        .transact_block(schema::select_cur_cfg(database), reply_timeout)
        .await?;
    Ok(parse_cur_cfg(&result).unwrap_or(0))
}

/// Waits for the switch configuration to settle and reads its port count.
///
/// `System.cur_cfg` is polled every `retry` until it is non-zero; the
/// whole wait is bounded by `init_timeout`. The count is capped at
/// [`MAX_PORTS`].
pub async fn discover_num_ports(
    endpoint: &Endpoint,
    database: &str,
    reply_timeout: Duration,
    retry: Duration,
    init_timeout: Duration,
    max_line_length: usize,
) -> Result<usize> {
    let settle = async {
        loop {
            match poll_cur_cfg(endpoint, database, reply_timeout, max_line_length).await {
                Ok(0) => debug!("Switch configuration not applied yet"),
                Ok(cur_cfg) => return cur_cfg,
                Err(e) => debug!(error = %e, "cur_cfg poll failed"),
            }
            tokio::time::sleep(retry).await;
        }
    };
    let cur_cfg = tokio::time::timeout(init_timeout, settle)
        .await
        .map_err(|_| {
            BviewError::failure(format!(
                "switch configuration not applied within {:?}",
                init_timeout
            ))
        })?;
    info!(cur_cfg, "Switch configuration applied");

    let mut client = JsonRpcClient::connect(endpoint, max_line_length).await?;
    let result = client
        .transact_block(schema::select_subsystem_info(database), reply_timeout)
        .await?;
    let count = parse_interface_count(&result)
        .filter(|n| *n > 0)
        .ok_or_else(|| BviewError::not_found("Subsystem interface_count"))?;
    if count > MAX_PORTS {
        warn!(count, max = MAX_PORTS, "Interface count capped");
    }
    Ok(count.min(MAX_PORTS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bid::Bid;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn feature() -> OvsdbSystemFeature {
        OvsdbSystemFeature::new("eth0", AsicType::TD2, 32)
    }

    #[test]
    fn test_identity() {
        let f = feature();
        assert_eq!(f.name().unwrap(), "OVSDB-PLUGIN");
        assert_eq!(f.network_os().unwrap(), "ovsdb");
        assert!(f.feature_mask().is_enabled(FeatureId::Bst));
        assert!(f.feature_mask().is_enabled(FeatureId::System));
        assert_eq!(f.asics().len(), 1);
        assert_eq!(f.asics()[0].capabilities.num_ports, 32);
    }

    #[test]
    fn test_notation() {
        let f = feature();
        assert_eq!(f.asic_translate_from_notation("1").unwrap(), 0);
        assert_eq!(f.asic_translate_to_notation(0).unwrap(), "1");
        assert!(f.asic_translate_from_notation("0").is_err());
        assert!(f.asic_translate_from_notation("2").is_err());
        assert!(f.asic_translate_from_notation("x").is_err());

        assert_eq!(f.port_translate_from_notation("17").unwrap(), 17);
        assert_eq!(f.port_translate_to_notation(0, 17).unwrap(), "17");
        assert_eq!(f.lag_translate_to_notation(0, 3).unwrap(), "3");
        assert!(f.port_translate_to_notation(1, 17).is_err());
    }

    #[test]
    fn test_max_buf_snapshot() {
        let snapshot = feature().max_buf_snapshot_get(0).unwrap().data;
        assert_eq!(snapshot.device, Bid::Device.descriptor().default_threshold);
        assert_eq!(
            snapshot.egress_uc_queue[0].buffer_count,
            Bid::Ucast.descriptor().default_threshold
        );
        assert_eq!(
            snapshot.ingress_port_pg[31][7].um_headroom,
            Bid::PriGroupHeadroom.descriptor().default_threshold
        );
    }

    #[test]
    fn test_parse_select_results() {
        assert_eq!(parse_cur_cfg(&json!([{"rows": [{"cur_cfg": 3}]}])), Some(3));
        assert_eq!(parse_cur_cfg(&json!([{"rows": []}])), None);

        let info = json!([{"rows": [{"other_info": ["map", [
            ["max_bond_count", "256"],
            ["interface_count", "54"]
        ]]}]}]);
        assert_eq!(parse_interface_count(&info), Some(54));
        assert_eq!(parse_interface_count(&json!([{"rows": [{}]}])), None);
    }
}
