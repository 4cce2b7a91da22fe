//! System forwarding API.
//!
//! Platform-wide queries go to the generic System feature (resolved with
//! [`AsicType::ALL`]); per-unit queries first map the unit to its ASIC type
//! and resolve the feature for that type.

use crate::redirector::Redirector;
use bview_types::{
    AsicCapabilities, AsicType, BstSnapshot, BviewError, FeatureMask, MacAddress, Result,
    Timestamped,
};
use chrono::{DateTime, Utc};
use std::net::Ipv4Addr;

impl Redirector {
    /// Returns the ASIC type of a unit.
    pub fn unit_asic_type(&self, unit: u32) -> Result<AsicType> {
        self.system_feature(AsicType::ALL)?
            .asics()
            .into_iter()
            .find(|asic| asic.unit == unit)
            .map(|asic| asic.asic_type)
            .ok_or_else(|| BviewError::not_found(format!("ASIC unit {}", unit)))
    }

    /// Returns the number of ASIC units on the platform.
    pub fn num_units(&self) -> Result<usize> {
        Ok(self.system_feature(AsicType::ALL)?.asics().len())
    }

    /// Returns the scaling parameters of a unit.
    pub fn unit_capabilities(&self, unit: u32) -> Result<AsicCapabilities> {
        let asic_type = self.unit_asic_type(unit)?;
        self.system_feature(asic_type)?
            .asics()
            .into_iter()
            .find(|asic| asic.unit == unit)
            .map(|asic| asic.capabilities)
            .ok_or_else(|| BviewError::not_found(format!("capabilities of ASIC unit {}", unit)))
    }

    pub fn system_name(&self) -> Result<String> {
        self.system_feature(AsicType::ALL)?.name()
    }

    pub fn system_mac(&self) -> Result<MacAddress> {
        self.system_feature(AsicType::ALL)?.mac()
    }

    pub fn system_ip4(&self) -> Result<Ipv4Addr> {
        self.system_feature(AsicType::ALL)?.ip4()
    }

    pub fn system_time(&self) -> Result<DateTime<Utc>> {
        self.system_feature(AsicType::ALL)?.time()
    }

    pub fn network_os(&self) -> Result<String> {
        self.system_feature(AsicType::ALL)?.network_os()
    }

    pub fn system_uid(&self) -> Result<String> {
        self.system_feature(AsicType::ALL)?.uid()
    }

    pub fn system_feature_mask(&self) -> Result<FeatureMask> {
        Ok(self.system_feature(AsicType::ALL)?.feature_mask())
    }

    /// Converts an application ASIC identifier to a unit number.
    pub fn asic_translate_from_notation(&self, src: &str) -> Result<u32> {
        self.system_feature(AsicType::ALL)?
            .asic_translate_from_notation(src)
    }

    pub fn asic_translate_to_notation(&self, unit: u32) -> Result<String> {
        let asic_type = self.unit_asic_type(unit)?;
        self.system_feature(asic_type)?
            .asic_translate_to_notation(unit)
    }

    pub fn port_translate_from_notation(&self, unit: u32, src: &str) -> Result<u32> {
        let asic_type = self.unit_asic_type(unit)?;
        self.system_feature(asic_type)?
            .port_translate_from_notation(src)
    }

    pub fn port_translate_to_notation(&self, unit: u32, port: u32) -> Result<String> {
        let asic_type = self.unit_asic_type(unit)?;
        self.system_feature(asic_type)?
            .port_translate_to_notation(unit, port)
    }

    pub fn lag_translate_to_notation(&self, unit: u32, lag: u32) -> Result<String> {
        let asic_type = self.unit_asic_type(unit)?;
        self.system_feature(asic_type)?
            .lag_translate_to_notation(unit, lag)
    }

    /// Returns the factory maximum buffer values of a unit.
    pub fn max_buf_snapshot(&self, unit: u32) -> Result<Timestamped<BstSnapshot>> {
        let asic_type = self.unit_asic_type(unit)?;
        self.system_feature(asic_type)?.max_buf_snapshot_get(unit)
    }
}
