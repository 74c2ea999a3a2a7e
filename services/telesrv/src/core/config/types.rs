//! Topology configuration types
//!
//! Serde view of the topology document before validation. The loader turns
//! these into the immutable [`SlaveDirectory`](crate::core::topology::SlaveDirectory).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::topology::{SerialSettings, MAX_PORTS};
use crate::error::{Result, TeleSrvError};

/// Root of the topology document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Port descriptors, one per serial line
    pub ports: Vec<PortConfig>,
}

/// One serial port descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfig {
    /// Port index (`0..MAX_PORTS`), unique
    pub index: u8,

    /// Whether this port is served; inactive ports keep no slaves and no
    /// connection
    #[serde(default)]
    pub active: bool,

    /// Serial device path (e.g. "/dev/ttyS1"); required for active ports
    #[serde(default)]
    pub device: String,

    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Parity ("None", "Even", "Odd")
    #[serde(default = "default_parity")]
    pub parity: String,

    /// Data bits (5, 6, 7, 8)
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,

    /// Stop bits (1, 2)
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,

    /// Response timeout per round-trip, in milliseconds
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    /// Slave descriptors; required when the port is active
    pub slaves: Option<Vec<SlaveConfig>>,
}

/// One slave descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaveConfig {
    /// Unit identifier on the serial line (`1..OFFSET_BY_PORT`)
    pub id: u8,

    /// Display name
    pub description: String,

    /// Configured coil addresses
    #[serde(default)]
    pub coils: Vec<u16>,

    /// Configured discrete-input addresses
    #[serde(default)]
    pub discrete_inputs: Vec<u16>,

    /// Configured input-register addresses
    #[serde(default)]
    pub input_registers: Vec<u16>,

    /// Configured holding-register addresses
    #[serde(default)]
    pub holding_registers: Vec<u16>,
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_parity() -> String {
    "None".to_string()
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_response_timeout_ms() -> u64 {
    100
}

impl PortConfig {
    /// Validate serial parameters and the port index
    pub fn validate(&self) -> Result<()> {
        if self.index as usize >= MAX_PORTS {
            return Err(TeleSrvError::config(format!(
                "port index {} out of range (0..{MAX_PORTS})",
                self.index
            )));
        }

        if self.active && self.device.is_empty() {
            return Err(TeleSrvError::config(format!(
                "active port {} has no device path",
                self.index
            )));
        }

        if self.baud_rate == 0 {
            return Err(TeleSrvError::config(format!(
                "port {}: baud rate must be greater than zero",
                self.index
            )));
        }

        if !["None", "Even", "Odd"].contains(&self.parity.as_str()) {
            return Err(TeleSrvError::config(format!(
                "port {}: parity must be None, Even, or Odd",
                self.index
            )));
        }

        if !(5..=8).contains(&self.data_bits) {
            return Err(TeleSrvError::config(format!(
                "port {}: data bits must be 5, 6, 7, or 8",
                self.index
            )));
        }

        if !(1..=2).contains(&self.stop_bits) {
            return Err(TeleSrvError::config(format!(
                "port {}: stop bits must be 1 or 2",
                self.index
            )));
        }

        if self.response_timeout_ms == 0 {
            return Err(TeleSrvError::config(format!(
                "port {}: response timeout must be greater than zero",
                self.index
            )));
        }

        Ok(())
    }

    /// Serial parameters for the transport
    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            baud_rate: self.baud_rate,
            parity: self.parity.clone(),
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
            response_timeout: Duration::from_millis(self.response_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port() -> PortConfig {
        PortConfig {
            index: 0,
            active: true,
            device: "/dev/ttyS1".to_string(),
            baud_rate: 9600,
            parity: "None".to_string(),
            data_bits: 8,
            stop_bits: 1,
            response_timeout_ms: 100,
            slaves: Some(vec![]),
        }
    }

    #[test]
    fn test_valid_port_config() {
        assert!(port().validate().is_ok());
    }

    #[test]
    fn test_port_index_out_of_range() {
        let mut cfg = port();
        cfg.index = MAX_PORTS as u8;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_active_port_needs_device() {
        let mut cfg = port();
        cfg.device = String::new();
        assert!(cfg.validate().is_err());

        cfg.active = false;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_serial_parameter_bounds() {
        let mut cfg = port();
        cfg.baud_rate = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = port();
        cfg.parity = "Mark".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = port();
        cfg.data_bits = 9;
        assert!(cfg.validate().is_err());

        let mut cfg = port();
        cfg.stop_bits = 3;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_serde_defaults() {
        let cfg: PortConfig = serde_json::from_str(
            r#"{ "index": 1, "active": false, "slaves": null }"#,
        )
        .unwrap();
        assert_eq!(cfg.baud_rate, 9600);
        assert_eq!(cfg.parity, "None");
        assert_eq!(cfg.data_bits, 8);
        assert_eq!(cfg.stop_bits, 1);
        assert_eq!(cfg.response_timeout_ms, 100);
    }

    #[test]
    fn test_serial_settings_conversion() {
        let settings = port().serial_settings();
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.response_timeout, Duration::from_millis(100));
    }
}
