//! Emulator configuration, stored as TOML.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{DeviceIdentity, Personality};
use crate::proxy::{RelaySettings, DEFAULT_FRAME_BUDGET};

pub const DEFAULT_PROXY_PORT: u16 = 1235;
pub const DEFAULT_USBIP_BIND: &str = "0.0.0.0:3240";
pub const DEFAULT_BUS_ID: &str = "1-1";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid address '{addr}': {message}")]
    BadAddress { addr: String, message: String },
}

/// What the emulated camera reports in its descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsbIdentity {
    pub vid: u16,
    pub pid: u16,
    pub bcd_device: u16,
    pub manufacturer: String,
    pub product: String,
    pub serial: String,
}

impl Default for UsbIdentity {
    fn default() -> Self {
        Self {
            vid: 0x054C,
            pid: 0x0994,
            bcd_device: 0x0100,
            manufacturer: "Sony".into(),
            product: "ILCE-5100".into(),
            serial: "0001".into(),
        }
    }
}

impl UsbIdentity {
    pub fn device_identity(&self) -> DeviceIdentity {
        DeviceIdentity {
            manufacturer: self.manufacturer.clone(),
            model: self.product.clone(),
            serial: self.serial.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// TCP port the relay connects to.
    pub port: u16,
    pub frame_timeout_ms: u64,
    pub frame_budget: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PROXY_PORT,
            frame_timeout_ms: 1500,
            frame_budget: DEFAULT_FRAME_BUDGET,
        }
    }
}

impl ProxyConfig {
    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            frame_timeout: Duration::from_millis(self.frame_timeout_ms),
            frame_budget: self.frame_budget.max(1),
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsbIpConfig {
    pub bind: String,
    pub bus_id: String,
}

impl Default for UsbIpConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_USBIP_BIND.into(),
            bus_id: DEFAULT_BUS_ID.into(),
        }
    }
}

impl UsbIpConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind.parse().map_err(|e: std::net::AddrParseError| ConfigError::BadAddress {
            addr: self.bind.clone(),
            message: e.to_string(),
        })
    }
}

/// Configuration for one emulator run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub personality: Personality,
    pub usb: UsbIdentity,
    pub proxy: ProxyConfig,
    pub usbip: UsbIpConfig,
}

impl DeviceConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
