//! Server configuration
//!
//! Loaded from a JSON file at startup and validated once; configuration
//! problems are fatal before any socket is opened and never raised later.

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::protocol::DEFAULT_VISCA_PORT;
use crate::srt::SrtSettings;

fn default_visca_port() -> u16 {
    DEFAULT_VISCA_PORT
}

fn default_reconnect_interval() -> u64 {
    5000
}

fn default_tally_update_interval() -> u64 {
    100
}

fn default_source_discovery_interval() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

/// Top-level server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// IPv4 address the SRT listener binds to
    pub bind_address: String,
    pub srt_port: u16,
    #[serde(default)]
    pub cameras: Vec<CameraConfig>,
    #[serde(default)]
    pub srt_settings: SrtSettings,
    #[serde(default)]
    pub ndi_settings: NdiSettings,
}

/// One camera behind the server
#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    pub id: u8,
    pub name: String,
    pub ip_address: String,
    #[serde(default = "default_visca_port")]
    pub port: u16,
    /// Back-off between TCP connect attempts, in milliseconds
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval: u64,
    pub ndi_mapping: Option<NdiMappingConfig>,
}

/// Binding between an NDI source and a camera's tally lamp
#[derive(Debug, Clone, Deserialize)]
pub struct NdiMappingConfig {
    pub source_name: String,
    #[serde(default = "default_true")]
    pub tally_enabled: bool,
    pub commands: TallyCommands,
}

/// Raw VISCA byte sequences driven by tally transitions
///
/// An empty sequence means the camera takes no action for that state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TallyCommands {
    #[serde(default)]
    pub program: Vec<u8>,
    #[serde(default)]
    pub preview: Vec<u8>,
    #[serde(default)]
    pub off: Vec<u8>,
}

/// Tally dispatcher tunables
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NdiSettings {
    /// Dispatcher tick period in milliseconds
    pub tally_update_interval: u64,
    /// Advertised to the external discovery process; unused by the core
    pub source_discovery_interval: u64,
    /// Prefer the program command when a source is on program and preview
    pub program_tally_priority: bool,
}

impl Default for NdiSettings {
    fn default() -> Self {
        Self {
            tally_update_interval: default_tally_update_interval(),
            source_discovery_interval: default_source_discovery_interval(),
            program_tally_priority: true,
        }
    }
}

impl NdiSettings {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tally_update_interval)
    }
}

impl ServerConfig {
    /// Read and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_address
            .parse::<Ipv4Addr>()
            .map_err(|_| ConfigError::InvalidAddress {
                name: "bind_address".to_string(),
                addr: self.bind_address.clone(),
            })?;

        let mut seen = HashSet::new();
        for camera in &self.cameras {
            if !seen.insert(camera.id) {
                return Err(ConfigError::DuplicateId(camera.id));
            }
            camera.socket_addr()?;
            if camera.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "camera {} has an empty name",
                    camera.id
                )));
            }
        }
        Ok(())
    }
}

impl CameraConfig {
    /// The camera's VISCA-IP control address
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: Ipv4Addr = self
            .ip_address
            .parse()
            .map_err(|_| ConfigError::InvalidAddress {
                name: self.name.clone(),
                addr: self.ip_address.clone(),
            })?;
        Ok(SocketAddr::from((ip, self.port)))
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval)
    }
}
