//! Client configuration

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::srt::SrtSettings;

fn default_reconnect_interval() -> u64 {
    5000
}

fn default_command_timeout() -> u64 {
    1000
}

/// Top-level client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub srt_server: SrtServerConfig,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
    #[serde(default)]
    pub srt_settings: SrtSettings,
}

/// Where the peer server listens
#[derive(Debug, Clone, Deserialize)]
pub struct SrtServerConfig {
    pub host: String,
    pub port: u16,
}

/// One local listener proxying a remote camera
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Identifier of the camera behind the peer server
    pub camera_id: u8,
    pub name: String,
    /// Local address controllers connect to
    pub ip_address: String,
    pub port: u16,
    /// Back-off before re-binding a failed listener, in milliseconds
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval: u64,
    /// Expected command/response latency bound, in milliseconds
    #[serde(default = "default_command_timeout")]
    pub command_timeout: u64,
}

impl ClientConfig {
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

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.srt_server.host.is_empty() {
            return Err(ConfigError::Invalid("srt_server.host is empty".into()));
        }
        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            if !seen.insert(endpoint.camera_id) {
                return Err(ConfigError::DuplicateId(endpoint.camera_id));
            }
            endpoint.socket_addr()?;
            if endpoint.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "endpoint {} has an empty name",
                    endpoint.camera_id
                )));
            }
        }
        Ok(())
    }
}

impl EndpointConfig {
    /// The local controller-facing listen address
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

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "srt_server": { "host": "203.0.113.7", "port": 9000 },
        "endpoints": [
            {
                "camera_id": 1,
                "name": "Cam 1 proxy",
                "ip_address": "127.0.0.1",
                "port": 52381,
                "command_timeout": 250
            }
        ],
        "srt_settings": { "latency": 60, "connection_timeout": 2000 }
    }"#;

    #[test]
    fn test_parse_full_config() {
        let config: ClientConfig = serde_json::from_str(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.srt_server.host, "203.0.113.7");
        assert_eq!(config.srt_server.port, 9000);
        assert_eq!(config.srt_settings.connection_timeout, 2000);

        let endpoint = &config.endpoints[0];
        assert_eq!(endpoint.camera_id, 1);
        assert_eq!(endpoint.command_timeout(), Duration::from_millis(250));
        assert_eq!(
            endpoint.reconnect_interval(),
            Duration::from_millis(default_reconnect_interval())
        );
        assert_eq!(endpoint.socket_addr().unwrap().to_string(), "127.0.0.1:52381");
    }

    #[test]
    fn test_duplicate_endpoint_id_rejected() {
        let mut config: ClientConfig = serde_json::from_str(SAMPLE).unwrap();
        let mut dup = config.endpoints[0].clone();
        dup.port += 1;
        config.endpoints.push(dup);
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateId(1))));
    }

    #[test]
    fn test_invalid_listen_address_rejected() {
        let mut config: ClientConfig = serde_json::from_str(SAMPLE).unwrap();
        config.endpoints[0].ip_address = "::1".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_empty_host_rejected() {
        let mut config: ClientConfig = serde_json::from_str(SAMPLE).unwrap();
        config.srt_server.host.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
