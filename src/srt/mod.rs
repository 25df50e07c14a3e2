//! SRT session management
//!
//! Thin layer over the transport crate: option translation, the server-side
//! listen entry point, and the client-side dial with a bounded connect.
//! Everything above this module sees one frame per datagram in both
//! directions; message boundaries come from the transport itself.

use std::time::Duration;

use serde::Deserialize;
use srt_tokio::{SrtIncoming, SrtListener, SrtSocket};

use crate::error::{Error, Result};

pub mod options;

/// Tunables applied to every SRT socket before bind/connect
///
/// Server configurations use `max_clients`; client configurations use
/// `connection_timeout`. The remaining knobs are shared.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SrtSettings {
    /// Receive latency budget in milliseconds
    pub latency: u64,
    /// Bandwidth cap in bits per second; 0 or negative means unlimited
    pub max_bw: i64,
    /// Receive buffer size in bytes
    pub input_buffer: Option<u64>,
    /// Send buffer size in bytes
    pub output_buffer: Option<u64>,
    /// Peer limit on the server listener
    pub max_clients: usize,
    /// Client connect deadline in milliseconds
    pub connection_timeout: u64,
}

impl Default for SrtSettings {
    fn default() -> Self {
        Self {
            latency: 120,
            max_bw: 0,
            input_buffer: None,
            output_buffer: None,
            max_clients: 5,
            connection_timeout: 3000,
        }
    }
}

impl SrtSettings {
    pub fn latency_duration(&self) -> Duration {
        Duration::from_millis(self.latency)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout)
    }
}

/// Bind the server listener with the configured option set
pub async fn listen(bind_address: &str, port: u16, settings: &SrtSettings) -> Result<(SrtListener, SrtIncoming)> {
    let addr = format!("{bind_address}:{port}");
    let (listener, incoming) = SrtListener::builder()
        .set(|options| options::apply(settings, options))
        .bind(addr.as_str())
        .await?;
    Ok((listener, incoming))
}

/// Dial the server as an SRT caller, bounded by `connection_timeout`
pub async fn dial(host: &str, port: u16, settings: &SrtSettings) -> Result<SrtSocket> {
    let addr = resolve(host, port).await?;
    let connect = SrtSocket::builder()
        .set(|options| options::apply(settings, options))
        .call(addr.as_str(), None);

    match tokio::time::timeout(settings.connection_timeout(), connect).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(Error::ConnectTimeout {
            addr,
            timeout: settings.connection_timeout(),
        }),
    }
}

/// Resolve a configured host name to a dialable `ip:port` string
async fn resolve(host: &str, port: u16) -> Result<String> {
    let mut addrs = tokio::net::lookup_host((host, port)).await?;
    let addr = addrs.next().ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no address found for {host}"),
        ))
    })?;
    Ok(addr.to_string())
}
