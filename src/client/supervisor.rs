//! Client supervisor
//!
//! Owns every endpoint record, the shared sequence counter, and the single
//! SRT caller socket. Endpoint listeners feed command frames into an mpsc
//! channel; the supervisor pumps that channel into the socket and routes
//! response frames back out by camera id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::{SinkExt, TryStreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::protocol::{Frame, ViscaType};
use crate::srt;

use super::config::ClientConfig;
use super::endpoint::{self, Endpoint, SequenceCounter};

const OUTBOUND_CAPACITY: usize = 256;

/// The client half of the proxy pair
pub struct ViscaSrtClient {
    config: ClientConfig,
    endpoints: Arc<HashMap<u8, Arc<Endpoint>>>,
    sequence: Arc<SequenceCounter>,
    shutdown: CancellationToken,
}

impl ViscaSrtClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut endpoints = HashMap::new();
        for endpoint in &config.endpoints {
            endpoints.insert(
                endpoint.camera_id,
                Arc::new(Endpoint::from_config(endpoint)?),
            );
        }
        Ok(Self {
            endpoints: Arc::new(endpoints),
            sequence: Arc::new(SequenceCounter::new()),
            shutdown: CancellationToken::new(),
            config,
        })
    }

    /// Token observed by every loop; cancelling it is the whole shutdown story
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Connect to the server and proxy until shutdown or transport loss
    pub async fn run(&self) -> Result<()> {
        self.log_config();

        let server = &self.config.srt_server;
        let mut socket = srt::dial(&server.host, server.port, &self.config.srt_settings).await?;
        tracing::info!(
            server = %format!("{}:{}", server.host, server.port),
            "connected to srt server"
        );

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Bytes>(OUTBOUND_CAPACITY);
        let mut tasks = JoinSet::new();
        for endpoint in self.endpoints.values() {
            tasks.spawn(endpoint::run_listener(
                Arc::clone(endpoint),
                outbound_tx.clone(),
                Arc::clone(&self.sequence),
                self.shutdown.clone(),
            ));
        }
        drop(outbound_tx);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                command = outbound_rx.recv() => match command {
                    Some(bytes) => {
                        if let Err(error) = socket.send((Instant::now(), bytes)).await {
                            tracing::error!(%error, "srt send failed");
                            break;
                        }
                    }
                    None => break,
                },
                inbound = socket.try_next() => match inbound {
                    Ok(Some((_, data))) => self.route_response(&data).await,
                    Ok(None) => {
                        tracing::error!("srt connection closed by server");
                        break;
                    }
                    Err(error) => {
                        tracing::error!(%error, "srt receive failed");
                        break;
                    }
                },
            }
        }

        self.shutdown.cancel();
        drop(socket);
        // Failing the channel unblocks any listener mid-send
        drop(outbound_rx);
        while tasks.join_next().await.is_some() {}
        tracing::info!("client stopped");
        Ok(())
    }

    /// Route one frame received from the server
    async fn route_response(&self, data: &[u8]) {
        let frame = match Frame::decode(data) {
            Ok(frame) => frame,
            Err(error) => {
                tracing::warn!(%error, "protocol error; frame dropped");
                return;
            }
        };
        match frame {
            Frame::Visca(frame) => {
                let Some(endpoint) = self.endpoints.get(&frame.camera_id) else {
                    tracing::debug!(
                        camera_id = frame.camera_id,
                        "response for unknown endpoint dropped"
                    );
                    return;
                };
                match frame.visca_type {
                    ViscaType::Response | ViscaType::Error => {
                        endpoint.forward_response(frame.sequence, &frame.data).await;
                    }
                    other => {
                        tracing::debug!(
                            camera_id = frame.camera_id,
                            subtype = ?other,
                            "unexpected subtype from server; dropped"
                        );
                    }
                }
            }
            Frame::Tally(frame) => {
                // Tally observations are consumed server-side only
                tracing::debug!(source = %frame.source_name, "tally frame ignored by client");
            }
        }
    }

    fn log_config(&self) {
        tracing::info!(
            server = %format!("{}:{}", self.config.srt_server.host, self.config.srt_server.port),
            latency_ms = self.config.srt_settings.latency,
            connect_timeout_ms = self.config.srt_settings.connection_timeout,
            endpoints = self.config.endpoints.len(),
            "VISCA-SRT client configuration"
        );
        for endpoint in &self.config.endpoints {
            tracing::info!(
                camera_id = endpoint.camera_id,
                name = %endpoint.name,
                listen = %format!("{}:{}", endpoint.ip_address, endpoint.port),
                command_timeout_ms = endpoint.command_timeout,
                "endpoint configured"
            );
        }
    }
}
