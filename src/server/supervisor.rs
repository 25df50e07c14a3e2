//! Server supervisor
//!
//! Owns every camera record, the tally table, the outbound fan-out channel
//! and the SRT listener. Connectors and the tally dispatcher run as tasks;
//! the accept loop runs inline until the cancellation token flips, after
//! which every task is joined before `run` returns.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::srt;

use super::camera::{self, Camera};
use super::config::ServerConfig;
use super::peer::{self, PeerSet};
use super::tally::{self, TallyTable};

const OUTBOUND_CAPACITY: usize = 256;

/// The server half of the proxy pair
pub struct ViscaSrtServer {
    config: ServerConfig,
    cameras: Arc<HashMap<u8, Arc<Camera>>>,
    tally: Arc<TallyTable>,
    outbound: broadcast::Sender<Bytes>,
    peers: Arc<PeerSet>,
    shutdown: CancellationToken,
}

impl ViscaSrtServer {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let mut cameras = HashMap::new();
        for camera in &config.cameras {
            cameras.insert(camera.id, Arc::new(Camera::from_config(camera)?));
        }
        let (outbound, _) = broadcast::channel(OUTBOUND_CAPACITY);
        Ok(Self {
            peers: Arc::new(PeerSet::new(config.srt_settings.max_clients)),
            cameras: Arc::new(cameras),
            tally: Arc::new(TallyTable::new()),
            outbound,
            shutdown: CancellationToken::new(),
            config,
        })
    }

    /// Token observed by every loop; cancelling it is the whole shutdown story
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Bring up every task and serve SRT peers until shutdown
    pub async fn run(&self) -> Result<()> {
        self.log_config();

        let mut tasks = JoinSet::new();
        for camera in self.cameras.values() {
            tasks.spawn(camera::run_connector(
                Arc::clone(camera),
                self.outbound.clone(),
                self.shutdown.clone(),
            ));
        }
        tasks.spawn(tally::run_dispatcher(
            Arc::clone(&self.cameras),
            Arc::clone(&self.tally),
            self.config.ndi_settings.clone(),
            self.shutdown.clone(),
        ));

        let (listener, mut incoming) = srt::listen(
            &self.config.bind_address,
            self.config.srt_port,
            &self.config.srt_settings,
        )
        .await?;
        tracing::info!(
            addr = %format!("{}:{}", self.config.bind_address, self.config.srt_port),
            "srt listener ready"
        );

        let mut next_peer_id: u64 = 1;
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                request = incoming.incoming().next() => {
                    let Some(request) = request else { break };
                    let remote = request.remote();
                    let peer_id = next_peer_id;
                    if !self.peers.try_insert(peer_id).await {
                        // Dropping the request refuses the handshake
                        tracing::warn!(peer = %remote, "connection refused: max_clients reached");
                        continue;
                    }
                    next_peer_id += 1;
                    match request.accept(None).await {
                        Ok(socket) => {
                            tasks.spawn(peer::serve(
                                peer_id,
                                remote,
                                socket,
                                Arc::clone(&self.cameras),
                                Arc::clone(&self.tally),
                                self.outbound.subscribe(),
                                Arc::clone(&self.peers),
                                self.shutdown.clone(),
                            ));
                        }
                        Err(error) => {
                            self.peers.remove(peer_id).await;
                            tracing::warn!(peer = %remote, %error, "srt accept failed");
                        }
                    }
                }
            }
        }

        self.shutdown.cancel();
        drop(listener);
        while tasks.join_next().await.is_some() {}
        tracing::info!("server stopped");
        Ok(())
    }

    fn log_config(&self) {
        tracing::info!(
            bind = %self.config.bind_address,
            port = self.config.srt_port,
            latency_ms = self.config.srt_settings.latency,
            max_clients = self.config.srt_settings.max_clients,
            cameras = self.config.cameras.len(),
            "VISCA-SRT server configuration"
        );
        tracing::info!(
            tick_ms = self.config.ndi_settings.tally_update_interval,
            discovery_ms = self.config.ndi_settings.source_discovery_interval,
            program_priority = self.config.ndi_settings.program_tally_priority,
            "tally dispatcher configuration"
        );
        for camera in &self.config.cameras {
            tracing::info!(
                id = camera.id,
                name = %camera.name,
                addr = %format!("{}:{}", camera.ip_address, camera.port),
                ndi_source = camera
                    .ndi_mapping
                    .as_ref()
                    .map(|mapping| mapping.source_name.as_str())
                    .unwrap_or("-"),
                "camera configured"
            );
        }
    }
}
