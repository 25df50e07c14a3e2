//! SRT peer servicing
//!
//! Each accepted peer gets its own task holding the socket. Inbound frames
//! are routed by kind: VISCA traffic to the addressed camera (after the
//! structural check), tally observations to the state table. Outbound
//! camera responses arrive on a broadcast channel so every connected peer
//! receives every response; peers never see each other's frames.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::{SinkExt, TryStreamExt};
use srt_tokio::SrtSocket;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

use crate::protocol::{visca, Frame};

use super::camera::Camera;
use super::tally::TallyTable;

/// Currently connected SRT peers, bounded by `max_clients`
pub struct PeerSet {
    max_clients: usize,
    members: Mutex<HashSet<u64>>,
}

impl PeerSet {
    pub fn new(max_clients: usize) -> Self {
        Self {
            max_clients,
            members: Mutex::new(HashSet::new()),
        }
    }

    /// Claim a slot for a new peer; false means the limit is reached
    pub async fn try_insert(&self, peer_id: u64) -> bool {
        let mut members = self.members.lock().await;
        if members.len() >= self.max_clients {
            return false;
        }
        members.insert(peer_id)
    }

    pub async fn remove(&self, peer_id: u64) {
        self.members.lock().await.remove(&peer_id);
    }

    pub async fn len(&self) -> usize {
        self.members.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.lock().await.is_empty()
    }
}

/// Service one connected peer until it disconnects or shutdown
pub async fn serve(
    peer_id: u64,
    remote: SocketAddr,
    mut socket: SrtSocket,
    cameras: Arc<HashMap<u8, Arc<Camera>>>,
    tally: Arc<TallyTable>,
    mut outbound: broadcast::Receiver<Bytes>,
    peers: Arc<PeerSet>,
    shutdown: CancellationToken,
) {
    tracing::info!(peer = %remote, peer_id, "peer connected");

    loop {
        tokio::select! {
            inbound = socket.try_next() => match inbound {
                Ok(Some((_, data))) => route_frame(&data, remote, &cameras, &tally).await,
                Ok(None) => {
                    tracing::info!(peer = %remote, peer_id, "peer disconnected");
                    break;
                }
                Err(error) => {
                    tracing::warn!(peer = %remote, peer_id, %error, "peer receive failed");
                    break;
                }
            },
            frame = outbound.recv() => match frame {
                Ok(bytes) => {
                    if let Err(error) = socket.send((Instant::now(), bytes)).await {
                        tracing::warn!(peer = %remote, peer_id, %error, "peer send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(peer = %remote, peer_id, missed, "peer fell behind; responses dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = shutdown.cancelled() => break,
        }
    }

    peers.remove(peer_id).await;
}

/// Route one inbound datagram
///
/// Malformed frames are dropped with a log line; the peer session always
/// continues.
pub async fn route_frame(
    data: &[u8],
    remote: SocketAddr,
    cameras: &HashMap<u8, Arc<Camera>>,
    tally: &TallyTable,
) {
    let frame = match Frame::decode(data) {
        Ok(frame) => frame,
        Err(error) => {
            tracing::warn!(peer = %remote, %error, "protocol error; frame dropped");
            return;
        }
    };

    match frame {
        Frame::Visca(frame) => {
            if !visca::is_well_formed(&frame.data) {
                tracing::warn!(
                    peer = %remote,
                    camera_id = frame.camera_id,
                    "malformed VISCA payload dropped"
                );
                return;
            }
            let Some(camera) = cameras.get(&frame.camera_id) else {
                tracing::warn!(
                    peer = %remote,
                    camera_id = frame.camera_id,
                    "frame for unknown camera dropped"
                );
                return;
            };
            match camera.forward(&frame.data).await {
                Ok(()) => {
                    tracing::debug!(
                        camera = %camera.name,
                        id = camera.id,
                        subtype = ?frame.visca_type,
                        sequence = frame.sequence,
                        bytes = frame.data.len(),
                        "forwarded to camera"
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        camera = %camera.name,
                        id = camera.id,
                        %error,
                        "frame for disconnected camera dropped"
                    );
                }
            }
        }
        Frame::Tally(frame) => {
            tracing::info!(
                source = %frame.source_name,
                state = %frame.state,
                timestamp = frame.timestamp,
                "tally observation"
            );
            tally.observe(&frame.source_name, frame.state).await;
        }
    }
}
