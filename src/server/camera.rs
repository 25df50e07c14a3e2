//! Camera connector
//!
//! One task per configured camera owns the TCP connection lifecycle:
//! Disconnected -> Connecting -> Connected -> Disconnected, with
//! `reconnect_interval` back-off between attempts. The write half of the
//! connection lives behind the record's lock so the SRT routing path and the
//! tally dispatcher can grab the handle without touching the read pump.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio_util::sync::CancellationToken;

use crate::error::{ConfigError, Error, Result};
use crate::protocol::{Frame, TallyState, ViscaFrame, MAX_VISCA_PAYLOAD};

use super::config::CameraConfig;

/// Runtime binding between an NDI source and this camera's tally commands
#[derive(Debug, Clone)]
pub struct NdiMapping {
    pub source_name: String,
    pub tally_enabled: bool,
    pub program_command: Vec<u8>,
    pub preview_command: Vec<u8>,
    pub off_command: Vec<u8>,
}

/// Last tally command actually delivered to the camera
///
/// `state` reflects the most recent *successful* write (or a configured
/// no-op), never the last requested state.
#[derive(Debug, Clone, Copy)]
struct TallyStatus {
    state: TallyState,
    last_update: Option<Instant>,
}

/// One camera record, owned by the supervisor for the process lifetime
pub struct Camera {
    pub id: u8,
    pub name: String,
    pub addr: SocketAddr,
    pub reconnect_interval: Duration,
    pub ndi: Option<NdiMapping>,
    /// Write half of the live connection; `None` while disconnected
    conn: Mutex<Option<OwnedWriteHalf>>,
    tally: Mutex<TallyStatus>,
    /// Wakes the read pump when a writer-side failure tears the socket down
    reset: Notify,
}

impl Camera {
    pub fn from_config(config: &CameraConfig) -> std::result::Result<Self, ConfigError> {
        let ndi = config.ndi_mapping.as_ref().map(|mapping| NdiMapping {
            source_name: mapping.source_name.clone(),
            tally_enabled: mapping.tally_enabled,
            program_command: mapping.commands.program.clone(),
            preview_command: mapping.commands.preview.clone(),
            off_command: mapping.commands.off.clone(),
        });
        Ok(Self {
            id: config.id,
            name: config.name.clone(),
            addr: config.socket_addr()?,
            reconnect_interval: config.reconnect_interval(),
            ndi,
            conn: Mutex::new(None),
            tally: Mutex::new(TallyStatus {
                state: TallyState::Off,
                last_update: None,
            }),
            reset: Notify::new(),
        })
    }

    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    pub async fn tally_state(&self) -> TallyState {
        self.tally.lock().await.state
    }

    pub async fn last_tally_update(&self) -> Option<Instant> {
        self.tally.lock().await.last_update
    }

    async fn set_tally_state(&self, state: TallyState) {
        let mut status = self.tally.lock().await;
        status.state = state;
        status.last_update = Some(Instant::now());
    }

    /// Write a VISCA payload to the camera socket
    ///
    /// A write failure closes the connection (exactly once) and wakes the
    /// read pump so the connector re-enters its back-off loop.
    pub async fn forward(&self, data: &[u8]) -> Result<()> {
        let mut guard = self.conn.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(Error::CameraOffline { id: self.id });
        };
        if let Err(error) = writer.write_all(data).await {
            guard.take();
            self.reset.notify_waiters();
            return Err(Error::Io(error));
        }
        Ok(())
    }

    /// Select and deliver the tally command for an observed state
    ///
    /// Returns `Ok(true)` when bytes went out, `Ok(false)` when the state
    /// has no configured command (a successful no-op). The recorded tally
    /// state advances only on success, so a failed delivery is retried by
    /// the next dispatcher tick once the camera reconnects.
    pub async fn send_tally_command(
        &self,
        state: TallyState,
        program_priority: bool,
    ) -> Result<bool> {
        let Some(mapping) = &self.ndi else {
            return Ok(false);
        };
        let command: &[u8] = match state {
            TallyState::Off => &mapping.off_command,
            TallyState::Program => &mapping.program_command,
            TallyState::Preview => &mapping.preview_command,
            TallyState::ProgramPreview => {
                if program_priority {
                    &mapping.program_command
                } else {
                    &mapping.preview_command
                }
            }
        };
        if command.is_empty() {
            self.set_tally_state(state).await;
            return Ok(false);
        }
        self.forward(command).await?;
        self.set_tally_state(state).await;
        Ok(true)
    }

    async fn attach(&self, writer: OwnedWriteHalf) {
        *self.conn.lock().await = Some(writer);
    }

    /// Drop the connection handle; returns false if it was already gone
    async fn detach(&self) -> bool {
        self.conn.lock().await.take().is_some()
    }
}

/// Connection lifecycle loop for one camera
///
/// Bytes read back from the camera are framed as VISCA responses and pushed
/// onto the outbound fan-out channel; a send with no connected peers is
/// simply discarded.
pub async fn run_connector(
    camera: Arc<Camera>,
    outbound: broadcast::Sender<Bytes>,
    shutdown: CancellationToken,
) {
    let mut buf = vec![0u8; MAX_VISCA_PAYLOAD];
    let mut last_attempt: Option<Instant> = None;

    while !shutdown.is_cancelled() {
        if let Some(at) = last_attempt {
            let elapsed = at.elapsed();
            if elapsed < camera.reconnect_interval {
                tokio::select! {
                    _ = tokio::time::sleep(camera.reconnect_interval - elapsed) => {}
                    _ = shutdown.cancelled() => break,
                }
            }
        }
        last_attempt = Some(Instant::now());

        tracing::debug!(
            camera = %camera.name,
            id = camera.id,
            addr = %camera.addr,
            "connecting"
        );
        let connected = tokio::select! {
            result = TcpStream::connect(camera.addr) => result,
            _ = shutdown.cancelled() => break,
        };
        let stream = match connected {
            Ok(stream) => stream,
            Err(error) => {
                tracing::warn!(
                    camera = %camera.name,
                    id = camera.id,
                    addr = %camera.addr,
                    %error,
                    "connect failed"
                );
                continue;
            }
        };
        if let Err(error) = stream.set_nodelay(true) {
            tracing::debug!(camera = %camera.name, %error, "could not set TCP_NODELAY");
        }

        let (mut reader, writer) = stream.into_split();
        camera.attach(writer).await;
        tracing::info!(
            camera = %camera.name,
            id = camera.id,
            addr = %camera.addr,
            "camera connected"
        );

        loop {
            tokio::select! {
                read = reader.read(&mut buf) => match read {
                    Ok(0) => {
                        tracing::info!(camera = %camera.name, id = camera.id, "camera closed the connection");
                        break;
                    }
                    Ok(n) => {
                        let frame = Frame::Visca(ViscaFrame::response(
                            camera.id,
                            Bytes::copy_from_slice(&buf[..n]),
                        ));
                        match frame.encode() {
                            Ok(bytes) => {
                                tracing::debug!(camera = %camera.name, id = camera.id, bytes = n, "response queued");
                                let _ = outbound.send(bytes);
                            }
                            Err(error) => {
                                tracing::warn!(camera = %camera.name, %error, "response dropped");
                            }
                        }
                    }
                    Err(error) => {
                        tracing::warn!(camera = %camera.name, id = camera.id, %error, "camera read failed");
                        break;
                    }
                },
                _ = camera.reset.notified() => break,
                _ = shutdown.cancelled() => break,
            }
        }

        if camera.detach().await {
            tracing::info!(camera = %camera.name, id = camera.id, "camera disconnected");
        }
    }
}
