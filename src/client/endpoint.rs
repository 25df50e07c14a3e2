//! Endpoint connector
//!
//! The mirror of the server's camera connector: one task per endpoint owns
//! a TCP listener for controllers. At most one controller is attached at a
//! time; a new accept displaces the previous connection. Controller bytes
//! become VISCA command frames on the SRT session, responses for the
//! endpoint's camera id are written straight back.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio_util::sync::CancellationToken;

use crate::error::ConfigError;
use crate::protocol::{Frame, ViscaFrame, MAX_VISCA_PAYLOAD};

use super::config::EndpointConfig;

/// Wrapping u16 command sequence, one per client process
///
/// The sequence only correlates commands with responses in the logs; frame
/// delivery order comes from the transport. The first issued value is 1,
/// and the counter wraps through 0 at 2^16 like the wire field does.
#[derive(Debug, Default)]
pub struct SequenceCounter(AtomicU16);

impl SequenceCounter {
    pub fn new() -> Self {
        Self(AtomicU16::new(0))
    }

    pub fn next(&self) -> u16 {
        self.0.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingCommand {
    sequence: u16,
    sent_at: Instant,
}

/// One endpoint record, owned by the supervisor for the process lifetime
pub struct Endpoint {
    pub camera_id: u8,
    pub name: String,
    pub addr: SocketAddr,
    pub reconnect_interval: Duration,
    pub command_timeout: Duration,
    /// Write half of the attached controller; `None` while listening
    conn: Mutex<Option<OwnedWriteHalf>>,
    /// Last command awaiting a response, for latency tracing only
    pending: Mutex<Option<PendingCommand>>,
    /// Wakes the listener loop when a response write drops the controller
    reset: Notify,
}

impl Endpoint {
    pub fn from_config(config: &EndpointConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            camera_id: config.camera_id,
            name: config.name.clone(),
            addr: config.socket_addr()?,
            reconnect_interval: config.reconnect_interval(),
            command_timeout: config.command_timeout(),
            conn: Mutex::new(None),
            pending: Mutex::new(None),
            reset: Notify::new(),
        })
    }

    pub async fn is_accepted(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Store a freshly accepted controller; returns true if one was displaced
    async fn attach(&self, writer: OwnedWriteHalf) -> bool {
        self.conn.lock().await.replace(writer).is_some()
    }

    async fn detach(&self) -> bool {
        self.conn.lock().await.take().is_some()
    }

    /// Write a camera response back to the attached controller
    ///
    /// A write failure drops the controller and the endpoint returns to
    /// listening; responses with no controller attached are discarded.
    pub async fn forward_response(&self, sequence: u16, data: &[u8]) {
        self.note_response(sequence).await;

        let mut guard = self.conn.lock().await;
        let Some(writer) = guard.as_mut() else {
            tracing::debug!(endpoint = %self.name, "response dropped; no controller attached");
            return;
        };
        if let Err(error) = writer.write_all(data).await {
            tracing::warn!(
                endpoint = %self.name,
                camera_id = self.camera_id,
                %error,
                "controller write failed; dropping connection"
            );
            guard.take();
            self.reset.notify_waiters();
        }
    }

    async fn note_command(&self, sequence: u16) {
        let mut pending = self.pending.lock().await;
        if let Some(prev) = pending.take() {
            if prev.sent_at.elapsed() > self.command_timeout {
                tracing::warn!(
                    endpoint = %self.name,
                    sequence = prev.sequence,
                    timeout = ?self.command_timeout,
                    "no response within command timeout"
                );
            }
        }
        *pending = Some(PendingCommand {
            sequence,
            sent_at: Instant::now(),
        });
    }

    async fn note_response(&self, sequence: u16) {
        let mut pending = self.pending.lock().await;
        if let Some(prev) = pending.take() {
            let elapsed = prev.sent_at.elapsed();
            if elapsed > self.command_timeout {
                tracing::warn!(
                    endpoint = %self.name,
                    command_sequence = prev.sequence,
                    response_sequence = sequence,
                    ?elapsed,
                    "response arrived after command timeout"
                );
            } else {
                tracing::trace!(
                    endpoint = %self.name,
                    command_sequence = prev.sequence,
                    ?elapsed,
                    "response latency"
                );
            }
        }
    }
}

/// Read from an attached controller, or park until one arrives
async fn next_chunk(reader: &mut Option<OwnedReadHalf>, buf: &mut [u8]) -> std::io::Result<usize> {
    match reader {
        Some(reader) => reader.read(buf).await,
        None => std::future::pending().await,
    }
}

/// Listener lifecycle loop for one endpoint
pub async fn run_listener(
    endpoint: Arc<Endpoint>,
    outbound: mpsc::Sender<Bytes>,
    sequence: Arc<SequenceCounter>,
    shutdown: CancellationToken,
) {
    'bind: while !shutdown.is_cancelled() {
        let listener = match TcpListener::bind(endpoint.addr).await {
            Ok(listener) => listener,
            Err(error) => {
                tracing::error!(
                    endpoint = %endpoint.name,
                    addr = %endpoint.addr,
                    %error,
                    "listener bind failed"
                );
                tokio::select! {
                    _ = tokio::time::sleep(endpoint.reconnect_interval) => continue 'bind,
                    _ = shutdown.cancelled() => break 'bind,
                }
            }
        };
        tracing::info!(
            endpoint = %endpoint.name,
            camera_id = endpoint.camera_id,
            addr = %endpoint.addr,
            "listening for controller"
        );

        let mut reader: Option<OwnedReadHalf> = None;
        let mut buf = vec![0u8; MAX_VISCA_PAYLOAD];

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    endpoint.detach().await;
                    break 'bind;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let (read_half, write_half) = stream.into_split();
                        let displaced = endpoint.attach(write_half).await;
                        if displaced {
                            tracing::info!(endpoint = %endpoint.name, controller = %peer, "controller displaced previous connection");
                        } else {
                            tracing::info!(endpoint = %endpoint.name, controller = %peer, "controller connected");
                        }
                        reader = Some(read_half);
                    }
                    Err(error) => {
                        tracing::warn!(endpoint = %endpoint.name, %error, "accept failed");
                    }
                },
                read = next_chunk(&mut reader, &mut buf) => match read {
                    Ok(0) => {
                        reader = None;
                        endpoint.detach().await;
                        tracing::info!(endpoint = %endpoint.name, "controller disconnected");
                    }
                    Ok(n) => {
                        let seq = sequence.next();
                        let frame = Frame::Visca(ViscaFrame::command(
                            endpoint.camera_id,
                            seq,
                            Bytes::copy_from_slice(&buf[..n]),
                        ));
                        match frame.encode() {
                            Ok(bytes) => {
                                endpoint.note_command(seq).await;
                                tracing::debug!(
                                    endpoint = %endpoint.name,
                                    camera_id = endpoint.camera_id,
                                    sequence = seq,
                                    bytes = n,
                                    "command queued"
                                );
                                if outbound.send(bytes).await.is_err() {
                                    // SRT pump is gone; nothing left to proxy
                                    endpoint.detach().await;
                                    break 'bind;
                                }
                            }
                            Err(error) => {
                                tracing::warn!(endpoint = %endpoint.name, %error, "command dropped");
                            }
                        }
                    }
                    Err(error) => {
                        reader = None;
                        endpoint.detach().await;
                        tracing::warn!(endpoint = %endpoint.name, %error, "controller read failed");
                    }
                },
                _ = endpoint.reset.notified() => {
                    // Writer side already dropped the controller
                    reader = None;
                }
            }
        }
    }
}
