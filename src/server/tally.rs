//! NDI tally dispatcher
//!
//! Tally frames from any SRT peer land in the state table; a periodic tick
//! walks the mapped cameras and actuates only the differences. Ingress rate
//! and actuation rate are decoupled on purpose: observations are
//! latest-wins, and a burst of transitions between two ticks collapses into
//! a single camera write.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::protocol::TallyState;

use super::camera::Camera;
use super::config::NdiSettings;

/// Latest observed state per NDI source name (case-sensitive)
#[derive(Default)]
pub struct TallyTable {
    states: Mutex<HashMap<String, TallyState>>,
}

impl TallyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation; overwrites any previous state for the source
    pub async fn observe(&self, source_name: &str, state: TallyState) {
        self.states
            .lock()
            .await
            .insert(source_name.to_owned(), state);
    }

    pub async fn get(&self, source_name: &str) -> Option<TallyState> {
        self.states.lock().await.get(source_name).copied()
    }

    /// Copy of the whole table, taken under the lock
    ///
    /// The dispatcher works from this snapshot so the table lock is never
    /// held across a camera write. This also fixes the lock order: tally
    /// first, cameras after, nothing ever nested.
    pub async fn snapshot(&self) -> HashMap<String, TallyState> {
        self.states.lock().await.clone()
    }
}

/// One dispatcher pass over every mapped camera
pub async fn dispatch_once(
    cameras: &HashMap<u8, Arc<Camera>>,
    table: &TallyTable,
    settings: &NdiSettings,
) {
    let observed = table.snapshot().await;

    for camera in cameras.values() {
        let Some(mapping) = &camera.ndi else {
            continue;
        };
        if !mapping.tally_enabled || mapping.source_name.is_empty() {
            continue;
        }
        let Some(&state) = observed.get(&mapping.source_name) else {
            continue;
        };
        if state == camera.tally_state().await {
            continue;
        }

        match camera
            .send_tally_command(state, settings.program_tally_priority)
            .await
        {
            Ok(true) => {
                tracing::info!(
                    camera = %camera.name,
                    id = camera.id,
                    source = %mapping.source_name,
                    state = %state,
                    "tally updated"
                );
            }
            Ok(false) => {
                tracing::debug!(
                    camera = %camera.name,
                    id = camera.id,
                    state = %state,
                    "no tally command configured for state"
                );
            }
            Err(error) => {
                tracing::warn!(
                    camera = %camera.name,
                    id = camera.id,
                    state = %state,
                    %error,
                    "tally command failed; will retry after reconnect"
                );
            }
        }
    }
}

/// Periodic dispatcher task, one per server
pub async fn run_dispatcher(
    cameras: Arc<HashMap<u8, Arc<Camera>>>,
    table: Arc<TallyTable>,
    settings: NdiSettings,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(settings.tick_period());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.cancelled() => break,
        }
        dispatch_once(&cameras, &table, &settings).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::config::{CameraConfig, NdiMappingConfig, TallyCommands};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio::sync::broadcast;

    const PROGRAM_CMD: [u8; 8] = [0x81, 0x01, 0x7E, 0x01, 0x0A, 0x00, 0x02, 0xFF];
    const PREVIEW_CMD: [u8; 8] = [0x81, 0x01, 0x7E, 0x01, 0x0A, 0x00, 0x03, 0xFF];
    const OFF_CMD: [u8; 8] = [0x81, 0x01, 0x7E, 0x01, 0x0A, 0x00, 0x01, 0xFF];

    fn mapped_camera(id: u8, addr: SocketAddr, source: &str) -> CameraConfig {
        CameraConfig {
            id,
            name: format!("Cam {id}"),
            ip_address: addr.ip().to_string(),
            port: addr.port(),
            reconnect_interval: 50,
            ndi_mapping: Some(NdiMappingConfig {
                source_name: source.into(),
                tally_enabled: true,
                commands: TallyCommands {
                    program: PROGRAM_CMD.to_vec(),
                    preview: PREVIEW_CMD.to_vec(),
                    off: OFF_CMD.to_vec(),
                },
            }),
        }
    }

    async fn connected_camera(
        listener: &TcpListener,
        config: &CameraConfig,
    ) -> (Arc<Camera>, tokio::net::TcpStream, CancellationToken) {
        let camera = Arc::new(Camera::from_config(config).unwrap());
        let (tx, _rx) = broadcast::channel(16);
        let shutdown = CancellationToken::new();
        tokio::spawn(super::super::camera::run_connector(
            Arc::clone(&camera),
            tx,
            shutdown.clone(),
        ));
        let (socket, _) = listener.accept().await.unwrap();
        for _ in 0..100 {
            if camera.is_connected().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(camera.is_connected().await);
        (camera, socket, shutdown)
    }

    #[tokio::test]
    async fn test_table_is_latest_wins() {
        let table = TallyTable::new();
        table.observe("MainCam", TallyState::Preview).await;
        table.observe("MainCam", TallyState::Program).await;
        assert_eq!(table.get("MainCam").await, Some(TallyState::Program));
        assert_eq!(table.get("maincam").await, None); // case-sensitive
    }

    #[tokio::test]
    async fn test_dispatch_actuates_change_exactly_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = mapped_camera(1, addr, "MainCam");
        let (camera, mut socket, shutdown) = connected_camera(&listener, &config).await;

        let mut cameras = HashMap::new();
        cameras.insert(1u8, Arc::clone(&camera));
        let table = TallyTable::new();
        let settings = NdiSettings::default();

        table.observe("MainCam", TallyState::Program).await;
        dispatch_once(&cameras, &table, &settings).await;
        assert_eq!(camera.tally_state().await, TallyState::Program);

        let mut received = [0u8; 8];
        socket.read_exact(&mut received).await.unwrap();
        assert_eq!(received, PROGRAM_CMD);

        // Same observation again: no further write
        table.observe("MainCam", TallyState::Program).await;
        dispatch_once(&cameras, &table, &settings).await;

        // A transition actuates the off command next
        table.observe("MainCam", TallyState::Off).await;
        dispatch_once(&cameras, &table, &settings).await;
        assert_eq!(camera.tally_state().await, TallyState::Off);

        socket.read_exact(&mut received).await.unwrap();
        assert_eq!(received, OFF_CMD, "duplicate program write would show here");

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_program_preview_resolution() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = mapped_camera(1, addr, "MainCam");
        let (camera, mut socket, shutdown) = connected_camera(&listener, &config).await;

        let mut cameras = HashMap::new();
        cameras.insert(1u8, Arc::clone(&camera));
        let table = TallyTable::new();
        let settings = NdiSettings {
            program_tally_priority: false,
            ..NdiSettings::default()
        };

        table.observe("MainCam", TallyState::ProgramPreview).await;
        dispatch_once(&cameras, &table, &settings).await;

        let mut received = [0u8; 8];
        socket.read_exact(&mut received).await.unwrap();
        assert_eq!(received, PREVIEW_CMD);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_unmapped_sources_and_cameras_ignored() {
        let config = CameraConfig {
            id: 5,
            name: "Bare".into(),
            ip_address: "127.0.0.1".into(),
            port: 1,
            reconnect_interval: 1000,
            ndi_mapping: None,
        };
        let camera = Arc::new(Camera::from_config(&config).unwrap());
        let mut cameras = HashMap::new();
        cameras.insert(5u8, Arc::clone(&camera));

        let table = TallyTable::new();
        table.observe("SomeOtherSource", TallyState::Program).await;

        // No mapping: the pass must not touch the camera
        dispatch_once(&cameras, &table, &NdiSettings::default()).await;
        assert_eq!(camera.tally_state().await, TallyState::Off);
    }

    #[tokio::test]
    async fn test_failed_delivery_keeps_state_for_retry() {
        // Camera with a mapping but no connection: delivery fails and the
        // recorded state must stay put so the next tick retries
        let config = mapped_camera(3, SocketAddr::from(([127, 0, 0, 1], 1)), "MainCam");
        let camera = Arc::new(Camera::from_config(&config).unwrap());
        let mut cameras = HashMap::new();
        cameras.insert(3u8, Arc::clone(&camera));

        let table = TallyTable::new();
        table.observe("MainCam", TallyState::Program).await;
        dispatch_once(&cameras, &table, &NdiSettings::default()).await;

        assert_eq!(camera.tally_state().await, TallyState::Off);
        assert!(camera.last_tally_update().await.is_none());
    }
}
