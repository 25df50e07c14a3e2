//! Server side of the proxy
//!
//! Co-located with the cameras: dials each camera over VISCA-IP TCP,
//! accepts SRT peers, routes their frames, and drives tally lamps from the
//! observations in the state table.

pub mod camera;
pub mod config;
pub mod peer;
pub mod supervisor;
pub mod tally;

pub use camera::Camera;
pub use config::{CameraConfig, NdiSettings, ServerConfig};
pub use supervisor::ViscaSrtServer;
pub use tally::TallyTable;
