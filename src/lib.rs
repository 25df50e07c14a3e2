//! # visca-srt
//!
//! A bidirectional proxy that tunnels VISCA-IP camera control and NDI tally
//! events through a single SRT session.
//!
//! Deployed as a matched pair:
//!
//! ```text
//! controller --TCP--> [client] ==SRT== [server] --TCP--> camera
//! ```
//!
//! The [`server`] sits next to the cameras: it dials each one over
//! VISCA-IP, accepts SRT peers, and runs the tally dispatcher. The
//! [`client`] sits next to the controllers: it listens for them locally and
//! proxies transparently. Traffic for every camera is multiplexed over the
//! one session by an 8-bit camera id; see [`protocol`] for the framing.
//!
//! Any SRT peer may also inject tally frames (an external NDI discovery
//! process, typically); the server collapses them into per-source state and
//! actuates camera tally lamps at a bounded rate.

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;
pub mod srt;

pub use client::ViscaSrtClient;
pub use error::{ConfigError, Error, ProtocolError, Result};
pub use protocol::{Frame, TallyFrame, TallyState, ViscaFrame, ViscaType};
pub use server::ViscaSrtServer;
