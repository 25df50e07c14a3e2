//! Error types for the VISCA-SRT proxy
//!
//! Three layers: `ConfigError` for anything fatal at startup, `ProtocolError`
//! for malformed frames on the wire, and the crate-level `Error` that the
//! supervisors and connectors propagate.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or unreadable configuration (fatal at startup, never later)
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Malformed frame on the SRT session
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Socket-level failure (TCP or SRT)
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame was addressed to a camera whose TCP connection is down
    #[error("camera {id} is not connected")]
    CameraOffline { id: u8 },

    /// The SRT server did not answer within `connection_timeout`
    #[error("srt connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },
}

/// Frame-level protocol violations
///
/// Every variant maps to "drop the frame, log, keep the session alive" —
/// repeated protocol errors never tear down a peer.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame truncated: need at least {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("unknown frame kind {0:#04x}")]
    UnknownKind(u8),

    #[error("unknown VISCA message type {0:#04x}")]
    UnknownViscaType(u8),

    #[error("unknown tally state {0:#04x}")]
    UnknownTallyState(u8),

    #[error("declared payload length {declared} does not match {actual} bytes present")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("source name is not valid UTF-8")]
    InvalidName(#[from] std::string::FromUtf8Error),

    #[error("encoded frame of {0} bytes exceeds the {max} byte limit", max = crate::protocol::MAX_FRAME_LEN)]
    FrameTooLarge(usize),

    #[error("source name of {0} bytes does not fit the u8 length field")]
    NameTooLong(usize),

    #[error("VISCA payload failed structural validation")]
    MalformedVisca,
}

/// Configuration problems, all fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("duplicate camera id {0}")]
    DuplicateId(u8),

    #[error("invalid IPv4 address {addr:?} for {name:?}")]
    InvalidAddress { name: String, addr: String },

    #[error("{0}")]
    Invalid(String),
}
