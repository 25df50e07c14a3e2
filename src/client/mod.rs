//! Client side of the proxy
//!
//! Co-located with the controllers: listens for them over TCP, frames their
//! bytes onto the SRT session, and writes camera responses back.

pub mod config;
pub mod endpoint;
pub mod supervisor;

pub use config::{ClientConfig, EndpointConfig, SrtServerConfig};
pub use endpoint::{Endpoint, SequenceCounter};
pub use supervisor::ViscaSrtClient;
