//! Multiplex protocol framed on the SRT session
//!
//! The codec is deliberately byte-agnostic about VISCA payloads; the only
//! payload inspection in the whole crate is the structural check in
//! [`visca`], applied server-side before forwarding to a camera.

pub mod constants;
pub mod frame;
pub mod visca;

pub use constants::{DEFAULT_VISCA_PORT, FRAME_HEADER_LEN, MAX_FRAME_LEN, MAX_VISCA_PAYLOAD};
pub use frame::{Frame, TallyFrame, TallyState, ViscaFrame, ViscaType};
