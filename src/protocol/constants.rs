//! Wire protocol constants

/// Frame kind byte for VISCA traffic
pub const KIND_VISCA: u8 = 0x01;

/// Frame kind byte for NDI tally events
pub const KIND_TALLY: u8 = 0x02;

/// Fixed header length shared by both frame kinds
pub const FRAME_HEADER_LEN: usize = 7;

/// Largest encoded frame accepted on the wire
///
/// Keeps one frame inside a single SRT datagram under common MTU policies.
pub const MAX_FRAME_LEN: usize = 1500;

/// Largest VISCA payload that still fits `MAX_FRAME_LEN` after framing
pub const MAX_VISCA_PAYLOAD: usize = MAX_FRAME_LEN - FRAME_HEADER_LEN;

/// Default VISCA-IP control port
pub const DEFAULT_VISCA_PORT: u16 = 52381;

// VISCA structural markers
pub const VISCA_COMMAND_PREFIX: u8 = 0x81;
pub const VISCA_INQUIRY_PREFIX: u8 = 0x82;
pub const VISCA_RESPONSE_PREFIX: u8 = 0x90;
pub const VISCA_TERMINATOR: u8 = 0xFF;
