//! Frame codec for the SRT session
//!
//! Every SRT datagram carries exactly one frame; the transport preserves
//! message boundaries, so a frame is never split or coalesced. Two kinds
//! exist, distinguished by the first byte:
//!
//! ```text
//! VISCA frame (kind 0x01):
//!   offset 0 : 0x01            kind
//!   offset 1 : subtype         0x01 command | 0x02 response | 0x03 inquiry | 0xFF error
//!   offset 2 : camera_id       u8
//!   offset 3 : sequence        u16 big-endian
//!   offset 5 : length = N      u16 big-endian
//!   offset 7 : data            N bytes
//!
//! Tally frame (kind 0x02):
//!   offset 0 : 0x02            kind
//!   offset 1 : state           0x00 off | 0x01 program | 0x02 preview | 0x03 both
//!   offset 2 : name_length = M u8
//!   offset 3 : timestamp       u32 big-endian, seconds
//!   offset 7 : name            M bytes, UTF-8
//! ```
//!
//! Encoding is exact-size; decoding demands that the declared length matches
//! the bytes present exactly.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

use super::constants::{FRAME_HEADER_LEN, KIND_TALLY, KIND_VISCA, MAX_FRAME_LEN};

/// VISCA message subtype carried in the frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ViscaType {
    Command = 0x01,
    Response = 0x02,
    Inquiry = 0x03,
    Error = 0xFF,
}

impl TryFrom<u8> for ViscaType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x01 => Ok(ViscaType::Command),
            0x02 => Ok(ViscaType::Response),
            0x03 => Ok(ViscaType::Inquiry),
            0xFF => Ok(ViscaType::Error),
            other => Err(ProtocolError::UnknownViscaType(other)),
        }
    }
}

/// NDI tally state of a video source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TallyState {
    #[default]
    Off = 0x00,
    Program = 0x01,
    Preview = 0x02,
    /// On program and preview at once (e.g. during a transition)
    ProgramPreview = 0x03,
}

impl TryFrom<u8> for TallyState {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x00 => Ok(TallyState::Off),
            0x01 => Ok(TallyState::Program),
            0x02 => Ok(TallyState::Preview),
            0x03 => Ok(TallyState::ProgramPreview),
            other => Err(ProtocolError::UnknownTallyState(other)),
        }
    }
}

impl std::fmt::Display for TallyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TallyState::Off => "off",
            TallyState::Program => "program",
            TallyState::Preview => "preview",
            TallyState::ProgramPreview => "program+preview",
        };
        f.write_str(name)
    }
}

/// A VISCA payload addressed to (or coming from) one camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViscaFrame {
    pub visca_type: ViscaType,
    pub camera_id: u8,
    /// Correlates a command with its response for tracing; responses use 0
    pub sequence: u16,
    pub data: Bytes,
}

impl ViscaFrame {
    /// Build a command frame as issued by the client on behalf of a controller
    pub fn command(camera_id: u8, sequence: u16, data: Bytes) -> Self {
        Self {
            visca_type: ViscaType::Command,
            camera_id,
            sequence,
            data,
        }
    }

    /// Build a response frame for bytes read back from a camera
    ///
    /// Responses are not correlated to a specific command, so the sequence
    /// field is zero.
    pub fn response(camera_id: u8, data: Bytes) -> Self {
        Self {
            visca_type: ViscaType::Response,
            camera_id,
            sequence: 0,
            data,
        }
    }
}

/// An NDI tally observation for one named source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyFrame {
    pub state: TallyState,
    /// Seconds, as stamped by the producer of the event
    pub timestamp: u32,
    /// NDI source name, matched case-sensitively against camera mappings
    pub source_name: String,
}

/// One frame on the SRT session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Visca(ViscaFrame),
    Tally(TallyFrame),
}

impl Frame {
    /// Serialize into the exact wire representation
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        match self {
            Frame::Visca(frame) => {
                if frame.data.len() > u16::MAX as usize {
                    return Err(ProtocolError::FrameTooLarge(
                        FRAME_HEADER_LEN + frame.data.len(),
                    ));
                }
                let total = FRAME_HEADER_LEN + frame.data.len();
                if total > MAX_FRAME_LEN {
                    return Err(ProtocolError::FrameTooLarge(total));
                }
                let mut buf = BytesMut::with_capacity(total);
                buf.put_u8(KIND_VISCA);
                buf.put_u8(frame.visca_type as u8);
                buf.put_u8(frame.camera_id);
                buf.put_u16(frame.sequence);
                buf.put_u16(frame.data.len() as u16);
                buf.put_slice(&frame.data);
                Ok(buf.freeze())
            }
            Frame::Tally(frame) => {
                let name = frame.source_name.as_bytes();
                if name.len() > u8::MAX as usize {
                    return Err(ProtocolError::NameTooLong(name.len()));
                }
                let total = FRAME_HEADER_LEN + name.len();
                if total > MAX_FRAME_LEN {
                    return Err(ProtocolError::FrameTooLarge(total));
                }
                let mut buf = BytesMut::with_capacity(total);
                buf.put_u8(KIND_TALLY);
                buf.put_u8(frame.state as u8);
                buf.put_u8(name.len() as u8);
                buf.put_u32(frame.timestamp);
                buf.put_slice(name);
                Ok(buf.freeze())
            }
        }
    }

    /// Parse one frame from a complete SRT datagram
    ///
    /// The buffer must hold exactly one frame; any surplus or deficit is a
    /// protocol error, because the transport guarantees message boundaries.
    pub fn decode(buf: &[u8]) -> Result<Frame, ProtocolError> {
        if buf.len() < FRAME_HEADER_LEN {
            return Err(ProtocolError::Truncated {
                needed: FRAME_HEADER_LEN,
                got: buf.len(),
            });
        }
        match buf[0] {
            KIND_VISCA => {
                let mut body = &buf[1..];
                let visca_type = ViscaType::try_from(body.get_u8())?;
                let camera_id = body.get_u8();
                let sequence = body.get_u16();
                let length = body.get_u16() as usize;
                if body.remaining() != length {
                    return Err(ProtocolError::LengthMismatch {
                        declared: length,
                        actual: body.remaining(),
                    });
                }
                Ok(Frame::Visca(ViscaFrame {
                    visca_type,
                    camera_id,
                    sequence,
                    data: Bytes::copy_from_slice(body),
                }))
            }
            KIND_TALLY => {
                let mut body = &buf[1..];
                let state = TallyState::try_from(body.get_u8())?;
                let name_length = body.get_u8() as usize;
                let timestamp = body.get_u32();
                if body.remaining() != name_length {
                    return Err(ProtocolError::LengthMismatch {
                        declared: name_length,
                        actual: body.remaining(),
                    });
                }
                let source_name = String::from_utf8(body.to_vec())?;
                Ok(Frame::Tally(TallyFrame {
                    state,
                    timestamp,
                    source_name,
                }))
            }
            other => Err(ProtocolError::UnknownKind(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visca_fixture() -> Frame {
        Frame::Visca(ViscaFrame::command(
            1,
            42,
            Bytes::from_static(&[0x81, 0x01, 0x04, 0x3F, 0x02, 0x01, 0xFF]),
        ))
    }

    fn tally_fixture() -> Frame {
        Frame::Tally(TallyFrame {
            state: TallyState::Program,
            timestamp: 0,
            source_name: "MainCam".to_string(),
        })
    }

    #[test]
    fn test_visca_round_trip() {
        let frame = visca_fixture();
        let encoded = frame.encode().unwrap();
        assert_eq!(Frame::decode(&encoded).unwrap(), frame);
    }

    #[test]
    fn test_tally_round_trip() {
        let frame = tally_fixture();
        let encoded = frame.encode().unwrap();
        assert_eq!(Frame::decode(&encoded).unwrap(), frame);
    }

    #[test]
    fn test_visca_wire_layout() {
        let encoded = visca_fixture().encode().unwrap();
        assert_eq!(encoded.len(), 7 + 7);
        assert_eq!(encoded[0], 0x01); // kind
        assert_eq!(encoded[1], 0x01); // command subtype
        assert_eq!(encoded[2], 1); // camera id
        assert_eq!(&encoded[3..5], &[0x00, 0x2A]); // sequence, big-endian
        assert_eq!(&encoded[5..7], &[0x00, 0x07]); // length, big-endian
        assert_eq!(&encoded[7..], &[0x81, 0x01, 0x04, 0x3F, 0x02, 0x01, 0xFF]);
    }

    #[test]
    fn test_tally_wire_layout() {
        // The exact datagram for state=program, source "MainCam"
        let encoded = tally_fixture().encode().unwrap();
        let expected = [
            0x02, 0x01, 0x07, 0x00, 0x00, 0x00, 0x00, 0x4D, 0x61, 0x69, 0x6E, 0x43, 0x61, 0x6D,
        ];
        assert_eq!(&encoded[..], &expected);
    }

    #[test]
    fn test_tally_decode_from_raw_datagram() {
        let raw = [
            0x02, 0x01, 0x07, 0x00, 0x00, 0x00, 0x00, 0x4D, 0x61, 0x69, 0x6E, 0x43, 0x61, 0x6D,
        ];
        match Frame::decode(&raw).unwrap() {
            Frame::Tally(frame) => {
                assert_eq!(frame.state, TallyState::Program);
                assert_eq!(frame.source_name, "MainCam");
                assert_eq!(frame.timestamp, 0);
            }
            other => panic!("expected tally frame, got {other:?}"),
        }
    }

    #[test]
    fn test_encoded_size_is_exact() {
        let data = Bytes::from(vec![0x81, 0xFF]);
        let frame = Frame::Visca(ViscaFrame::response(9, data.clone()));
        assert_eq!(frame.encode().unwrap().len(), 7 + data.len());

        let frame = Frame::Tally(TallyFrame {
            state: TallyState::Off,
            timestamp: 1_700_000_000,
            source_name: "Studio B".to_string(),
        });
        assert_eq!(frame.encode().unwrap().len(), 7 + "Studio B".len());
    }

    #[test]
    fn test_under_length_buffers_rejected() {
        for len in 0..7 {
            let buf = vec![0x01u8; len];
            assert!(matches!(
                Frame::decode(&buf),
                Err(ProtocolError::Truncated { .. })
            ));
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let buf = [0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            Frame::decode(&buf),
            Err(ProtocolError::UnknownKind(0x03))
        ));
    }

    #[test]
    fn test_unknown_visca_subtype_rejected() {
        let buf = [0x01, 0x42, 0x01, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            Frame::decode(&buf),
            Err(ProtocolError::UnknownViscaType(0x42))
        ));
    }

    #[test]
    fn test_unknown_tally_state_rejected() {
        let buf = [0x02, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            Frame::decode(&buf),
            Err(ProtocolError::UnknownTallyState(0x04))
        ));
    }

    #[test]
    fn test_declared_length_must_match_payload() {
        // Claims 4 payload bytes, carries 2
        let short = [0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x04, 0x81, 0xFF];
        assert!(matches!(
            Frame::decode(&short),
            Err(ProtocolError::LengthMismatch {
                declared: 4,
                actual: 2
            })
        ));

        // Claims 1 payload byte, carries 3
        let long = [0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x01, 0x81, 0x00, 0xFF];
        assert!(matches!(
            Frame::decode(&long),
            Err(ProtocolError::LengthMismatch {
                declared: 1,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_name_length_claiming_absent_bytes_rejected() {
        let buf = [0x02, 0x01, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x41, 0x42];
        assert!(matches!(
            Frame::decode(&buf),
            Err(ProtocolError::LengthMismatch {
                declared: 10,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_non_utf8_name_rejected() {
        let buf = [0x02, 0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFE];
        assert!(matches!(
            Frame::decode(&buf),
            Err(ProtocolError::InvalidName(_))
        ));
    }

    #[test]
    fn test_empty_visca_payload_round_trips() {
        let frame = Frame::Visca(ViscaFrame::response(0, Bytes::new()));
        let encoded = frame.encode().unwrap();
        assert_eq!(encoded.len(), 7);
        assert_eq!(Frame::decode(&encoded).unwrap(), frame);
    }

    #[test]
    fn test_oversized_payload_rejected_on_encode() {
        let frame = Frame::Visca(ViscaFrame::response(1, Bytes::from(vec![0u8; 1494])));
        assert!(matches!(
            frame.encode(),
            Err(ProtocolError::FrameTooLarge(1501))
        ));
    }

    #[test]
    fn test_oversized_name_rejected_on_encode() {
        let frame = Frame::Tally(TallyFrame {
            state: TallyState::Off,
            timestamp: 0,
            source_name: "x".repeat(256),
        });
        assert!(matches!(frame.encode(), Err(ProtocolError::NameTooLong(256))));
    }

    #[test]
    fn test_sequence_survives_round_trip_at_wrap_boundary() {
        let frame = Frame::Visca(ViscaFrame::command(
            7,
            u16::MAX,
            Bytes::from_static(&[0x81, 0xFF]),
        ));
        let encoded = frame.encode().unwrap();
        assert_eq!(Frame::decode(&encoded).unwrap(), frame);
    }
}
