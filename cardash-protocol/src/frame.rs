//! Decoded frames and frame-level errors
//!
//! Frame format (before COBS encoding):
//! - HEADER (7 bytes): see [`FrameHeader`]
//! - PAYLOAD (`payload_len` bytes): type-specific data
//! - CRC16 (2 bytes, LE): CRC-16/CCITT-FALSE over HEADER + PAYLOAD

use crate::cobs::CobsError;
use crate::config::{PROTOCOL_VERSION, TRAILER_LEN};
use crate::crc16::verify_trailer;
use crate::header::{FrameHeader, MsgType, HEADER_LEN};

/// Errors that can occur while turning a delimited span into a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Span exceeded the receive buffer before its delimiter arrived
    FrameTooLarge,
    /// COBS structure invalid
    Decode(CobsError),
    /// Fewer bytes than a header, or trailer missing
    ShortFrame,
    /// Fewer payload bytes than `payload_len` announces
    LengthMismatch,
    /// Trailer does not match header + payload
    CrcMismatch,
    /// Header version differs from [`PROTOCOL_VERSION`]
    UnsupportedVersion(u8),
}

impl From<CobsError> for FrameError {
    fn from(e: CobsError) -> Self {
        FrameError::Decode(e)
    }
}

/// A validated inbound frame
///
/// Borrows the assembler's receive buffer, so it lives only until the next
/// byte is fed. Copy out anything that must outlive dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame<'a> {
    pub header: FrameHeader,
    pub payload: &'a [u8],
    pub crc: u16,
}

impl<'a> DecodedFrame<'a> {
    /// Split and verify a COBS-decoded byte run
    ///
    /// Bytes after the trailer are ignored.
    pub fn parse(raw: &'a [u8]) -> Result<Self, FrameError> {
        let header = FrameHeader::from_bytes(raw).ok_or(FrameError::ShortFrame)?;

        let payload_end = HEADER_LEN + header.payload_len as usize;
        if raw.len() < payload_end {
            return Err(FrameError::LengthMismatch);
        }

        let trailer_end = payload_end + TRAILER_LEN;
        if raw.len() < trailer_end {
            return Err(FrameError::ShortFrame);
        }

        let payload = &raw[HEADER_LEN..payload_end];
        let trailer = &raw[payload_end..trailer_end];
        if !verify_trailer(&raw[..HEADER_LEN], payload, trailer) {
            return Err(FrameError::CrcMismatch);
        }

        if header.version != PROTOCOL_VERSION {
            return Err(FrameError::UnsupportedVersion(header.version));
        }

        Ok(Self {
            header,
            payload,
            crc: u16::from_le_bytes([trailer[0], trailer[1]]),
        })
    }

    /// Message type shortcut
    pub fn msg_type(&self) -> MsgType {
        self.header.msg_type
    }

    /// Sequence number shortcut
    pub fn seq(&self) -> u16 {
        self.header.seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::raw_frame;

    #[test]
    fn test_parse_valid() {
        let raw = raw_frame(MsgType::ParamGet, 7, &[0x03, 0x00]);
        let frame = DecodedFrame::parse(&raw).unwrap();
        assert_eq!(frame.msg_type(), MsgType::ParamGet);
        assert_eq!(frame.seq(), 7);
        assert_eq!(frame.payload, &[0x03, 0x00]);
        assert_eq!(frame.header.payload_len, 2);
    }

    #[test]
    fn test_parse_short_header() {
        assert_eq!(
            DecodedFrame::parse(&[1, 2, 3, 4, 5]),
            Err(FrameError::ShortFrame)
        );
    }

    #[test]
    fn test_parse_truncated_payload() {
        let raw = raw_frame(MsgType::Telemetry, 1, &[1, 2, 3, 4]);
        assert_eq!(
            DecodedFrame::parse(&raw[..HEADER_LEN + 2]),
            Err(FrameError::LengthMismatch)
        );
    }

    #[test]
    fn test_parse_missing_trailer() {
        let raw = raw_frame(MsgType::Telemetry, 1, &[1, 2]);
        assert_eq!(
            DecodedFrame::parse(&raw[..raw.len() - 1]),
            Err(FrameError::ShortFrame)
        );
    }

    #[test]
    fn test_parse_bad_crc() {
        let mut raw = raw_frame(MsgType::HelloReq, 1, &[]);
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert_eq!(DecodedFrame::parse(&raw), Err(FrameError::CrcMismatch));
    }

    #[test]
    fn test_parse_ignores_trailing_bytes() {
        let mut raw = raw_frame(MsgType::Ack, 9, &[9, 0]);
        raw.extend_from_slice(&[0xAA, 0xBB]);
        let frame = DecodedFrame::parse(&raw).unwrap();
        assert_eq!(frame.payload, &[9, 0]);
    }

    #[test]
    fn test_parse_wrong_version() {
        let mut header = FrameHeader::new(MsgType::HelloReq, 1, 0, 0);
        header.version = 2;
        let raw = crate::testutil::raw_frame_with_header(header, &[]);
        assert_eq!(
            DecodedFrame::parse(&raw),
            Err(FrameError::UnsupportedVersion(2))
        );
    }
}
