//! Shared test helpers (host only)

use cardash_hal::{ByteSink, WouldBlock};

use crate::cobs;
use crate::crc16::compute_trailer;
use crate::frame::DecodedFrame;
use crate::header::{FrameHeader, MsgType};

/// Unencoded frame bytes: header + payload + trailer
pub fn raw_frame(msg_type: MsgType, seq: u16, payload: &[u8]) -> Vec<u8> {
    raw_frame_with_header(
        FrameHeader::new(msg_type, seq, 0, payload.len() as u16),
        payload,
    )
}

/// Unencoded frame bytes with an explicit header
pub fn raw_frame_with_header(header: FrameHeader, payload: &[u8]) -> Vec<u8> {
    let header = header.to_bytes();
    let mut raw = header.to_vec();
    raw.extend_from_slice(payload);
    raw.extend_from_slice(&compute_trailer(&header, payload));
    raw
}

/// COBS-encode raw bytes and append the delimiter
pub fn wire(raw: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; cobs::max_encoded_len(raw.len())];
    let n = cobs::encode(raw, &mut out).unwrap();
    out.truncate(n);
    out.push(0);
    out
}

/// Wire bytes for a well-formed frame
pub fn wire_frame(msg_type: MsgType, seq: u16, payload: &[u8]) -> Vec<u8> {
    wire(&raw_frame(msg_type, seq, payload))
}

/// Owned copy of a decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFrame {
    pub header: FrameHeader,
    pub payload: Vec<u8>,
}

impl From<DecodedFrame<'_>> for OwnedFrame {
    fn from(frame: DecodedFrame<'_>) -> Self {
        Self {
            header: frame.header,
            payload: frame.payload.to_vec(),
        }
    }
}

/// Split a captured byte stream on delimiters and parse every frame
pub fn parse_stream(bytes: &[u8]) -> Vec<OwnedFrame> {
    bytes
        .split(|&b| b == 0)
        .filter(|span| !span.is_empty())
        .map(|span| {
            let mut buf = span.to_vec();
            let n = cobs::decode_in_place(&mut buf).unwrap();
            OwnedFrame::from(DecodedFrame::parse(&buf[..n]).unwrap())
        })
        .collect()
}

/// In-memory byte sink
///
/// Inbound bytes are delivered in chunks of at most `chunk` bytes;
/// `tx_room` bounds the outbound capacity.
pub struct MemorySink {
    pub inbound: Vec<u8>,
    pub outbound: Vec<u8>,
    pub chunk: usize,
    pub tx_room: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            inbound: Vec::new(),
            outbound: Vec::new(),
            chunk: usize::MAX,
            tx_room: usize::MAX,
        }
    }

    pub fn with_inbound(bytes: &[u8]) -> Self {
        let mut sink = Self::new();
        sink.inbound.extend_from_slice(bytes);
        sink
    }

    /// Frames written so far
    pub fn sent(&self) -> Vec<OwnedFrame> {
        parse_stream(&self.outbound)
    }
}

impl ByteSink for MemorySink {
    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        let n = self.inbound.len().min(buf.len()).min(self.chunk);
        buf[..n].copy_from_slice(&self.inbound[..n]);
        self.inbound.drain(..n);
        n
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), WouldBlock> {
        if self.outbound.len() + bytes.len() > self.tx_room {
            return Err(WouldBlock);
        }
        self.outbound.extend_from_slice(bytes);
        Ok(())
    }
}
