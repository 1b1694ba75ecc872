//! Outbound frame construction
//!
//! Header, payload and trailer are COBS-encoded straight into the transmit
//! buffer, the `0x00` delimiter is appended, and the whole frame is handed
//! to the [`ByteSink`] in one write.

use cardash_hal::{ByteSink, WouldBlock};

use crate::app::ErrorCode;
use crate::cobs::{CobsError, Encoder};
use crate::config::{MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE};
use crate::crc16::compute_trailer;
use crate::header::{FrameHeader, MsgType};

/// Errors that can occur while sending a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EmitError {
    /// Payload would not fit the transmit buffer once encoded
    PayloadTooLarge,
    /// Sink is full; nothing was queued
    WouldBlock,
}

impl From<WouldBlock> for EmitError {
    fn from(_: WouldBlock) -> Self {
        EmitError::WouldBlock
    }
}

impl From<CobsError> for EmitError {
    fn from(_: CobsError) -> Self {
        EmitError::PayloadTooLarge
    }
}

/// Frame accepted by the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sent {
    /// Seq carried in the header
    pub seq: u16,
    /// Encoded length, delimiter included
    pub len: usize,
}

/// Frame builder owning the transmit buffer and the outbound sequence counter
pub struct FrameEmitter {
    buf: [u8; MAX_FRAME_SIZE],
    seq: u16,
}

impl Default for FrameEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameEmitter {
    /// Create an emitter; the first fresh frame gets seq 1
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_FRAME_SIZE],
            seq: 0,
        }
    }

    /// Seq of the last fresh frame sent (0 before the first)
    pub fn current_seq(&self) -> u16 {
        self.seq
    }

    /// Send a fresh frame with the next outbound seq
    ///
    /// The counter only advances if the sink accepted the frame.
    pub fn send<S: ByteSink>(
        &mut self,
        sink: &mut S,
        msg_type: MsgType,
        flags: u8,
        payload: &[u8],
    ) -> Result<Sent, EmitError> {
        let seq = self.seq.wrapping_add(1);
        let sent = self.emit(sink, msg_type, seq, flags, payload)?;
        self.seq = seq;
        Ok(sent)
    }

    /// Send a response echoing a request's seq
    pub fn reply<S: ByteSink>(
        &mut self,
        sink: &mut S,
        msg_type: MsgType,
        seq: u16,
        flags: u8,
        payload: &[u8],
    ) -> Result<Sent, EmitError> {
        self.emit(sink, msg_type, seq, flags, payload)
    }

    /// ACK a request; the payload repeats the acknowledged seq
    pub fn send_ack<S: ByteSink>(&mut self, sink: &mut S, seq: u16) -> Result<Sent, EmitError> {
        self.reply(sink, MsgType::Ack, seq, 0, &seq.to_le_bytes())
    }

    /// Reject a request: `[reason][seq LE]`
    pub fn send_error<S: ByteSink>(
        &mut self,
        sink: &mut S,
        seq: u16,
        code: ErrorCode,
    ) -> Result<Sent, EmitError> {
        let seq_bytes = seq.to_le_bytes();
        self.reply(
            sink,
            MsgType::Error,
            seq,
            0,
            &[code.to_byte(), seq_bytes[0], seq_bytes[1]],
        )
    }

    /// Send an opaque telemetry sample
    pub fn send_telemetry<S: ByteSink>(
        &mut self,
        sink: &mut S,
        payload: &[u8],
    ) -> Result<Sent, EmitError> {
        self.send(sink, MsgType::Telemetry, 0, payload)
    }

    fn emit<S: ByteSink>(
        &mut self,
        sink: &mut S,
        msg_type: MsgType,
        seq: u16,
        flags: u8,
        payload: &[u8],
    ) -> Result<Sent, EmitError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(EmitError::PayloadTooLarge);
        }

        let header = FrameHeader::new(msg_type, seq, flags, payload.len() as u16).to_bytes();
        let trailer = compute_trailer(&header, payload);

        // Last byte is reserved for the delimiter
        let mut encoder = Encoder::new(&mut self.buf[..MAX_FRAME_SIZE - 1])?;
        encoder.extend(&header)?;
        encoder.extend(payload)?;
        encoder.extend(&trailer)?;
        let len = encoder.finish();
        self.buf[len] = 0;

        sink.write(&self.buf[..len + 1])?;
        Ok(Sent { seq, len: len + 1 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MemorySink;

    #[test]
    fn test_fresh_seq_starts_at_one() {
        let mut emitter = FrameEmitter::new();
        let mut sink = MemorySink::new();
        assert_eq!(emitter.current_seq(), 0);

        assert_eq!(emitter.send(&mut sink, MsgType::HelloRsp, 0, &[1]).unwrap().seq, 1);
        assert_eq!(emitter.send_telemetry(&mut sink, &[2, 3]).unwrap().seq, 2);
        assert_eq!(emitter.current_seq(), 2);

        let sent = sink.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].header.seq, 1);
        assert_eq!(sent[1].header.msg_type, MsgType::Telemetry);
        assert_eq!(sent[1].payload, [2, 3]);
    }

    #[test]
    fn test_reply_does_not_advance_seq() {
        let mut emitter = FrameEmitter::new();
        let mut sink = MemorySink::new();

        emitter.send_ack(&mut sink, 500).unwrap();
        emitter.send_error(&mut sink, 501, ErrorCode::OutOfRange).unwrap();
        assert_eq!(emitter.current_seq(), 0);

        let sent = sink.sent();
        assert_eq!(sent[0].header.msg_type, MsgType::Ack);
        assert_eq!(sent[0].header.seq, 500);
        assert_eq!(sent[0].payload, 500u16.to_le_bytes());
        assert_eq!(sent[1].header.msg_type, MsgType::Error);
        assert_eq!(sent[1].header.seq, 501);
        assert_eq!(sent[1].payload, [0x04, 0xF5, 0x01]);
    }

    #[test]
    fn test_frame_ends_with_single_delimiter() {
        let mut emitter = FrameEmitter::new();
        let mut sink = MemorySink::new();
        let sent = emitter
            .reply(&mut sink, MsgType::ParamVal, 3, 0, &[0, 0, 0, 0])
            .unwrap();
        let len = sent.len;
        assert_eq!(sent.seq, 3);

        assert_eq!(sink.outbound.len(), len);
        assert_eq!(sink.outbound.last(), Some(&0));
        assert!(!sink.outbound[..len - 1].contains(&0));
    }

    #[test]
    fn test_seq_wraps() {
        let mut emitter = FrameEmitter::new();
        let mut sink = MemorySink::new();
        emitter.seq = u16::MAX;
        assert_eq!(emitter.send_telemetry(&mut sink, &[]).unwrap().seq, 0);
    }

    #[test]
    fn test_max_payload_fits() {
        let mut emitter = FrameEmitter::new();
        let mut sink = MemorySink::new();
        // Worst case for COBS: no zeros at all
        let payload = [0xA5u8; MAX_PAYLOAD_SIZE];
        emitter.send_telemetry(&mut sink, &payload).unwrap();

        assert!(sink.outbound.len() <= MAX_FRAME_SIZE);
        assert_eq!(sink.sent()[0].payload, payload);
    }

    #[test]
    fn test_payload_too_large() {
        let mut emitter = FrameEmitter::new();
        let mut sink = MemorySink::new();
        let payload = [0u8; MAX_PAYLOAD_SIZE + 1];
        assert_eq!(
            emitter.send_telemetry(&mut sink, &payload),
            Err(EmitError::PayloadTooLarge)
        );
        assert!(sink.outbound.is_empty());
        assert_eq!(emitter.current_seq(), 0);
    }

    #[test]
    fn test_would_block_keeps_seq() {
        let mut emitter = FrameEmitter::new();
        let mut sink = MemorySink::new();
        sink.tx_room = 4;

        assert_eq!(
            emitter.send(&mut sink, MsgType::HelloRsp, 0, &[1, 2, 3]),
            Err(EmitError::WouldBlock)
        );
        assert_eq!(emitter.current_seq(), 0);

        sink.tx_room = usize::MAX;
        let sent = emitter.send(&mut sink, MsgType::HelloRsp, 0, &[1, 2, 3]).unwrap();
        assert_eq!(sent.seq, 1);
        assert_eq!(sent.len, sink.outbound.len());
    }
}
