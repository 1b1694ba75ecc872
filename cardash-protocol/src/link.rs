//! Link endpoint
//!
//! Owns one assembler, dispatcher and emitter plus the statistics, and
//! drives them from a single non-blocking [`Link::poll`]. The caller
//! decides the cadence: a superloop, a timer tick or an async task woken
//! by the UART interrupt.

use cardash_hal::ByteSink;

use crate::app::{Application, CommandHandler};
use crate::assembler::{AssemblerState, FrameAssembler};
use crate::config::{HelloInfo, MAX_PAYLOAD_SIZE, RX_RING_SIZE};
use crate::dispatcher::{Dispatcher, RegisterError, Reply};
use crate::emitter::{EmitError, FrameEmitter, Sent};
use crate::header::MsgType;
use crate::stats::LinkStats;

/// Bytes pulled from the sink per read
const READ_CHUNK: usize = 64;

/// Upper bound on bytes consumed by one poll, so a chatty host cannot
/// starve the caller
const POLL_BUDGET: usize = RX_RING_SIZE;

/// What one [`Link::poll`] call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollSummary {
    /// Bytes read from the sink
    pub bytes: usize,
    /// Valid frames dispatched
    pub frames: usize,
    /// Spans rejected by the assembler
    pub errors: usize,
    /// Replies queued on the sink
    pub replies: usize,
    /// Replies dropped because the sink was full
    pub dropped: usize,
}

/// Protocol endpoint
pub struct Link {
    assembler: FrameAssembler,
    dispatcher: Dispatcher,
    emitter: FrameEmitter,
    stats: LinkStats,
    scratch: [u8; MAX_PAYLOAD_SIZE],
}

impl Link {
    /// Create an endpoint advertising `hello` in its handshake
    pub const fn new(hello: HelloInfo) -> Self {
        Self {
            assembler: FrameAssembler::new(),
            dispatcher: Dispatcher::new(hello),
            emitter: FrameEmitter::new(),
            stats: LinkStats::new(),
            scratch: [0; MAX_PAYLOAD_SIZE],
        }
    }

    /// Register the handler for a command type
    pub fn register_handler(
        &mut self,
        msg_type: MsgType,
        handler: CommandHandler,
    ) -> Result<(), RegisterError> {
        self.dispatcher.register_handler(msg_type, handler)
    }

    /// Traffic and error counters
    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Assembler state (for diagnostics)
    pub fn assembler_state(&self) -> AssemblerState {
        self.assembler.state()
    }

    /// Seq of the last fresh frame sent
    pub fn current_seq(&self) -> u16 {
        self.emitter.current_seq()
    }

    /// Drain available inbound bytes, dispatch every complete frame and
    /// queue the replies
    ///
    /// Never blocks. Frame errors are counted and skipped; replies that do
    /// not fit the sink are dropped and counted.
    pub fn poll<S: ByteSink, A: Application>(&mut self, sink: &mut S, app: &mut A) -> PollSummary {
        let mut summary = PollSummary::default();
        let mut chunk = [0u8; READ_CHUNK];

        while summary.bytes < POLL_BUDGET {
            let n = sink.read_available(&mut chunk);
            if n == 0 {
                break;
            }
            summary.bytes += n;
            self.stats.record_rx_bytes(n);

            for &byte in &chunk[..n] {
                let Some(result) = self.assembler.feed(byte) else {
                    continue;
                };
                match result {
                    Ok(frame) => {
                        self.stats.record_rx_frame();
                        summary.frames += 1;
                        let reply = self.dispatcher.dispatch(&frame, app, &mut self.scratch);
                        match emit_reply(&mut self.emitter, sink, reply, &self.scratch) {
                            Some(Ok(sent)) => {
                                self.stats.record_tx_frame(sent.len);
                                summary.replies += 1;
                            }
                            Some(Err(_)) => {
                                self.stats.record_tx_dropped();
                                summary.dropped += 1;
                            }
                            None => {}
                        }
                    }
                    Err(e) => {
                        self.stats.record_rx_error(e);
                        summary.errors += 1;
                    }
                }
            }
        }

        summary
    }

    /// Send a fresh frame of any type
    ///
    /// Returns the seq used. A full sink is counted as a dropped frame.
    pub fn send<S: ByteSink>(
        &mut self,
        sink: &mut S,
        msg_type: MsgType,
        payload: &[u8],
    ) -> Result<u16, EmitError> {
        let result = self.emitter.send(sink, msg_type, 0, payload);
        self.record_tx(&result);
        result.map(|sent| sent.seq)
    }

    /// Send a telemetry sample
    pub fn send_telemetry<S: ByteSink>(
        &mut self,
        sink: &mut S,
        payload: &[u8],
    ) -> Result<u16, EmitError> {
        self.send(sink, MsgType::Telemetry, payload)
    }

    fn record_tx(&mut self, result: &Result<Sent, EmitError>) {
        match result {
            Ok(sent) => self.stats.record_tx_frame(sent.len),
            Err(EmitError::WouldBlock) => self.stats.record_tx_dropped(),
            Err(EmitError::PayloadTooLarge) => {}
        }
    }
}

/// Emit the frame a [`Reply`] describes
fn emit_reply<S: ByteSink>(
    emitter: &mut FrameEmitter,
    sink: &mut S,
    reply: Reply,
    scratch: &[u8],
) -> Option<Result<Sent, EmitError>> {
    match reply {
        Reply::Silent => None,
        Reply::Send { msg_type, len } => Some(emitter.send(sink, msg_type, 0, &scratch[..len])),
        Reply::Echo { msg_type, seq, len } => {
            Some(emitter.reply(sink, msg_type, seq, 0, &scratch[..len]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{ErrorCode, ParamError, ParamId};
    use crate::config::{HelloInfo, MAX_FRAME_SIZE};
    use crate::frame::FrameError;
    use crate::testutil::{raw_frame, wire, wire_frame, MemorySink};

    /// One writable u32 parameter (id 1, range 0..=1000)
    struct Counter {
        value: u32,
    }

    impl Application for Counter {
        fn parameter_dict(&self, out: &mut [u8]) -> Result<usize, ParamError> {
            out[..3].copy_from_slice(b"cnt");
            Ok(3)
        }

        fn set_parameter(&mut self, id: ParamId, value: &[u8]) -> Result<(), ParamError> {
            if id != 1 {
                return Err(ParamError::UnknownId);
            }
            let bytes: [u8; 4] = value.try_into().map_err(|_| ParamError::InvalidLength)?;
            let v = u32::from_le_bytes(bytes);
            if v > 1000 {
                return Err(ParamError::OutOfRange);
            }
            self.value = v;
            Ok(())
        }

        fn get_parameter(&self, id: ParamId, out: &mut [u8]) -> Result<usize, ParamError> {
            if id != 1 {
                return Err(ParamError::UnknownId);
            }
            out[..4].copy_from_slice(&self.value.to_le_bytes());
            Ok(4)
        }
    }

    fn link() -> Link {
        Link::new(HelloInfo::new([0, 1, 0]))
    }

    #[test]
    fn test_hello_gets_single_response() {
        let mut link = link();
        let mut app = Counter { value: 0 };
        let mut sink = MemorySink::with_inbound(&wire_frame(MsgType::HelloReq, 1, &[]));

        let summary = link.poll(&mut sink, &mut app);
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.replies, 1);

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].header.msg_type, MsgType::HelloRsp);
        assert_eq!(sent[0].header.seq, 1);
        assert_eq!(
            HelloInfo::from_bytes(&sent[0].payload),
            Some(HelloInfo::new([0, 1, 0]))
        );
        assert_eq!(link.current_seq(), 1);
    }

    #[test]
    fn test_param_get_replies_differ_only_in_seq() {
        let mut link = link();
        let mut app = Counter { value: 77 };
        let mut stream = wire_frame(MsgType::ParamGet, 10, &[1, 0]);
        stream.extend(wire_frame(MsgType::ParamGet, 11, &[1, 0]));
        let mut sink = MemorySink::with_inbound(&stream);

        link.poll(&mut sink, &mut app);
        let sent = sink.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].header.seq, 10);
        assert_eq!(sent[1].header.seq, 11);
        assert_eq!(sent[0].header.msg_type, sent[1].header.msg_type);
        assert_eq!(sent[0].payload, sent[1].payload);
        assert_eq!(&sent[0].payload[2..], &77u32.to_le_bytes());
        // Responses never consume the outbound counter
        assert_eq!(link.current_seq(), 0);
    }

    #[test]
    fn test_rejected_set_echoes_seq_and_keeps_value() {
        let mut link = link();
        let mut app = Counter { value: 5 };
        let mut payload = vec![1, 0];
        payload.extend_from_slice(&5000u32.to_le_bytes());
        let mut sink = MemorySink::with_inbound(&wire_frame(MsgType::ParamSet, 0x1234, &payload));

        link.poll(&mut sink, &mut app);
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].header.msg_type, MsgType::Error);
        assert_eq!(sent[0].header.seq, 0x1234);
        assert_eq!(sent[0].payload, [ErrorCode::OutOfRange.to_byte(), 0x34, 0x12]);
        assert_eq!(app.value, 5);
    }

    #[test]
    fn test_accepted_set_is_acked() {
        let mut link = link();
        let mut app = Counter { value: 5 };
        let mut payload = vec![1, 0];
        payload.extend_from_slice(&900u32.to_le_bytes());
        let mut sink = MemorySink::with_inbound(&wire_frame(MsgType::ParamSet, 3, &payload));

        link.poll(&mut sink, &mut app);
        let sent = sink.sent();
        assert_eq!(sent[0].header.msg_type, MsgType::Ack);
        assert_eq!(sent[0].payload, [3, 0]);
        assert_eq!(app.value, 900);
    }

    #[test]
    fn test_bare_delimiters_do_nothing() {
        let mut link = link();
        let mut app = Counter { value: 0 };
        let mut sink = MemorySink::with_inbound(&[0x00, 0x00]);

        let summary = link.poll(&mut sink, &mut app);
        assert_eq!(summary.bytes, 2);
        assert_eq!(summary.frames, 0);
        assert_eq!(summary.errors, 0);
        assert!(sink.outbound.is_empty());
        assert_eq!(link.stats().rx_errors(), 0);
    }

    #[test]
    fn test_short_frame_is_counted_not_answered() {
        let mut link = link();
        let mut app = Counter { value: 0 };
        let mut sink = MemorySink::with_inbound(&wire(&[1, 2, 3, 4, 5]));

        let summary = link.poll(&mut sink, &mut app);
        assert_eq!(summary.errors, 1);
        assert!(sink.outbound.is_empty());
        assert_eq!(link.stats().short_frames, 1);
        assert_eq!(link.stats().last_error, Some(FrameError::ShortFrame));
    }

    #[test]
    fn test_corrupt_frame_does_not_affect_next() {
        let mut link = link();
        let mut app = Counter { value: 0 };

        let mut bad = raw_frame(MsgType::ParamGet, 1, &[1, 0]);
        bad[8] ^= 0xFF;
        let mut stream = wire(&bad);
        stream.extend(wire_frame(MsgType::HelloReq, 2, &[]));
        let mut sink = MemorySink::with_inbound(&stream);

        let summary = link.poll(&mut sink, &mut app);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.frames, 1);
        assert_eq!(link.stats().crc_mismatches, 1);

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].header.msg_type, MsgType::HelloRsp);
    }

    #[test]
    fn test_frame_split_across_polls() {
        let mut link = link();
        let mut app = Counter { value: 0 };
        let frame = wire_frame(MsgType::HelloReq, 1, &[]);
        let (head, tail) = frame.split_at(4);

        let mut sink = MemorySink::with_inbound(head);
        assert_eq!(link.poll(&mut sink, &mut app).frames, 0);
        assert_eq!(link.assembler_state(), AssemblerState::Accumulating);

        sink.inbound.extend_from_slice(tail);
        assert_eq!(link.poll(&mut sink, &mut app).frames, 1);
        assert_eq!(link.assembler_state(), AssemblerState::Idle);
    }

    #[test]
    fn test_small_chunks() {
        let mut link = link();
        let mut app = Counter { value: 0 };
        let mut stream = wire_frame(MsgType::HelloReq, 1, &[]);
        stream.extend(wire_frame(MsgType::DictReq, 2, &[]));
        let mut sink = MemorySink::with_inbound(&stream);
        sink.chunk = 3;

        let summary = link.poll(&mut sink, &mut app);
        assert_eq!(summary.frames, 2);

        let sent = sink.sent();
        assert_eq!(sent[1].header.msg_type, MsgType::DictRsp);
        assert_eq!(sent[1].header.seq, 2);
        assert_eq!(sent[1].payload, b"cnt");
    }

    #[test]
    fn test_full_sink_drops_reply() {
        let mut link = link();
        let mut app = Counter { value: 0 };
        let mut sink = MemorySink::with_inbound(&wire_frame(MsgType::HelloReq, 1, &[]));
        sink.tx_room = 0;

        let summary = link.poll(&mut sink, &mut app);
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.dropped, 1);
        assert_eq!(link.stats().tx_dropped, 1);
        assert_eq!(link.current_seq(), 0);
    }

    #[test]
    fn test_unknown_type_is_answered() {
        let mut link = link();
        let mut app = Counter { value: 0 };
        let mut sink = MemorySink::with_inbound(&wire_frame(MsgType::Unknown(0x30), 9, &[]));

        link.poll(&mut sink, &mut app);
        let sent = sink.sent();
        assert_eq!(sent[0].header.msg_type, MsgType::Error);
        assert_eq!(sent[0].payload[0], ErrorCode::UnsupportedType.to_byte());
    }

    fn on_export(_: &[u8]) -> Result<(), ErrorCode> {
        Ok(())
    }

    #[test]
    fn test_registered_command() {
        let mut link = link();
        let mut app = Counter { value: 0 };
        link.register_handler(MsgType::ExportLog, on_export).unwrap();
        let mut stream = wire_frame(MsgType::ExportLog, 4, &[]);
        stream.extend(wire_frame(MsgType::ApplyProfile, 5, &[1]));
        let mut sink = MemorySink::with_inbound(&stream);

        link.poll(&mut sink, &mut app);
        let sent = sink.sent();
        assert_eq!(sent[0].header.msg_type, MsgType::Ack);
        assert_eq!(sent[1].header.msg_type, MsgType::Error);
        assert_eq!(sent[1].payload[0], ErrorCode::NoHandler.to_byte());
    }

    #[test]
    fn test_telemetry_advances_seq() {
        let mut link = link();
        let mut sink = MemorySink::new();

        assert_eq!(link.send_telemetry(&mut sink, &[1, 2, 3]), Ok(1));
        assert_eq!(link.send_telemetry(&mut sink, &[4]), Ok(2));
        assert_eq!(link.stats().tx_frames, 2);
        assert_eq!(link.stats().tx_bytes as usize, sink.outbound.len());

        let too_big = [0u8; MAX_FRAME_SIZE];
        assert_eq!(
            link.send_telemetry(&mut sink, &too_big),
            Err(EmitError::PayloadTooLarge)
        );
        assert_eq!(link.current_seq(), 2);
    }

    #[test]
    fn test_stats_track_traffic() {
        let mut link = link();
        let mut app = Counter { value: 0 };
        let frame = wire_frame(MsgType::HelloReq, 1, &[]);
        let mut sink = MemorySink::with_inbound(&frame);

        link.poll(&mut sink, &mut app);
        let stats = link.stats();
        assert_eq!(stats.rx_bytes as usize, frame.len());
        assert_eq!(stats.rx_frames, 1);
        assert_eq!(stats.tx_frames, 1);
        assert_eq!(stats.tx_bytes as usize, sink.outbound.len());
    }
}
