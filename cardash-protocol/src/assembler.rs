//! Inbound frame assembly
//!
//! Scans the inbound byte stream for `0x00` delimiters. The bytes between
//! two delimiters are one candidate frame: they are COBS-decoded in place,
//! split into header, payload and trailer, and CRC-checked.
//!
//! Each delimiter yields at most one result. A bad span is reported and
//! dropped; scanning always restarts after the next delimiter, so one
//! corrupt frame can never swallow the frame behind it.

use crate::cobs;
use crate::config::MAX_FRAME_SIZE;
use crate::frame::{DecodedFrame, FrameError};
use crate::ring::RingConsumer;

/// Assembler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AssemblerState {
    /// No bytes since the last delimiter
    Idle,
    /// Collecting an encoded span
    Accumulating,
    /// Span overran the buffer; dropping bytes until the next delimiter
    Discarding,
}

/// Outcome of scanning one byte
enum Span {
    /// Delimiter closed an encoded span of this length
    Ready(usize),
    /// Delimiter closed an overrun span
    Overrun,
}

/// Delimiter-driven frame assembler
///
/// Owns the inbound raw frame buffer. Decoded frames borrow it and are
/// only valid until the next call to [`FrameAssembler::feed`].
pub struct FrameAssembler {
    buf: [u8; MAX_FRAME_SIZE],
    len: usize,
    state: AssemblerState,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    /// Create an idle assembler
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_FRAME_SIZE],
            len: 0,
            state: AssemblerState::Idle,
        }
    }

    /// Current state
    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Number of encoded bytes collected since the last delimiter
    pub fn pending(&self) -> usize {
        self.len
    }

    /// Drop any partial span
    pub fn reset(&mut self) {
        self.len = 0;
        self.state = AssemblerState::Idle;
    }

    /// Feed one inbound byte
    ///
    /// Returns `None` while a span is still open and for empty spans
    /// (back-to-back delimiters). Returns `Some` once per closed,
    /// non-empty span.
    pub fn feed(&mut self, byte: u8) -> Option<Result<DecodedFrame<'_>, FrameError>> {
        match self.scan(byte) {
            Some(Span::Ready(len)) => Some(self.complete(len)),
            Some(Span::Overrun) => Some(Err(FrameError::FrameTooLarge)),
            None => None,
        }
    }

    /// Pull bytes from a ring until one span closes or the ring is empty
    ///
    /// Bytes behind the delimiter stay in the ring for the next call.
    /// For hosts and bridges that hold the consumer half directly; the
    /// device goes through [`crate::Link::poll`] and a [`crate::RingSink`].
    pub fn feed_from<const N: usize>(
        &mut self,
        ring: &mut RingConsumer<'_, N>,
    ) -> Option<Result<DecodedFrame<'_>, FrameError>> {
        while let Some(byte) = ring.pop() {
            match self.scan(byte) {
                Some(Span::Ready(len)) => return Some(self.complete(len)),
                Some(Span::Overrun) => return Some(Err(FrameError::FrameTooLarge)),
                None => {}
            }
        }
        None
    }

    fn scan(&mut self, byte: u8) -> Option<Span> {
        if byte == 0 {
            let state = self.state;
            let len = self.len;
            self.reset();
            return match state {
                AssemblerState::Idle => None,
                AssemblerState::Accumulating => Some(Span::Ready(len)),
                AssemblerState::Discarding => Some(Span::Overrun),
            };
        }

        match self.state {
            AssemblerState::Discarding => {}
            _ if self.len == MAX_FRAME_SIZE => {
                self.len = 0;
                self.state = AssemblerState::Discarding;
            }
            _ => {
                self.buf[self.len] = byte;
                self.len += 1;
                self.state = AssemblerState::Accumulating;
            }
        }
        None
    }

    fn complete(&mut self, len: usize) -> Result<DecodedFrame<'_>, FrameError> {
        let decoded = cobs::decode_in_place(&mut self.buf[..len])?;
        DecodedFrame::parse(&self.buf[..decoded])
    }
}
