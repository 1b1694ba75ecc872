//! Link statistics
//!
//! Frame-level errors are never fatal; they are counted here so the
//! application can report link health (over telemetry, defmt, etc.).

use crate::frame::FrameError;

/// Link traffic and error counters
///
/// All counters wrap on overflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    /// Raw bytes read from the sink
    pub rx_bytes: u32,
    /// Frames that passed every check
    pub rx_frames: u32,
    /// Frames handed to the sink
    pub tx_frames: u32,
    /// Encoded bytes handed to the sink (delimiters included)
    pub tx_bytes: u32,
    /// Replies dropped because the sink was full
    pub tx_dropped: u32,
    /// Spans longer than the receive buffer
    pub too_large: u32,
    /// Spans with broken COBS structure
    pub decode_errors: u32,
    /// Header or trailer missing
    pub short_frames: u32,
    /// Payload shorter than announced
    pub length_mismatches: u32,
    /// Trailer did not match
    pub crc_mismatches: u32,
    /// Valid frame from an incompatible protocol version
    pub version_mismatches: u32,
    /// Most recent inbound error
    pub last_error: Option<FrameError>,
}

impl LinkStats {
    /// Create zeroed statistics
    pub const fn new() -> Self {
        Self {
            rx_bytes: 0,
            rx_frames: 0,
            tx_frames: 0,
            tx_bytes: 0,
            tx_dropped: 0,
            too_large: 0,
            decode_errors: 0,
            short_frames: 0,
            length_mismatches: 0,
            crc_mismatches: 0,
            version_mismatches: 0,
            last_error: None,
        }
    }

    /// Count bytes read from the sink
    pub fn record_rx_bytes(&mut self, n: usize) {
        self.rx_bytes = self.rx_bytes.wrapping_add(n as u32);
    }

    /// Count a frame that passed validation
    pub fn record_rx_frame(&mut self) {
        self.rx_frames = self.rx_frames.wrapping_add(1);
    }

    /// Count a rejected inbound span
    pub fn record_rx_error(&mut self, error: FrameError) {
        let counter = match error {
            FrameError::FrameTooLarge => &mut self.too_large,
            FrameError::Decode(_) => &mut self.decode_errors,
            FrameError::ShortFrame => &mut self.short_frames,
            FrameError::LengthMismatch => &mut self.length_mismatches,
            FrameError::CrcMismatch => &mut self.crc_mismatches,
            FrameError::UnsupportedVersion(_) => &mut self.version_mismatches,
        };
        *counter = counter.wrapping_add(1);
        self.last_error = Some(error);
    }

    /// Count a frame handed to the sink
    pub fn record_tx_frame(&mut self, encoded_len: usize) {
        self.tx_frames = self.tx_frames.wrapping_add(1);
        self.tx_bytes = self.tx_bytes.wrapping_add(encoded_len as u32);
    }

    /// Count a reply the sink could not take
    pub fn record_tx_dropped(&mut self) {
        self.tx_dropped = self.tx_dropped.wrapping_add(1);
    }

    /// Total rejected inbound spans
    pub fn rx_errors(&self) -> u32 {
        self.too_large
            .wrapping_add(self.decode_errors)
            .wrapping_add(self.short_frames)
            .wrapping_add(self.length_mismatches)
            .wrapping_add(self.crc_mismatches)
            .wrapping_add(self.version_mismatches)
    }
}
