//! Build-time link configuration
//!
//! Both ends of the link must agree on these values; changing any of them
//! is a wire-compatibility break.

use crate::cobs::max_encoded_len;
use crate::header::HEADER_LEN;

/// Protocol version carried in every frame header
pub const PROTOCOL_VERSION: u8 = 1;

/// Capacity of each raw frame buffer (encoded bytes, delimiter included on TX)
pub const MAX_FRAME_SIZE: usize = 1024;

/// CRC16 trailer length
pub const TRAILER_LEN: usize = 2;

/// Largest payload whose worst-case encoding still fits the transmit buffer
pub const MAX_PAYLOAD_SIZE: usize = max_payload_for(MAX_FRAME_SIZE);

/// Inbound SPSC ring capacity
///
/// `heapless::spsc::Queue<_, N>` holds `N - 1` elements, so this leaves
/// room for two full frames in flight.
pub const RX_RING_SIZE: usize = 2 * MAX_FRAME_SIZE + 1;

/// Outbound SPSC ring capacity
pub const TX_RING_SIZE: usize = 2 * MAX_FRAME_SIZE + 1;

/// Capability bits advertised in HELLO_RSP
pub mod capability {
    /// PARAM_SET / PARAM_GET supported
    pub const PARAMS: u8 = 0x01;
    /// DICT_REQ supported
    pub const DICTIONARY: u8 = 0x02;
    /// Device emits TELEMETRY frames
    pub const TELEMETRY: u8 = 0x04;
    /// TIME_SYNC / RUN_EXPERIMENT / EXPORT_LOG / APPLY_PROFILE accepted
    pub const COMMANDS: u8 = 0x08;

    pub const ALL: u8 = PARAMS | DICTIONARY | TELEMETRY | COMMANDS;
}

/// Largest payload `p` such that `max_encoded_len(HEADER + p + TRAILER) + 1 <= capacity`
pub const fn max_payload_for(capacity: usize) -> usize {
    let mut raw = capacity - 1;
    while max_encoded_len(raw) + 1 > capacity {
        raw -= 1;
    }
    raw - HEADER_LEN - TRAILER_LEN
}

/// Fixed HELLO_RSP contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HelloInfo {
    /// Advertised protocol version
    pub protocol_version: u8,
    /// Receive buffer capacity
    pub max_frame_size: u16,
    /// [`capability`] bits
    pub capabilities: u8,
    /// Firmware version (major, minor, patch)
    pub firmware_version: [u8; 3],
}

/// Encoded size of [`HelloInfo`]
pub const HELLO_INFO_LEN: usize = 7;

impl Default for HelloInfo {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            max_frame_size: MAX_FRAME_SIZE as u16,
            capabilities: capability::ALL,
            firmware_version: [0, 1, 0],
        }
    }
}

impl HelloInfo {
    /// Create hello info for the given firmware version
    pub fn new(firmware_version: [u8; 3]) -> Self {
        Self {
            firmware_version,
            ..Default::default()
        }
    }

    /// Wire format: `[version][max_frame u16 LE][capabilities][major][minor][patch]`
    pub fn to_bytes(&self) -> [u8; HELLO_INFO_LEN] {
        let size = self.max_frame_size.to_le_bytes();
        [
            self.protocol_version,
            size[0],
            size[1],
            self.capabilities,
            self.firmware_version[0],
            self.firmware_version[1],
            self.firmware_version[2],
        ]
    }

    /// Parse the wire format
    ///
    /// Host-side decoder for HELLO_RSP; the device only encodes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HELLO_INFO_LEN {
            return None;
        }
        Some(Self {
            protocol_version: bytes[0],
            max_frame_size: u16::from_le_bytes([bytes[1], bytes[2]]),
            capabilities: bytes[3],
            firmware_version: [bytes[4], bytes[5], bytes[6]],
        })
    }
}
