//! Frame header and message types

use crate::config::PROTOCOL_VERSION;

/// Encoded header length
pub const HEADER_LEN: usize = 7;

// Wire values
const MSG_HELLO_REQ: u8 = 0x01;
const MSG_HELLO_RSP: u8 = 0x02;
const MSG_DICT_REQ: u8 = 0x03;
const MSG_DICT_RSP: u8 = 0x04;
const MSG_PARAM_SET: u8 = 0x05;
const MSG_PARAM_GET: u8 = 0x06;
const MSG_PARAM_VAL: u8 = 0x07;
const MSG_TELEMETRY: u8 = 0x08;
const MSG_ACK: u8 = 0x0A;
const MSG_ERROR: u8 = 0x0B;
const MSG_TIME_SYNC: u8 = 0x0C;
const MSG_RUN_EXPERIMENT: u8 = 0x0D;
const MSG_EXPORT_LOG: u8 = 0x0E;
const MSG_APPLY_PROFILE: u8 = 0x0F;

/// Message type carried in the header
///
/// Parsing never fails: anything unrecognised becomes [`MsgType::Unknown`]
/// so the dispatcher can answer it with an ERROR frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MsgType {
    /// Host handshake request
    HelloReq,
    /// Handshake response with version/capabilities
    HelloRsp,
    /// Request for the parameter dictionary
    DictReq,
    /// Serialized parameter dictionary
    DictRsp,
    /// Write one parameter
    ParamSet,
    /// Read one parameter
    ParamGet,
    /// Parameter value (response to ParamGet)
    ParamVal,
    /// Device telemetry sample
    Telemetry,
    /// Positive acknowledgement
    Ack,
    /// Negative acknowledgement with reason code
    Error,
    /// Host wall-clock synchronization
    TimeSync,
    /// Start an experiment run
    RunExperiment,
    /// Request a log export
    ExportLog,
    /// Apply a stored parameter profile
    ApplyProfile,
    /// Unrecognised type byte
    Unknown(u8),
}

impl MsgType {
    /// Parse a message type from its wire byte
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            MSG_HELLO_REQ => MsgType::HelloReq,
            MSG_HELLO_RSP => MsgType::HelloRsp,
            MSG_DICT_REQ => MsgType::DictReq,
            MSG_DICT_RSP => MsgType::DictRsp,
            MSG_PARAM_SET => MsgType::ParamSet,
            MSG_PARAM_GET => MsgType::ParamGet,
            MSG_PARAM_VAL => MsgType::ParamVal,
            MSG_TELEMETRY => MsgType::Telemetry,
            MSG_ACK => MsgType::Ack,
            MSG_ERROR => MsgType::Error,
            MSG_TIME_SYNC => MsgType::TimeSync,
            MSG_RUN_EXPERIMENT => MsgType::RunExperiment,
            MSG_EXPORT_LOG => MsgType::ExportLog,
            MSG_APPLY_PROFILE => MsgType::ApplyProfile,
            other => MsgType::Unknown(other),
        }
    }

    /// Convert to wire byte
    pub fn to_byte(self) -> u8 {
        match self {
            MsgType::HelloReq => MSG_HELLO_REQ,
            MsgType::HelloRsp => MSG_HELLO_RSP,
            MsgType::DictReq => MSG_DICT_REQ,
            MsgType::DictRsp => MSG_DICT_RSP,
            MsgType::ParamSet => MSG_PARAM_SET,
            MsgType::ParamGet => MSG_PARAM_GET,
            MsgType::ParamVal => MSG_PARAM_VAL,
            MsgType::Telemetry => MSG_TELEMETRY,
            MsgType::Ack => MSG_ACK,
            MsgType::Error => MSG_ERROR,
            MsgType::TimeSync => MSG_TIME_SYNC,
            MsgType::RunExperiment => MSG_RUN_EXPERIMENT,
            MsgType::ExportLog => MSG_EXPORT_LOG,
            MsgType::ApplyProfile => MSG_APPLY_PROFILE,
            MsgType::Unknown(byte) => byte,
        }
    }

    /// Returns true for the command types served by registered handlers
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            MsgType::TimeSync | MsgType::RunExperiment | MsgType::ExportLog | MsgType::ApplyProfile
        )
    }
}

impl From<u8> for MsgType {
    fn from(byte: u8) -> Self {
        MsgType::from_byte(byte)
    }
}

impl From<MsgType> for u8 {
    fn from(msg_type: MsgType) -> Self {
        msg_type.to_byte()
    }
}

/// Fixed 7-byte frame header
///
/// ```text
/// [version:1][msg_type:1][seq:2 LE][flags:1][payload_len:2 LE]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameHeader {
    pub version: u8,
    pub msg_type: MsgType,
    pub seq: u16,
    pub flags: u8,
    pub payload_len: u16,
}

impl FrameHeader {
    /// Header for the current protocol version
    pub fn new(msg_type: MsgType, seq: u16, flags: u8, payload_len: u16) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            msg_type,
            seq,
            flags,
            payload_len,
        }
    }

    /// Serialize to wire format
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let seq = self.seq.to_le_bytes();
        let len = self.payload_len.to_le_bytes();
        [
            self.version,
            self.msg_type.to_byte(),
            seq[0],
            seq[1],
            self.flags,
            len[0],
            len[1],
        ]
    }

    /// Parse from the first [`HEADER_LEN`] bytes, if present
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_LEN {
            return None;
        }
        Some(Self {
            version: bytes[0],
            msg_type: MsgType::from_byte(bytes[1]),
            seq: u16::from_le_bytes([bytes[2], bytes[3]]),
            flags: bytes[4],
            payload_len: u16::from_le_bytes([bytes[5], bytes[6]]),
        })
    }
}
