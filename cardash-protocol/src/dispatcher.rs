//! Request routing
//!
//! Maps each validated inbound frame to its handler and decides what, if
//! anything, goes back to the host. The dispatcher never touches the
//! byte sink itself: it writes the response payload into a caller-owned
//! buffer and returns a [`Reply`] describing the frame to emit.

use crate::app::{Application, CommandHandler, ErrorCode, ParamId};
use crate::config::{HelloInfo, HELLO_INFO_LEN, MAX_PAYLOAD_SIZE};
use crate::frame::DecodedFrame;
use crate::header::MsgType;

/// Number of delegable command types
const COMMAND_SLOTS: usize = 4;

/// Response decided by [`Dispatcher::dispatch`]
///
/// Payload lengths refer to the buffer passed to `dispatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reply {
    /// Nothing to send
    Silent,
    /// Fresh frame; takes the next outbound seq
    Send { msg_type: MsgType, len: usize },
    /// Response carrying the request's seq
    Echo {
        msg_type: MsgType,
        seq: u16,
        len: usize,
    },
}

/// Handler registration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegisterError {
    /// Only TIME_SYNC, RUN_EXPERIMENT, EXPORT_LOG and APPLY_PROFILE can be delegated
    NotACommand(MsgType),
}

fn command_slot(msg_type: MsgType) -> Option<usize> {
    match msg_type {
        MsgType::TimeSync => Some(0),
        MsgType::RunExperiment => Some(1),
        MsgType::ExportLog => Some(2),
        MsgType::ApplyProfile => Some(3),
        _ => None,
    }
}

/// Message dispatcher
pub struct Dispatcher {
    hello: HelloInfo,
    handlers: [Option<CommandHandler>; COMMAND_SLOTS],
}

impl Dispatcher {
    /// Create a dispatcher with no command handlers
    pub const fn new(hello: HelloInfo) -> Self {
        Self {
            hello,
            handlers: [None; COMMAND_SLOTS],
        }
    }

    /// Handshake data sent in HELLO_RSP
    pub fn hello(&self) -> &HelloInfo {
        &self.hello
    }

    /// Register (or replace) the handler for a command type
    pub fn register_handler(
        &mut self,
        msg_type: MsgType,
        handler: CommandHandler,
    ) -> Result<(), RegisterError> {
        let slot = command_slot(msg_type).ok_or(RegisterError::NotACommand(msg_type))?;
        self.handlers[slot] = Some(handler);
        Ok(())
    }

    /// Returns true if a handler is registered for `msg_type`
    pub fn has_handler(&self, msg_type: MsgType) -> bool {
        command_slot(msg_type).is_some_and(|slot| self.handlers[slot].is_some())
    }

    /// Route one validated frame
    ///
    /// Every request type gets exactly one response. Responses, telemetry,
    /// ACK and ERROR frames arriving from the host are dropped silently.
    pub fn dispatch<A: Application>(
        &self,
        frame: &DecodedFrame<'_>,
        app: &mut A,
        out: &mut [u8; MAX_PAYLOAD_SIZE],
    ) -> Reply {
        let seq = frame.seq();
        let payload = frame.payload;

        match frame.msg_type() {
            MsgType::HelloReq => {
                out[..HELLO_INFO_LEN].copy_from_slice(&self.hello.to_bytes());
                Reply::Send {
                    msg_type: MsgType::HelloRsp,
                    len: HELLO_INFO_LEN,
                }
            }
            MsgType::DictReq => match app.parameter_dict(out) {
                Ok(len) => Reply::Send {
                    msg_type: MsgType::DictRsp,
                    len,
                },
                Err(e) => error(out, seq, e.into()),
            },
            MsgType::ParamSet => {
                let Some((id, value)) = split_param(payload) else {
                    return error(out, seq, ErrorCode::InvalidPayload);
                };
                match app.set_parameter(id, value) {
                    Ok(()) => ack(out, seq),
                    Err(e) => error(out, seq, e.into()),
                }
            }
            MsgType::ParamGet => {
                let Some((id, [])) = split_param(payload) else {
                    return error(out, seq, ErrorCode::InvalidPayload);
                };
                out[..2].copy_from_slice(&id.to_le_bytes());
                match app.get_parameter(id, &mut out[2..]) {
                    Ok(len) => Reply::Echo {
                        msg_type: MsgType::ParamVal,
                        seq,
                        len: 2 + len,
                    },
                    Err(e) => error(out, seq, e.into()),
                }
            }
            command @ (MsgType::TimeSync
            | MsgType::RunExperiment
            | MsgType::ExportLog
            | MsgType::ApplyProfile) => {
                let handler = command_slot(command).and_then(|slot| self.handlers[slot]);
                match handler {
                    Some(handler) => match handler(payload) {
                        Ok(()) => ack(out, seq),
                        Err(code) => error(out, seq, code),
                    },
                    None => error(out, seq, ErrorCode::NoHandler),
                }
            }
            MsgType::HelloRsp
            | MsgType::DictRsp
            | MsgType::ParamVal
            | MsgType::Telemetry
            | MsgType::Ack
            | MsgType::Error => Reply::Silent,
            MsgType::Unknown(_) => error(out, seq, ErrorCode::UnsupportedType),
        }
    }
}

/// `[id LE][value...]`
fn split_param(payload: &[u8]) -> Option<(ParamId, &[u8])> {
    match payload {
        [lo, hi, value @ ..] => Some((u16::from_le_bytes([*lo, *hi]), value)),
        _ => None,
    }
}

fn ack(out: &mut [u8], seq: u16) -> Reply {
    out[..2].copy_from_slice(&seq.to_le_bytes());
    Reply::Echo {
        msg_type: MsgType::Ack,
        seq,
        len: 2,
    }
}

fn error(out: &mut [u8], seq: u16, code: ErrorCode) -> Reply {
    out[0] = code.to_byte();
    out[1..3].copy_from_slice(&seq.to_le_bytes());
    Reply::Echo {
        msg_type: MsgType::Error,
        seq,
        len: 3,
    }
}
