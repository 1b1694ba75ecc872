//! CarDash Device Link Protocol
//!
//! This crate implements the framed binary protocol spoken between the
//! dashboard controller and its host over a UART. It owns framing,
//! integrity checking and request dispatch; the serial peripheral is
//! injected as a [`cardash_hal::ByteSink`].
//!
//! # Protocol Overview
//!
//! Every message is a header, a payload and a CRC16 trailer, COBS-encoded
//! and terminated by a single `0x00` delimiter:
//! ```text
//! ┌─────────┬──────┬─────┬───────┬─────────────┬─────────────┬───────┐
//! │ VERSION │ TYPE │ SEQ │ FLAGS │ PAYLOAD_LEN │ PAYLOAD     │ CRC16 │
//! │ 1B      │ 1B   │ 2B  │ 1B    │ 2B          │ 0–1009B     │ 2B    │
//! └─────────┴──────┴─────┴───────┴─────────────┴─────────────┴───────┘
//!                 (multi-byte fields little-endian)
//! ```
//!
//! # Data flow
//!
//! ```text
//! ByteSink ─► FrameAssembler ─► CRC check ─► Dispatcher ─► FrameEmitter ─► ByteSink
//! ```
//!
//! [`Link`] ties the pieces together behind a single non-blocking
//! [`Link::poll`] call.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

pub mod app;
pub mod assembler;
pub mod cobs;
pub mod config;
pub mod crc16;
pub mod dispatcher;
pub mod emitter;
pub mod frame;
pub mod header;
pub mod link;
pub mod ring;
pub mod stats;

#[cfg(test)]
pub(crate) mod testutil;

pub use app::{Application, CommandHandler, ErrorCode, ParamError};
pub use assembler::FrameAssembler;
pub use cobs::CobsError;
pub use config::{HelloInfo, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION};
pub use dispatcher::{Dispatcher, RegisterError, Reply};
pub use emitter::{EmitError, FrameEmitter, Sent};
pub use frame::{DecodedFrame, FrameError};
pub use header::{FrameHeader, MsgType, HEADER_LEN};
pub use link::{Link, PollSummary};
pub use ring::{RingConsumer, RingProducer, RingSink, RxRing, TxRing};
pub use stats::LinkStats;
