//! CarDash Hardware Abstraction Layer
//!
//! This crate defines the transport traits the protocol layer is written
//! against. Chip-specific code (the RP2040 firmware, a host serial port,
//! an in-memory test double) implements them, so the framing and dispatch
//! logic never touches a peripheral directly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  cardash-protocol (framing, dispatch)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  cardash-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ RP2040 UART + │       │  test doubles │
//! │  ring buffers │       │               │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`uart::ByteSink`] - Non-blocking byte stream in both directions

#![no_std]
#![deny(unsafe_code)]

pub mod uart;

// Re-export key traits at crate root for convenience
pub use uart::{ByteSink, UartConfig, WouldBlock};
