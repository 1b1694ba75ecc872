//! Board-agnostic application logic for CarDash link devices
//!
//! This crate contains everything above the wire protocol that does not
//! depend on specific hardware:
//!
//! - Parameter schema and the live parameter table (the protocol's
//!   [`Application`](cardash_protocol::Application))
//! - Dictionary serialization for DICT_RSP
//! - Command payload parsing and the state they drive
//! - Telemetry sample packing and the exportable sample log

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod commands;
pub mod dictionary;
pub mod params;
pub mod telemetry;

pub use commands::{ApplyProfile, Experiment, ExportLog, HostClock, RunExperiment, TimeSync};
pub use dictionary::{Dictionary, TelemetryDef};
pub use params::{find_profile, ParamDef, ParamKind, ParamTable, ParamValue, Profile};
pub use telemetry::{ExportChunk, ExportReader, LogRecord, SampleLog};
