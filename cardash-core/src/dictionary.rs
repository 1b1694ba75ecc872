//! Parameter dictionary
//!
//! Sent in DICT_RSP so the host can build its parameter and telemetry views
//! without compiled-in knowledge of the device. Serialized with postcard:
//! ```text
//! Dictionary {
//!     version: u8,
//!     params: [ParamDef],      // id, name, kind, min, max, default, writable, unit, group
//!     telemetry: [TelemetryDef] // order matches the TELEMETRY payload
//! }
//! ```

use cardash_protocol::app::ParamError;
use serde::Serialize;

use crate::params::{ParamDef, ParamKind};

/// Dictionary layout version
pub const DICTIONARY_VERSION: u8 = 1;

/// One telemetry channel
///
/// Channels appear in TELEMETRY payloads in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryDef {
    pub name: &'static str,
    pub unit: &'static str,
    pub group: &'static str,
    pub kind: ParamKind,
}

/// Everything the host needs to interpret the device
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Dictionary<'a> {
    pub version: u8,
    pub params: &'a [ParamDef],
    pub telemetry: &'a [TelemetryDef],
}

impl<'a> Dictionary<'a> {
    pub fn new(params: &'a [ParamDef], telemetry: &'a [TelemetryDef]) -> Self {
        Self {
            version: DICTIONARY_VERSION,
            params,
            telemetry,
        }
    }

    /// Serialize into `out`, returning the number of bytes written
    pub fn to_slice(&self, out: &mut [u8]) -> Result<usize, ParamError> {
        postcard::to_slice(self, out)
            .map(|used| used.len())
            .map_err(|_| ParamError::BufferTooSmall)
    }
}
