//! Parameter schema and live parameter table
//!
//! Every tunable value on the device is described by a [`ParamDef`]. The
//! table holds the current values and validates every write against the
//! schema before touching them.

use cardash_protocol::app::{Application, ParamError, ParamId};
use serde::{Deserialize, Serialize};

use crate::dictionary::{Dictionary, TelemetryDef};

/// Wire size of every parameter value
pub const VALUE_LEN: usize = 4;

/// Value type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParamKind {
    F32,
    I32,
    U32,
}

/// A typed parameter value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParamValue {
    F32(f32),
    I32(i32),
    U32(u32),
}

impl ParamValue {
    /// Value type
    pub const fn kind(&self) -> ParamKind {
        match self {
            ParamValue::F32(_) => ParamKind::F32,
            ParamValue::I32(_) => ParamKind::I32,
            ParamValue::U32(_) => ParamKind::U32,
        }
    }

    /// Decode a little-endian wire value of the given kind
    pub fn from_le_bytes(kind: ParamKind, bytes: &[u8]) -> Result<Self, ParamError> {
        let raw: [u8; VALUE_LEN] = bytes.try_into().map_err(|_| ParamError::InvalidLength)?;
        Ok(match kind {
            ParamKind::F32 => ParamValue::F32(f32::from_le_bytes(raw)),
            ParamKind::I32 => ParamValue::I32(i32::from_le_bytes(raw)),
            ParamKind::U32 => ParamValue::U32(u32::from_le_bytes(raw)),
        })
    }

    /// Encode as little-endian wire bytes
    pub fn to_le_bytes(&self) -> [u8; VALUE_LEN] {
        match self {
            ParamValue::F32(v) => v.to_le_bytes(),
            ParamValue::I32(v) => v.to_le_bytes(),
            ParamValue::U32(v) => v.to_le_bytes(),
        }
    }

    /// Lossy conversion for telemetry and display
    pub fn as_f32(&self) -> f32 {
        match *self {
            ParamValue::F32(v) => v,
            ParamValue::I32(v) => v as f32,
            ParamValue::U32(v) => v as f32,
        }
    }
}

/// Schema entry for one parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParamDef {
    pub id: ParamId,
    pub name: &'static str,
    pub kind: ParamKind,
    pub min: ParamValue,
    pub max: ParamValue,
    pub default: ParamValue,
    pub writable: bool,
    pub unit: &'static str,
    pub group: &'static str,
}

impl ParamDef {
    /// Check a value against this entry's type and range
    pub fn validate(&self, value: ParamValue) -> Result<(), ParamError> {
        if value.kind() != self.kind {
            return Err(ParamError::WrongKind);
        }
        let in_range = match (value, self.min, self.max) {
            (ParamValue::F32(v), ParamValue::F32(lo), ParamValue::F32(hi)) => {
                !v.is_nan() && v >= lo && v <= hi
            }
            (ParamValue::I32(v), ParamValue::I32(lo), ParamValue::I32(hi)) => (lo..=hi).contains(&v),
            (ParamValue::U32(v), ParamValue::U32(lo), ParamValue::U32(hi)) => (lo..=hi).contains(&v),
            _ => false,
        };
        if in_range {
            Ok(())
        } else {
            Err(ParamError::OutOfRange)
        }
    }
}

/// Stored set of parameter values applied in one step
#[derive(Debug, Clone, Copy)]
pub struct Profile<'a> {
    pub id: u8,
    pub name: &'a str,
    pub values: &'a [(ParamId, ParamValue)],
}

/// Find a profile by id
pub fn find_profile<'a>(profiles: &'a [Profile<'a>], id: u8) -> Option<&'a Profile<'a>> {
    profiles.iter().find(|p| p.id == id)
}

/// Live parameter values for a fixed schema
pub struct ParamTable<const N: usize> {
    defs: &'static [ParamDef; N],
    telemetry: &'static [TelemetryDef],
    values: [ParamValue; N],
    revision: u32,
}

impl<const N: usize> ParamTable<N> {
    /// Create a table holding every parameter's default
    pub const fn new(defs: &'static [ParamDef; N], telemetry: &'static [TelemetryDef]) -> Self {
        let mut values = [ParamValue::U32(0); N];
        let mut i = 0;
        while i < N {
            values[i] = defs[i].default;
            i += 1;
        }
        Self {
            defs,
            telemetry,
            values,
            revision: 0,
        }
    }

    /// Schema
    pub fn defs(&self) -> &'static [ParamDef; N] {
        self.defs
    }

    /// Bumped on every successful write; lets consumers detect changes
    pub fn revision(&self) -> u32 {
        self.revision
    }

    fn index_of(&self, id: ParamId) -> Option<usize> {
        self.defs.iter().position(|d| d.id == id)
    }

    /// Look up a schema entry
    pub fn def(&self, id: ParamId) -> Option<&'static ParamDef> {
        let defs: &'static [ParamDef; N] = self.defs;
        defs.iter().find(|d| d.id == id)
    }

    /// Current value of `id`
    pub fn get(&self, id: ParamId) -> Option<ParamValue> {
        self.index_of(id).map(|i| self.values[i])
    }

    /// Current value by name
    ///
    /// Lookup for host tools and diagnostics; the wire addresses
    /// parameters by id only.
    pub fn get_by_name(&self, name: &str) -> Option<ParamValue> {
        self.defs
            .iter()
            .position(|d| d.name == name)
            .map(|i| self.values[i])
    }

    /// Validate and store a typed value
    pub fn set(&mut self, id: ParamId, value: ParamValue) -> Result<(), ParamError> {
        let i = self.checked_index(id, value)?;
        self.values[i] = value;
        self.revision = self.revision.wrapping_add(1);
        Ok(())
    }

    fn checked_index(&self, id: ParamId, value: ParamValue) -> Result<usize, ParamError> {
        let i = self.index_of(id).ok_or(ParamError::UnknownId)?;
        let def = &self.defs[i];
        if !def.writable {
            return Err(ParamError::ReadOnly);
        }
        def.validate(value)?;
        Ok(i)
    }

    /// Apply every value of a profile, or none of them
    pub fn apply_profile(&mut self, profile: &Profile<'_>) -> Result<usize, ParamError> {
        for &(id, value) in profile.values {
            self.checked_index(id, value)?;
        }
        for &(id, value) in profile.values {
            if let Some(i) = self.index_of(id) {
                self.values[i] = value;
            }
        }
        self.revision = self.revision.wrapping_add(1);
        Ok(profile.values.len())
    }

    /// Restore every default
    pub fn reset(&mut self) {
        for (value, def) in self.values.iter_mut().zip(self.defs.iter()) {
            *value = def.default;
        }
        self.revision = self.revision.wrapping_add(1);
    }

    /// Dictionary view over this table's schema
    pub fn dictionary(&self) -> Dictionary<'static> {
        let defs: &'static [ParamDef] = self.defs;
        Dictionary::new(defs, self.telemetry)
    }
}

impl<const N: usize> Application for ParamTable<N> {
    fn parameter_dict(&self, out: &mut [u8]) -> Result<usize, ParamError> {
        self.dictionary().to_slice(out)
    }

    fn set_parameter(&mut self, id: ParamId, value: &[u8]) -> Result<(), ParamError> {
        let def = self.def(id).ok_or(ParamError::UnknownId)?;
        let value = ParamValue::from_le_bytes(def.kind, value)?;
        self.set(id, value)
    }

    fn get_parameter(&self, id: ParamId, out: &mut [u8]) -> Result<usize, ParamError> {
        let value = self.get(id).ok_or(ParamError::UnknownId)?;
        out.get_mut(..VALUE_LEN)
            .ok_or(ParamError::BufferTooSmall)?
            .copy_from_slice(&value.to_le_bytes());
        Ok(VALUE_LEN)
    }
}
