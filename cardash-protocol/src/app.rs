//! Application collaborator interface
//!
//! The protocol layer knows how to frame and route requests; what a
//! parameter means, how the dictionary is serialized and what a command
//! actually does belong to the application. These are invoked
//! synchronously from [`crate::Dispatcher::dispatch`] and must not block.

/// Reason code carried in ERROR frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ErrorCode {
    /// Message type not supported
    UnsupportedType = 0x01,
    /// Parameter id not in the schema
    UnknownParam = 0x02,
    /// Payload has the wrong size or shape
    InvalidPayload = 0x03,
    /// Value outside the schema's range
    OutOfRange = 0x04,
    /// Parameter cannot be written
    ReadOnly = 0x05,
    /// No handler registered for this command
    NoHandler = 0x06,
    /// Handler is already running a previous request
    Busy = 0x07,
    /// Handler refused the request
    Rejected = 0x08,
    /// Response would not fit in one frame
    ResponseTooLarge = 0x09,
}

impl ErrorCode {
    /// Parse a reason code from its wire byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(ErrorCode::UnsupportedType),
            0x02 => Some(ErrorCode::UnknownParam),
            0x03 => Some(ErrorCode::InvalidPayload),
            0x04 => Some(ErrorCode::OutOfRange),
            0x05 => Some(ErrorCode::ReadOnly),
            0x06 => Some(ErrorCode::NoHandler),
            0x07 => Some(ErrorCode::Busy),
            0x08 => Some(ErrorCode::Rejected),
            0x09 => Some(ErrorCode::ResponseTooLarge),
            _ => None,
        }
    }

    /// Convert to wire byte
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Parameter access errors
///
/// Surfaced to the peer as an ERROR frame, never as a local fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParamError {
    /// Id not in the schema
    UnknownId,
    /// Value bytes have the wrong length for the parameter's type
    InvalidLength,
    /// Value type does not match the parameter's declared kind
    WrongKind,
    /// Value outside the allowed range (or not a number)
    OutOfRange,
    /// Parameter is read-only
    ReadOnly,
    /// Output buffer too small
    BufferTooSmall,
}

impl From<ParamError> for ErrorCode {
    fn from(e: ParamError) -> Self {
        match e {
            ParamError::UnknownId => ErrorCode::UnknownParam,
            ParamError::InvalidLength => ErrorCode::InvalidPayload,
            ParamError::WrongKind => ErrorCode::InvalidPayload,
            ParamError::OutOfRange => ErrorCode::OutOfRange,
            ParamError::ReadOnly => ErrorCode::ReadOnly,
            ParamError::BufferTooSmall => ErrorCode::ResponseTooLarge,
        }
    }
}

/// Parameter identifier on the wire
pub type ParamId = u16;

/// Handler for TIME_SYNC / RUN_EXPERIMENT / EXPORT_LOG / APPLY_PROFILE
///
/// Receives the request payload. It must only validate and trigger work
/// (signal a task, latch a flag); results go out later as TELEMETRY or
/// fresh frames.
pub type CommandHandler = fn(&[u8]) -> Result<(), ErrorCode>;

/// Parameter store and dictionary provider
pub trait Application {
    /// Serialize the parameter dictionary into `out`
    ///
    /// Returns the number of bytes written. The format is owned by the
    /// implementation.
    fn parameter_dict(&self, out: &mut [u8]) -> Result<usize, ParamError>;

    /// Validate and apply a new value
    ///
    /// On error the stored value must be left untouched.
    fn set_parameter(&mut self, id: ParamId, value: &[u8]) -> Result<(), ParamError>;

    /// Encode the current value of `id` into `out`
    ///
    /// Returns the number of bytes written.
    fn get_parameter(&self, id: ParamId, out: &mut [u8]) -> Result<usize, ParamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_roundtrip() {
        for byte in 0x01..=0x09 {
            let code = ErrorCode::from_byte(byte).unwrap();
            assert_eq!(code.to_byte(), byte);
        }
        assert!(ErrorCode::from_byte(0x00).is_none());
        assert!(ErrorCode::from_byte(0x0A).is_none());
    }

    #[test]
    fn test_param_error_mapping() {
        assert_eq!(ErrorCode::from(ParamError::UnknownId), ErrorCode::UnknownParam);
        assert_eq!(ErrorCode::from(ParamError::OutOfRange), ErrorCode::OutOfRange);
        assert_eq!(ErrorCode::from(ParamError::ReadOnly), ErrorCode::ReadOnly);
        assert_eq!(
            ErrorCode::from(ParamError::InvalidLength),
            ErrorCode::InvalidPayload
        );
        assert_eq!(
            ErrorCode::from(ParamError::WrongKind),
            ErrorCode::InvalidPayload
        );
    }
}
