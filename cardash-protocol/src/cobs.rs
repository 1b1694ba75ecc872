//! Consistent Overhead Byte Stuffing
//!
//! Standard COBS (not the zero-pair/COBS-R variants): the input is split
//! into runs ending at each `0x00`, and each run is prefixed by a code byte
//! holding its length plus one. A code of `0xFF` marks a full 254-byte run
//! with no implied zero. Encoded output never contains `0x00`, so a single
//! zero byte can delimit frames on the wire. The delimiter itself is not
//! part of the encoding; the emitter appends it.
//!
//! Everything here runs over caller-provided buffers and never allocates.

/// COBS codec errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CobsError {
    /// Code byte bookkeeping is inconsistent (zero code, run past end, empty input)
    Malformed,
    /// Destination buffer too small for the output
    BufferOverflow,
}

/// Longest possible run between code bytes
const MAX_RUN: usize = 254;

/// Worst-case encoded length for `len` input bytes (delimiter not included)
pub const fn max_encoded_len(len: usize) -> usize {
    len + len / MAX_RUN + 1
}

/// Incremental COBS encoder writing into a fixed buffer
///
/// Lets a frame be encoded straight from its pieces (header, payload,
/// trailer) without first copying them into one contiguous buffer.
pub struct Encoder<'a> {
    dst: &'a mut [u8],
    /// Position of the pending code byte
    code_idx: usize,
    /// Next free output position
    out_idx: usize,
    /// Current run length + 1
    code: u8,
}

impl<'a> Encoder<'a> {
    /// Start encoding into `dst`
    pub fn new(dst: &'a mut [u8]) -> Result<Self, CobsError> {
        if dst.is_empty() {
            return Err(CobsError::BufferOverflow);
        }
        Ok(Self {
            dst,
            code_idx: 0,
            out_idx: 1,
            code: 1,
        })
    }

    /// Encode a single byte
    pub fn push(&mut self, byte: u8) -> Result<(), CobsError> {
        if byte == 0 {
            return self.close_run();
        }

        if self.out_idx >= self.dst.len() {
            return Err(CobsError::BufferOverflow);
        }
        self.dst[self.out_idx] = byte;
        self.out_idx += 1;
        self.code += 1;

        if self.code == 0xFF {
            self.close_run()?;
        }
        Ok(())
    }

    /// Encode a run of bytes
    pub fn extend(&mut self, bytes: &[u8]) -> Result<(), CobsError> {
        for &byte in bytes {
            self.push(byte)?;
        }
        Ok(())
    }

    /// Write the final code byte and return the encoded length
    pub fn finish(self) -> usize {
        self.dst[self.code_idx] = self.code;
        self.out_idx
    }

    fn close_run(&mut self) -> Result<(), CobsError> {
        if self.out_idx >= self.dst.len() {
            return Err(CobsError::BufferOverflow);
        }
        self.dst[self.code_idx] = self.code;
        self.code_idx = self.out_idx;
        self.out_idx += 1;
        self.code = 1;
        Ok(())
    }
}

/// Encode `src` into `dst`
///
/// Returns the number of bytes written. Never fails when `dst` holds at
/// least [`max_encoded_len`]`(src.len())` bytes.
pub fn encode(src: &[u8], dst: &mut [u8]) -> Result<usize, CobsError> {
    let mut encoder = Encoder::new(dst)?;
    encoder.extend(src)?;
    Ok(encoder.finish())
}

/// Decode `src` (one encoded frame, without delimiter) into `dst`
///
/// Returns the number of decoded bytes.
pub fn decode(src: &[u8], dst: &mut [u8]) -> Result<usize, CobsError> {
    if src.is_empty() {
        return Err(CobsError::Malformed);
    }

    let mut read = 0;
    let mut write = 0;

    while read < src.len() {
        let code = src[read];
        if code == 0 {
            return Err(CobsError::Malformed);
        }
        read += 1;

        let run = code as usize - 1;
        if read + run > src.len() {
            return Err(CobsError::Malformed);
        }
        if write + run > dst.len() {
            return Err(CobsError::BufferOverflow);
        }
        dst[write..write + run].copy_from_slice(&src[read..read + run]);
        write += run;
        read += run;

        // Implied zero, except after a full run or at the very end
        if code != 0xFF && read < src.len() {
            if write >= dst.len() {
                return Err(CobsError::BufferOverflow);
            }
            dst[write] = 0;
            write += 1;
        }
    }

    Ok(write)
}

/// Decode an encoded frame in place
///
/// The decoded bytes occupy `buf[..n]` on return. Safe because the write
/// cursor never overtakes the read cursor.
pub fn decode_in_place(buf: &mut [u8]) -> Result<usize, CobsError> {
    if buf.is_empty() {
        return Err(CobsError::Malformed);
    }

    let len = buf.len();
    let mut read = 0;
    let mut write = 0;

    while read < len {
        let code = buf[read];
        if code == 0 {
            return Err(CobsError::Malformed);
        }
        read += 1;

        let run = code as usize - 1;
        if read + run > len {
            return Err(CobsError::Malformed);
        }
        buf.copy_within(read..read + run, write);
        write += run;
        read += run;

        if code != 0xFF && read < len {
            buf[write] = 0;
            write += 1;
        }
    }

    Ok(write)
}
