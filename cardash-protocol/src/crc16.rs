//! CRC16 frame trailer
//!
//! The link uses CRC-16/CCITT-FALSE (catalogued as CRC-16/IBM-3740):
//! polynomial `0x1021`, initial value `0xFFFF`, no reflection, no final
//! XOR. The trailer is the checksum of header + payload, sent
//! little-endian. Both directions use this one definition.

use crc::{Crc, CRC_16_IBM_3740};

use crate::config::TRAILER_LEN;

/// Table-driven CRC-16/CCITT-FALSE
pub const CCITT_FALSE: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Checksum of a contiguous byte span
pub fn crc16(data: &[u8]) -> u16 {
    CCITT_FALSE.checksum(data)
}

/// Trailer bytes for a frame's header and payload
pub fn compute_trailer(header: &[u8], payload: &[u8]) -> [u8; TRAILER_LEN] {
    let mut digest = CCITT_FALSE.digest();
    digest.update(header);
    digest.update(payload);
    digest.finalize().to_le_bytes()
}

/// Recompute the checksum and compare it against a received trailer
pub fn verify_trailer(header: &[u8], payload: &[u8], trailer: &[u8]) -> bool {
    trailer.len() == TRAILER_LEN && compute_trailer(header, payload) == trailer
}
