#![cfg_attr(all(feature = "target", not(feature = "host")), no_std)]

//! Trace-record wire format shared by the on-target probe and the
//! off-target analyzer.
//!
//! # Canonical record (variable length, little-endian)
//!
//! ```text
//! [0]      type: u8        - '>' (0x3E) entry or '<' (0x3C) exit
//! [1..4]   addr_lo: u8[3]  - low 24 bits of the function address
//! [4]      n: u8           - byte length of the delta field (0..=9)
//! [5..5+n] delta: u8[n]    - cycles elapsed since the producer's
//!                            previous record, minimal-length encoded
//! ```
//!
//! The high 8 bits of every code address on this target are the fixed
//! RAM base [`BASE_ADDRESS`], so only the low 24 bits travel on the
//! wire. A zero-length delta is legal and means zero elapsed cycles;
//! the first record of a stream carries the raw initial counter value
//! because the decoder's running reference starts at 0.
//!
//! The fixed-width alternates live in [`fixed`]. A build uses exactly
//! one variant; the canonical one is what the analyzer accepts.

pub mod fixed;

#[cfg(test)]
use core::mem::size_of;

/// Fixed high byte OR'd into every reconstructed function address.
pub const BASE_ADDRESS: u32 = 0x8C00_0000;

/// Mask selecting the 24 address bits that travel on the wire.
pub const ADDR_LO_MASK: u32 = 0x00FF_FFFF;

/// Record type byte for a function entry.
pub const ENTRY_BYTE: u8 = b'>';

/// Record type byte for a function exit.
pub const EXIT_BYTE: u8 = b'<';

/// Largest accepted delta-field length. The encoder never emits more
/// than 8 bytes for a u64; the decoder tolerates 9 per the format.
pub const MAX_DELTA_LEN: usize = 9;

/// Upper bound on the encoded size of one canonical record.
pub const MAX_RECORD_LEN: usize = 5 + MAX_DELTA_LEN;

/// Whether a record marks a function entry or exit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    Entry,
    Exit,
}

impl EventKind {
    /// Map a wire type byte to its kind. Any byte other than '>' or
    /// '<' is a framing error and yields `None`.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            ENTRY_BYTE => Some(EventKind::Entry),
            EXIT_BYTE => Some(EventKind::Exit),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            EventKind::Entry => ENTRY_BYTE,
            EventKind::Exit => EXIT_BYTE,
        }
    }
}

/// One decoded record, still carrying the producer-relative delta.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RawRecord {
    pub kind: EventKind,
    pub address: u32,
    pub delta: u64,
}

/// Framing faults the canonical codec can detect on a byte slice.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("truncated record")]
    Truncated,
    #[error("oversize delta length {0}")]
    OversizeDelta(u8),
    #[error("invalid record type byte 0x{0:02x}")]
    InvalidType(u8),
}

/// Minimal number of bytes needed to carry `delta`: 0 for a zero
/// delta, otherwise one byte per started octet of its magnitude.
#[inline]
pub fn delta_len(delta: u64) -> usize {
    ((64 - delta.leading_zeros() as usize) + 7) / 8
}

/// Encode one record into `buf`, returning the number of bytes
/// written. `buf` must hold at least [`MAX_RECORD_LEN`] bytes; the
/// producer's staging page guarantees that before every append.
#[inline]
pub fn encode_record(kind: EventKind, address: u32, delta: u64, buf: &mut [u8]) -> usize {
    let n = delta_len(delta);
    let lo = address & ADDR_LO_MASK;
    let delta_le = delta.to_le_bytes();

    buf[0] = kind.as_byte();
    buf[1] = lo as u8;
    buf[2] = (lo >> 8) as u8;
    buf[3] = (lo >> 16) as u8;
    buf[4] = n as u8;
    buf[5..5 + n].copy_from_slice(&delta_le[..n]);

    5 + n
}

/// Assemble a little-endian delta field into a u64. Fields longer
/// than 8 bytes are legal on the wire (`n` may be 9); the surplus
/// high bytes cannot contribute to a 64-bit value and are ignored.
#[inline]
pub fn delta_from_le(bytes: &[u8]) -> u64 {
    let mut value = 0u64;
    for (i, &byte) in bytes.iter().take(8).enumerate() {
        value |= (byte as u64) << (8 * i);
    }
    value
}

/// Decode one record from the front of `buf`, returning it together
/// with the number of bytes consumed. This is the reference decoder
/// for the codec; the analyzer applies the same rules incrementally
/// over a stream.
pub fn decode_record(buf: &[u8]) -> Result<(RawRecord, usize), RecordError> {
    if buf.len() < 5 {
        return Err(RecordError::Truncated);
    }
    let kind = EventKind::from_byte(buf[0]).ok_or(RecordError::InvalidType(buf[0]))?;
    let lo = buf[1] as u32 | (buf[2] as u32) << 8 | (buf[3] as u32) << 16;
    let n = buf[4] as usize;
    if n > MAX_DELTA_LEN {
        return Err(RecordError::OversizeDelta(buf[4]));
    }
    if buf.len() < 5 + n {
        return Err(RecordError::Truncated);
    }

    let record = RawRecord {
        kind,
        address: BASE_ADDRESS | lo,
        delta: delta_from_le(&buf[5..5 + n]),
    };
    Ok((record, 5 + n))
}

// Encoded records can never exceed the staging-page reserve.
#[cfg(test)]
const _: () = {
    assert!(MAX_RECORD_LEN == 14);
    assert!(size_of::<RawRecord>() <= 24);
};
