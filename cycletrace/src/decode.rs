//! Canonical trace-stream decoder.
//!
//! Yields a lazy sequence of events with cumulative cycle values; the
//! running reference starts at 0, so the first record's delta is the
//! producer's raw initial counter value.

use std::io::{self, Read};

use cycletrace_wire::{delta_from_le, EventKind, BASE_ADDRESS, MAX_DELTA_LEN};
use thiserror::Error;

/// Framing and I/O faults that halt decoding.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("trace read failed: {0}")]
    Io(#[from] io::Error),
    #[error("truncated record at byte {offset}")]
    Truncated { offset: u64 },
    #[error("oversize delta length {len} at byte {offset}")]
    OversizeDelta { len: u8, offset: u64 },
    #[error("invalid record type byte 0x{byte:02x} at byte {offset}")]
    InvalidType { byte: u8, offset: u64 },
}

/// One decoded event with its reconstructed address and the
/// cumulative cycle count on its producer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub address: u32,
    pub cycles: u64,
}

pub struct EventReader<R> {
    inner: R,
    reference: u64,
    offset: u64,
}

impl<R: Read> EventReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            reference: 0,
            offset: 0,
        }
    }

    /// Bytes consumed so far; feeds the progress bar.
    pub fn bytes_read(&self) -> u64 {
        self.offset
    }

    /// Decode the next event. `Ok(None)` is a clean end of stream;
    /// EOF inside a record is a framing error.
    pub fn next_event(&mut self) -> Result<Option<Event>, DecodeError> {
        let type_byte = match self.read_byte()? {
            Some(byte) => byte,
            None => return Ok(None),
        };
        let kind = EventKind::from_byte(type_byte).ok_or(DecodeError::InvalidType {
            byte: type_byte,
            offset: self.offset - 1,
        })?;

        let mut addr_lo = [0u8; 3];
        self.read_field(&mut addr_lo)?;
        let lo = addr_lo[0] as u32 | (addr_lo[1] as u32) << 8 | (addr_lo[2] as u32) << 16;

        let len = match self.read_byte()? {
            Some(byte) => byte,
            None => {
                return Err(DecodeError::Truncated {
                    offset: self.offset,
                })
            }
        };
        if len as usize > MAX_DELTA_LEN {
            return Err(DecodeError::OversizeDelta {
                len,
                offset: self.offset - 1,
            });
        }

        let mut delta_bytes = [0u8; MAX_DELTA_LEN];
        self.read_field(&mut delta_bytes[..len as usize])?;
        let delta = delta_from_le(&delta_bytes[..len as usize]);

        self.reference = self.reference.wrapping_add(delta);
        Ok(Some(Event {
            kind,
            address: BASE_ADDRESS | lo,
            cycles: self.reference,
        }))
    }

    fn read_byte(&mut self) -> Result<Option<u8>, DecodeError> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.offset += 1;
                    return Ok(Some(byte[0]));
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn read_field(&mut self, buf: &mut [u8]) -> Result<(), DecodeError> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.offset += buf.len() as u64;
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Err(DecodeError::Truncated {
                offset: self.offset,
            }),
            Err(err) => Err(err.into()),
        }
    }
}

impl<R: Read> Iterator for EventReader<R> {
    type Item = Result<Event, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cycletrace_wire::{encode_record, MAX_RECORD_LEN};

    fn stream(events: &[(EventKind, u32, u64)]) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut last = 0u64;
        for &(kind, address, cycles) in events {
            let mut buf = [0u8; MAX_RECORD_LEN];
            let len = encode_record(kind, address, cycles - last, &mut buf);
            bytes.extend_from_slice(&buf[..len]);
            last = cycles;
        }
        bytes
    }

    #[test]
    fn empty_stream_ends_cleanly() {
        let mut reader = EventReader::new(&[][..]);
        assert!(reader.next_event().unwrap().is_none());
        assert_eq!(reader.bytes_read(), 0);
    }

    #[test]
    fn cumulative_cycles_accumulate() {
        let bytes = stream(&[
            (EventKind::Entry, 0x8C01_0000, 100),
            (EventKind::Entry, 0x8C01_053C, 110),
            (EventKind::Exit, 0x8C01_053C, 140),
            (EventKind::Exit, 0x8C01_0000, 150),
        ]);
        let events: Vec<Event> = EventReader::new(&bytes[..]).map(Result::unwrap).collect();
        let cycles: Vec<u64> = events.iter().map(|e| e.cycles).collect();
        assert_eq!(cycles, vec![100, 110, 140, 150]);
        assert!(events.iter().all(|e| e.address & 0xFF00_0000 == BASE_ADDRESS));
    }

    #[test]
    fn first_delta_is_raw_counter_value() {
        let bytes = stream(&[(EventKind::Entry, 0x8C01_0000, 123_456_789)]);
        let event = EventReader::new(&bytes[..]).next_event().unwrap().unwrap();
        assert_eq!(event.cycles, 123_456_789);
    }

    #[test]
    fn truncated_tail_is_a_framing_error() {
        let bytes = stream(&[
            (EventKind::Entry, 0x8C01_0000, 100),
            (EventKind::Exit, 0x8C01_0000, 500),
        ]);
        // Cut into the middle of the second record.
        let cut = &bytes[..bytes.len() - 2];
        let mut reader = EventReader::new(cut);
        assert!(reader.next_event().unwrap().is_some());
        assert!(matches!(
            reader.next_event(),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn invalid_type_byte_halts() {
        let mut reader = EventReader::new(&b"x\x00\x00\x00\x00"[..]);
        assert!(matches!(
            reader.next_event(),
            Err(DecodeError::InvalidType { byte: b'x', .. })
        ));
    }

    #[test]
    fn oversize_delta_length_halts() {
        let bytes = [b'>', 0, 0, 0, 10];
        let mut reader = EventReader::new(&bytes[..]);
        assert!(matches!(
            reader.next_event(),
            Err(DecodeError::OversizeDelta { len: 10, .. })
        ));
    }
}
