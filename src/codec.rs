//! Byte- and bit-level field codec primitives.
//!
//! Decoders that cannot lean on `etherparse` header slices (VLAN tags,
//! IPv6 extension headers) read their fields through [`Reader`], a bounds
//! checked cursor over a byte slice. Reads past the end return a typed
//! [`CodecError`] instead of panicking, which decoders map to
//! [`DecodeError::Truncated`](crate::error::DecodeError).

use thiserror::Error;

/// Error from a codec read.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Read past the end of the buffer.
    #[error("read out of bounds (need {needed} bytes, have {have})")]
    OutOfBounds { needed: usize, have: usize },
}

/// Bounds-checked cursor over a byte slice.
///
/// All multi-byte reads are network (big-endian) order.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// The unread tail of the buffer.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn check(&self, needed: usize) -> Result<(), CodecError> {
        if self.remaining() < needed {
            Err(CodecError::OutOfBounds {
                needed,
                have: self.remaining(),
            })
        } else {
            Ok(())
        }
    }

    /// Take `n` bytes as a slice.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        self.check(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Skip `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<(), CodecError> {
        self.check(n)?;
        self.pos += n;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        self.check(1)?;
        let v = self.data[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}

/// Extract bits `[lo, hi]` (inclusive, 0 = least significant) from a u16.
#[inline]
pub fn bits_u16(value: u16, hi: u8, lo: u8) -> u16 {
    debug_assert!(hi >= lo && hi < 16);
    let width = hi - lo + 1;
    let mask = if width >= 16 { u16::MAX } else { (1u16 << width) - 1 };
    (value >> lo) & mask
}

/// Extract bits `[lo, hi]` (inclusive) from a byte.
#[inline]
pub fn bits_u8(value: u8, hi: u8, lo: u8) -> u8 {
    bits_u16(value as u16, hi, lo) as u8
}

/// RFC 1071 internet checksum over a byte slice.
///
/// A header whose stored checksum is valid sums to zero.
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }
    if let [last] = chunks.remainder() {
        sum += (*last as u32) << 8;
    }
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}
