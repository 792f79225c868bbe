//! Bit-packed stream used by every packet on the wire.
//!
//! Bits are written least-significant first and packed into bytes starting at
//! the lowest bit. A finished stream is padded with zero bits up to the next
//! byte boundary, which is what lets several packets share one receive buffer.

use crate::codec::{Decode, Encode};
use crate::error::DecodeError;

/// Width of the length prefix written in front of every string.
pub const STRING_LENGTH_BITS: u32 = 16;

/// Largest string (in bytes) the length prefix can describe.
pub const MAX_WIRE_STRING_BYTES: usize = u16::MAX as usize;

/// Append-only bit writer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitWriter {
    buffer: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(bytes),
            bit_len: 0,
        }
    }

    pub fn write_bit(&mut self, bit: bool) {
        let offset = self.bit_len % 8;
        if offset == 0 {
            self.buffer.push(0);
        }
        if bit {
            let last = self.buffer.len() - 1;
            self.buffer[last] |= 1 << offset;
        }
        self.bit_len += 1;
    }

    /// Writes the low `bits` bits of `value`.
    pub fn write_bits(&mut self, value: u64, bits: u32) {
        debug_assert!(bits <= 64, "cannot write {bits} bits at once");
        for i in 0..bits.min(64) {
            self.write_bit((value >> i) & 1 != 0);
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.bit_len % 8 == 0 {
            self.buffer.extend_from_slice(bytes);
            self.bit_len += bytes.len() * 8;
        } else {
            for byte in bytes {
                self.write_bits(u64::from(*byte), 8);
            }
        }
    }

    /// Writes a length-prefixed UTF-8 string.
    ///
    /// Strings longer than the prefix can describe are cut at the last
    /// character boundary that fits.
    pub fn write_string(&mut self, value: &str) {
        let mut end = value.len().min(MAX_WIRE_STRING_BYTES);
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        let bytes = &value.as_bytes()[..end];
        self.write_bits(bytes.len() as u64, STRING_LENGTH_BITS);
        self.write_bytes(bytes);
    }

    pub fn write<T: Encode + ?Sized>(&mut self, value: &T) {
        value.encode(self);
    }

    /// Number of bits written so far, excluding padding.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn byte_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

/// Cursor over a received buffer.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    /// Current cursor position in bits from the start of the buffer.
    pub fn position(&self) -> usize {
        self.bit_pos
    }

    pub fn remaining_bits(&self) -> usize {
        self.data.len() * 8 - self.bit_pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_bits() == 0
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        let remaining = self.remaining_bits();
        if needed > remaining {
            return Err(DecodeError::UnexpectedEnd { needed, remaining });
        }
        Ok(())
    }

    pub fn read_bit(&mut self) -> Result<bool, DecodeError> {
        self.ensure(1)?;
        let byte = self.data[self.bit_pos / 8];
        let bit = (byte >> (self.bit_pos % 8)) & 1 != 0;
        self.bit_pos += 1;
        Ok(bit)
    }

    /// Reads `bits` bits into the low end of a `u64`.
    ///
    /// The cursor does not move when fewer than `bits` bits remain.
    pub fn read_bits(&mut self, bits: u32) -> Result<u64, DecodeError> {
        debug_assert!(bits <= 64, "cannot read {bits} bits at once");
        self.ensure(bits as usize)?;
        let mut value = 0u64;
        for i in 0..bits.min(64) {
            let byte = self.data[self.bit_pos / 8];
            if (byte >> (self.bit_pos % 8)) & 1 != 0 {
                value |= 1 << i;
            }
            self.bit_pos += 1;
        }
        Ok(value)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, DecodeError> {
        self.ensure(len * 8)?;
        if self.bit_pos % 8 == 0 {
            let start = self.bit_pos / 8;
            self.bit_pos += len * 8;
            return Ok(self.data[start..start + len].to_vec());
        }
        let mut bytes = Vec::with_capacity(len);
        for _ in 0..len {
            bytes.push(self.read_bits(8)? as u8);
        }
        Ok(bytes)
    }

    /// Reads a length-prefixed string, failing if it is longer than `max_len` bytes.
    pub fn read_string(&mut self, max_len: usize) -> Result<String, DecodeError> {
        let length = self.read_bits(STRING_LENGTH_BITS)? as usize;
        if length > max_len {
            return Err(DecodeError::StringTooLong {
                length,
                max: max_len,
            });
        }
        let bytes = self.read_bytes(length)?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
    }

    pub fn read<T: Decode>(&mut self) -> Result<T, DecodeError> {
        T::decode(self)
    }

    /// Skips the padding that ends the current packet.
    pub fn align_to_byte(&mut self) {
        self.bit_pos = self.bit_pos.div_ceil(8) * 8;
    }
}
