//! Low-level protobuf wire format primitives.
//!
//! This module implements the cursor used by the decoder and the writer
//! helpers used by the encoder.
//!
//! ## Wire Format Overview
//!
//! Each protobuf field is encoded as:
//! - A varint "tag" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages, packed repeated fields)
//! - 3/4: SGROUP/EGROUP (deprecated)
//! - 5: I32 (fixed32, sfixed32, float)

use crate::error::DecodeError;
use crate::MAX_FIELD_NUMBER;
use bytes::{Buf, BufMut};

/// Varints are at most 10 bytes for a 64-bit value
pub const MAX_VARINT_LEN: usize = 10;

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    I64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    Len = 2,
    /// Start group (deprecated)
    StartGroup = 3,
    /// End group (deprecated)
    EndGroup = 4,
    /// 32-bit fixed-width
    I32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::I32),
            _ => Err(DecodeError::InvalidWireType { value, offset: 0 }),
        }
    }
}

/// A read cursor over a borrowed wire-format buffer.
///
/// Offsets reported in errors are absolute: a reader created for an embedded
/// message with [`WireReader::read_nested`] keeps counting from where the
/// payload sits in the outermost buffer.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> WireReader<'a> {
    /// Creates a reader positioned at the start of `buf`
    pub fn new(buf: &'a [u8]) -> Self {
        Self::with_base_offset(buf, 0)
    }

    /// Creates a reader whose error offsets start at `base`
    pub fn with_base_offset(buf: &'a [u8], base: usize) -> Self {
        Self { buf, pos: 0, base }
    }

    /// Bytes consumed from this reader's own buffer
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Absolute offset of the cursor
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Returns true once every byte has been consumed
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Reads a field tag.
    ///
    /// Returns `Ok(None)` when the buffer is exhausted exactly at a tag
    /// boundary, which is how a message ends. Running out of bytes partway
    /// through the tag is a truncation error.
    pub fn read_tag(&mut self) -> Result<Option<(u32, WireType)>, DecodeError> {
        if self.is_empty() {
            return Ok(None);
        }

        let offset = self.offset();
        let key = self.read_varint()?;

        let wire_type = WireType::try_from((key & 0x07) as u8).map_err(|_| {
            DecodeError::InvalidWireType {
                value: (key & 0x07) as u8,
                offset,
            }
        })?;

        let number = key >> 3;
        if number == 0 || number > u64::from(MAX_FIELD_NUMBER) {
            return Err(DecodeError::InvalidFieldNumber { number, offset });
        }

        Ok(Some((number as u32, wire_type)))
    }

    /// Reads a base-128 varint of at most 10 bytes.
    pub fn read_varint(&mut self) -> Result<u64, DecodeError> {
        let start = self.offset();
        let mut result: u64 = 0;

        for i in 0..MAX_VARINT_LEN {
            let Some(&byte) = self.buf.get(self.pos + i) else {
                return Err(DecodeError::truncated(self.offset() + i, "varint"));
            };

            // The tenth byte may only contribute the single remaining bit
            if i == MAX_VARINT_LEN - 1 && byte > 1 {
                return Err(DecodeError::malformed_varint(start));
            }

            result |= u64::from(byte & 0x7F) << (7 * i);

            if byte & 0x80 == 0 {
                self.pos += i + 1;
                return Ok(result);
            }
        }

        Err(DecodeError::malformed_varint(start))
    }

    /// Reads a little-endian 32-bit value
    pub fn read_fixed32(&mut self) -> Result<u32, DecodeError> {
        let mut chunk = self.take(4, "fixed32")?;
        Ok(chunk.get_u32_le())
    }

    /// Reads a little-endian 64-bit value
    pub fn read_fixed64(&mut self) -> Result<u64, DecodeError> {
        let mut chunk = self.take(8, "fixed64")?;
        Ok(chunk.get_u64_le())
    }

    /// Reads a varint length N followed by exactly N bytes
    pub fn read_length_delimited(&mut self) -> Result<&'a [u8], DecodeError> {
        let offset = self.offset();
        let len = self.read_varint()?;
        let len = usize::try_from(len)
            .ok()
            .filter(|&len| len <= self.remaining())
            .ok_or_else(|| {
                DecodeError::truncated(
                    offset,
                    format!(
                        "length-delimited field needs {} bytes, have {}",
                        len,
                        self.remaining()
                    ),
                )
            })?;
        self.take(len, "length-delimited payload")
    }

    /// Reads a length-delimited payload as a reader of its own
    pub fn read_nested(&mut self) -> Result<WireReader<'a>, DecodeError> {
        let payload = self.read_length_delimited()?;
        let base = self.offset() - payload.len();
        Ok(WireReader::with_base_offset(payload, base))
    }

    /// Consumes the value of a field whose tag has already been read.
    ///
    /// Groups are skipped up to their matching end marker, honoring nesting.
    pub fn skip_field(&mut self, wire_type: WireType, number: u32) -> Result<(), DecodeError> {
        match wire_type {
            WireType::Varint => self.read_varint().map(drop),
            WireType::I64 => self.take(8, "fixed64").map(drop),
            WireType::Len => self.read_length_delimited().map(drop),
            WireType::I32 => self.take(4, "fixed32").map(drop),
            WireType::StartGroup => self.skip_group(number),
            WireType::EndGroup => Err(DecodeError::UnbalancedGroup {
                number,
                offset: self.offset(),
            }),
        }
    }

    fn skip_group(&mut self, number: u32) -> Result<(), DecodeError> {
        let mut open = vec![number];

        while let Some(&expected) = open.last() {
            let offset = self.offset();
            let Some((field, wire_type)) = self.read_tag()? else {
                return Err(DecodeError::truncated(offset, "unterminated group"));
            };

            match wire_type {
                WireType::StartGroup => open.push(field),
                WireType::EndGroup if field == expected => {
                    open.pop();
                }
                WireType::EndGroup => {
                    return Err(DecodeError::UnbalancedGroup {
                        number: field,
                        offset,
                    });
                }
                other => self.skip_field(other, field)?,
            }
        }

        Ok(())
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::truncated(
                self.offset(),
                format!("{} needs {} bytes, have {}", what, len, self.remaining()),
            ));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}

/// Writes `value` as a minimal-length varint
pub fn put_varint(mut value: u64, buf: &mut impl BufMut) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Writes a field tag
pub fn put_tag(number: u32, wire_type: WireType, buf: &mut impl BufMut) {
    put_varint((u64::from(number) << 3) | wire_type as u64, buf);
}

/// Writes a little-endian 32-bit value
pub fn put_fixed32(value: u32, buf: &mut impl BufMut) {
    buf.put_u32_le(value);
}

/// Writes a little-endian 64-bit value
pub fn put_fixed64(value: u64, buf: &mut impl BufMut) {
    buf.put_u64_le(value);
}

/// Writes the varint length of `payload` followed by the payload itself
pub fn put_length_delimited(payload: &[u8], buf: &mut impl BufMut) {
    put_varint(payload.len() as u64, buf);
    buf.put_slice(payload);
}

/// Number of bytes `put_varint` emits for `value`
pub fn encoded_len_varint(value: u64) -> usize {
    // 7 payload bits per byte, at least one byte
    ((64 - (value | 1).leading_zeros()) as usize + 6) / 7
}

/// Zigzag-maps a signed 32-bit value for `sint32`
pub fn zigzag_encode32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// Inverse of [`zigzag_encode32`]
pub fn zigzag_decode32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// Zigzag-maps a signed 64-bit value for `sint64`
pub fn zigzag_encode64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Inverse of [`zigzag_encode64`]
pub fn zigzag_decode64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}
