//! Bounds-checked reads over an in-memory header buffer.
//!
//! Every format reader walks its bytes through [`BoundedCursor`] or the
//! fixed-offset helpers at the bottom of this module. Nothing here can read
//! past the slice it was given; a read that would is reported as
//! [`ParseError::OutOfBounds`] and leaves the cursor where it was.

use crate::error::{BadNumber, ParseError};
use crate::text::latin1_to_string;

#[derive(Debug, Clone, Copy)]
pub struct BoundedCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BoundedCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Cursor over the same buffer starting at `pos`.
    pub fn at(data: &'a [u8], pos: usize) -> Result<Self, ParseError> {
        if pos > data.len() {
            return Err(ParseError::OutOfBounds {
                offset: pos,
                len: 0,
                end: data.len(),
            });
        }
        Ok(Self { data, pos })
    }

    pub fn pos(&self) -> usize {
        self.pos
    }
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }
    pub fn buffer(&self) -> &'a [u8] {
        self.data
    }

    /// Jump to an absolute position inside the buffer.
    pub fn seek(&mut self, pos: usize) -> Result<(), ParseError> {
        *self = Self::at(self.data, pos)?;
        Ok(())
    }

    /// Move straight to the bound; later reads fail and scanning loops stop.
    pub fn exhaust(&mut self) {
        self.pos = self.data.len();
    }

    fn check(&self, len: usize) -> Result<(), ParseError> {
        match self.pos.checked_add(len) {
            Some(stop) if stop <= self.data.len() => Ok(()),
            _ => Err(ParseError::OutOfBounds {
                offset: self.pos,
                len,
                end: self.data.len(),
            }),
        }
    }

    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }
    pub fn peek_be16(&self) -> Option<u16> {
        let b = self.data.get(self.pos..self.pos.checked_add(2)?)?;
        Some(u16::from_be_bytes([b[0], b[1]]))
    }
    pub fn peek_be32(&self) -> Option<u32> {
        let b = self.data.get(self.pos..self.pos.checked_add(4)?)?;
        Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_fixed(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        self.check(len)?;
        let s = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(s)
    }
    pub fn skip(&mut self, len: usize) -> Result<(), ParseError> {
        self.read_fixed(len).map(|_| ())
    }
    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.read_fixed(1)?[0])
    }
    pub fn read_be16(&mut self) -> Result<u16, ParseError> {
        let b = self.read_fixed(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }
    pub fn read_be32(&mut self) -> Result<u32, ParseError> {
        let b = self.read_fixed(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
    pub fn read_le16(&mut self) -> Result<u16, ParseError> {
        let b = self.read_fixed(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }
    pub fn read_le32(&mut self) -> Result<u32, ParseError> {
        let b = self.read_fixed(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Skip every byte matching `pred`, stopping at the bound.
    pub fn skip_while(&mut self, mut pred: impl FnMut(u8) -> bool) -> usize {
        let start = self.pos;
        while let Some(b) = self.peek_u8() {
            if !pred(b) {
                break;
            }
            self.pos += 1;
        }
        self.pos - start
    }

    /// Offset of the next NUL in `[pos, end)`.
    fn find_nul(&self) -> Option<usize> {
        self.data[self.pos..]
            .iter()
            .position(|&b| b == 0)
            .map(|i| self.pos + i)
    }

    /// NUL-terminated 8-bit string, decoded as Latin-1.
    ///
    /// Latin-1 stands in for the machine's own code page here, which is
    /// close enough for the printable range these headers use.
    pub fn read_cstring(&mut self) -> Result<String, ParseError> {
        let nul = self.find_nul().ok_or(ParseError::OutOfBounds {
            offset: self.pos,
            len: self.remaining() + 1,
            end: self.data.len(),
        })?;
        let s = latin1_to_string(&self.data[self.pos..nul]);
        self.pos = nul + 1;
        Ok(s)
    }

    /// Advance past the next NUL without decoding anything.
    pub fn skip_cstring(&mut self) -> Result<(), ParseError> {
        let nul = self.find_nul().ok_or(ParseError::OutOfBounds {
            offset: self.pos,
            len: self.remaining() + 1,
            end: self.data.len(),
        })?;
        self.pos = nul + 1;
        Ok(())
    }

    /// Unsigned decimal digits followed directly by a NUL.
    ///
    /// On failure the cursor does not move and the digits read so far are
    /// returned in [`BadNumber::partial`]. Values that overflow saturate.
    pub fn read_decimal_cstring(&mut self) -> Result<u32, BadNumber> {
        if self.is_at_end() {
            return Err(BadNumber {
                partial: 0,
                error: ParseError::malformed(self.pos, "number starts at end of buffer"),
            });
        }
        let mut value: u32 = 0;
        let mut p = self.pos;
        while let Some(&b) = self.data.get(p) {
            if !b.is_ascii_digit() {
                break;
            }
            value = value.saturating_mul(10).saturating_add(u32::from(b - b'0'));
            p += 1;
        }
        match self.data.get(p) {
            Some(0) => {
                self.pos = p + 1;
                Ok(value)
            }
            Some(&b) => Err(BadNumber {
                partial: value,
                error: ParseError::malformed(p, format!("unexpected byte {b:#04x} in number")),
            }),
            None => Err(BadNumber {
                partial: value,
                error: ParseError::malformed(p, "number is not NUL-terminated"),
            }),
        }
    }
}

// Fixed-offset accessors for struct overlays.

pub fn slice_at(data: &[u8], offset: usize, len: usize) -> Result<&[u8], ParseError> {
    offset
        .checked_add(len)
        .and_then(|stop| data.get(offset..stop))
        .ok_or(ParseError::OutOfBounds {
            offset,
            len,
            end: data.len(),
        })
}
pub fn u8_at(data: &[u8], offset: usize) -> Result<u8, ParseError> {
    Ok(slice_at(data, offset, 1)?[0])
}
pub fn le16_at(data: &[u8], offset: usize) -> Result<u16, ParseError> {
    let b = slice_at(data, offset, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}
pub fn le32_at(data: &[u8], offset: usize) -> Result<u32, ParseError> {
    let b = slice_at(data, offset, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}
