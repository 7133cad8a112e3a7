//! Big-endian byte cursor used by every legacy stream in the cache.
//!
//! All multi-byte values are big-endian. Besides the fixed-width reads the
//! formats lean on a family of "smart" variable-length integers:
//!
//! ```text
//! unsigned smart  first byte < 128 → u8            (0..=127)
//!                 otherwise       → u16 - 0x8000  (0..=32767)
//! signed smart    first byte < 128 → u8 - 64       (-64..=63)
//!                 otherwise       → u16 - 0xC000  (-16384..=16383)
//! ```

use crate::error::{Result, SceneError};

#[derive(Debug, Clone)]
pub struct Buffer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Buffer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Cursor positioned at `pos`. Positions past the end are allowed; the
    /// first read reports the underrun.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if n > available {
            return Err(SceneError::Truncated {
                needed: n,
                available,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn peek_u8(&self) -> Result<u8> {
        self.data.get(self.pos).copied().ok_or(SceneError::Truncated {
            needed: 1,
            available: 0,
        })
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u24(&mut self) -> Result<u32> {
        let b = self.take(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_unsigned_smart(&mut self) -> Result<u16> {
        if self.peek_u8()? < 128 {
            Ok(self.read_u8()? as u16)
        } else {
            Ok(self.read_u16()? - 0x8000)
        }
    }

    pub fn read_signed_smart(&mut self) -> Result<i32> {
        if self.peek_u8()? < 128 {
            Ok(self.read_u8()? as i32 - 64)
        } else {
            Ok(self.read_u16()? as i32 - 0xC000)
        }
    }

    /// Unsigned smarts summed while each part saturates at 32767, so ids
    /// larger than a single smart can hold still encode.
    pub fn read_incr_smart(&mut self) -> Result<i32> {
        let mut total = 0i32;
        loop {
            let part = self.read_unsigned_smart()?;
            total = total
                .checked_add(part as i32)
                .ok_or_else(|| SceneError::corrupt("smart", "incrementing smart overflows i32"))?;
            if part != 32767 {
                return Ok(total);
            }
        }
    }

    /// NUL-terminated CP-1252 string. Bytes map straight onto code points,
    /// which is exact for the Latin-1 subset the definitions use.
    pub fn read_string(&mut self) -> Result<String> {
        let start = self.pos;
        let end = self.data[start.min(self.data.len())..]
            .iter()
            .position(|&b| b == 0)
            .map(|n| start + n)
            .ok_or(SceneError::Truncated {
                needed: 1,
                available: 0,
            })?;
        let s = self.data[start..end].iter().map(|&b| b as char).collect();
        self.pos = end + 1;
        Ok(s)
    }
}

// ============================================================================
// Writers (encoder side)
// ============================================================================

pub(crate) fn put_unsigned_smart(out: &mut Vec<u8>, value: u16) {
    if value < 128 {
        out.push(value as u8);
    } else {
        out.extend_from_slice(&(value + 0x8000).to_be_bytes());
    }
}

pub(crate) fn put_signed_smart(out: &mut Vec<u8>, value: i32) {
    if (-64..64).contains(&value) {
        out.push((value + 64) as u8);
    } else {
        out.extend_from_slice(&((value + 0xC000) as u16).to_be_bytes());
    }
}
