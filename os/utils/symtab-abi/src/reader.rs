//! Bounds-checked views over a raw table blob.
//!
//! Nothing here trusts a length field: every read goes through `get()` on a
//! slice that has already been cut down to the declared table size.

use crate::{HEADER_LEN, MAX_MODULE_NAME, SECTION_HEADER_LEN, SectionKind, header};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ReadError {
    /// A read at `offset` would leave the buffer.
    OutOfBounds { offset: usize },
    /// A string at `offset` has no NUL before the end of the pool.
    Unterminated { offset: usize },
    /// A string at `offset` is not valid UTF-8.
    Utf8 { offset: usize },
}

impl ReadError {
    /// Byte offset the error refers to.
    #[must_use]
    pub const fn offset(self) -> usize {
        match self {
            Self::OutOfBounds { offset } | Self::Unterminated { offset } | Self::Utf8 { offset } => {
                offset
            }
        }
    }
}

#[inline]
pub fn read_u8(buf: &[u8], off: usize) -> Result<u8, ReadError> {
    buf.get(off).copied().ok_or(ReadError::OutOfBounds { offset: off })
}

#[inline]
pub fn read_u16_le(buf: &[u8], off: usize) -> Result<u16, ReadError> {
    let end = off.checked_add(2).ok_or(ReadError::OutOfBounds { offset: off })?;
    let s = buf.get(off..end).ok_or(ReadError::OutOfBounds { offset: off })?;
    Ok(u16::from_le_bytes([s[0], s[1]]))
}

#[inline]
pub fn read_u32_le(buf: &[u8], off: usize) -> Result<u32, ReadError> {
    let end = off.checked_add(4).ok_or(ReadError::OutOfBounds { offset: off })?;
    let s = buf.get(off..end).ok_or(ReadError::OutOfBounds { offset: off })?;
    Ok(u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
}

/// Sequential reader over a section body.
///
/// Offsets reported in errors are absolute (relative to the table start).
pub struct Cursor<'a> {
    buf: &'a [u8],
    base: usize,
    pos: usize,
}

impl<'a> Cursor<'a> {
    #[must_use]
    pub const fn new(buf: &'a [u8], base: usize) -> Self {
        Self { buf, base, pos: 0 }
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.base + self.pos
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn advance<T>(
        &mut self,
        n: usize,
        read: fn(&[u8], usize) -> Result<T, ReadError>,
    ) -> Result<T, ReadError> {
        let value = read(self.buf, self.pos).map_err(|_| ReadError::OutOfBounds {
            offset: self.position(),
        })?;
        self.pos += n;
        Ok(value)
    }

    pub fn u8(&mut self) -> Result<u8, ReadError> {
        self.advance(1, read_u8)
    }

    pub fn u16(&mut self) -> Result<u16, ReadError> {
        self.advance(2, read_u16_le)
    }

    pub fn u32(&mut self) -> Result<u32, ReadError> {
        self.advance(4, read_u32_le)
    }

    /// Fails unless `count` records of `record_len` bytes still fit.
    ///
    /// Callers use this before sizing a collection from a count field.
    pub fn expect_records(&self, count: usize, record_len: usize) -> Result<(), ReadError> {
        let needed = count
            .checked_mul(record_len)
            .ok_or(ReadError::OutOfBounds { offset: self.position() })?;
        if needed > self.remaining() {
            return Err(ReadError::OutOfBounds { offset: self.position() });
        }
        Ok(())
    }
}

/// The NUL-terminated string pool at the end of a table.
#[derive(Copy, Clone)]
pub struct StringPool<'a> {
    bytes: &'a [u8],
    base: usize,
}

impl<'a> StringPool<'a> {
    #[must_use]
    pub const fn new(bytes: &'a [u8], base: usize) -> Self {
        Self { bytes, base }
    }

    /// Resolve a pool-relative string offset.
    pub fn get(&self, off: u32) -> Result<&'a str, ReadError> {
        let start = off as usize;
        let abs = self.base.saturating_add(start);
        let tail = self
            .bytes
            .get(start..)
            .ok_or(ReadError::OutOfBounds { offset: abs })?;
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(ReadError::Unterminated { offset: abs })?;
        core::str::from_utf8(&tail[..len]).map_err(|_| ReadError::Utf8 { offset: abs })
    }
}

/// Fixed header fields.
#[derive(Debug, Copy, Clone)]
pub struct RawHeader<'a> {
    pub signature: [u8; 4],
    pub name: &'a str,
    pub version: u16,
    pub size: u32,
    pub strings_offset: u32,
}

impl<'a> RawHeader<'a> {
    /// Parse the header; needs at least [`HEADER_LEN`] bytes.
    pub fn parse(buf: &'a [u8]) -> Result<Self, ReadError> {
        if buf.len() < HEADER_LEN {
            return Err(ReadError::OutOfBounds { offset: buf.len() });
        }
        let mut signature = [0u8; 4];
        signature.copy_from_slice(&buf[header::SIGNATURE..header::SIGNATURE + 4]);

        let field = &buf[header::NAME..header::NAME + MAX_MODULE_NAME];
        let len = field.iter().position(|&b| b == 0).unwrap_or(MAX_MODULE_NAME);
        let name = core::str::from_utf8(&field[..len]).map_err(|_| ReadError::Utf8 {
            offset: header::NAME,
        })?;

        Ok(Self {
            signature,
            name,
            version: read_u16_le(buf, header::VERSION)?,
            size: read_u32_le(buf, header::SIZE)?,
            strings_offset: read_u32_le(buf, header::STRINGS_OFFSET)?,
        })
    }
}

/// One section record: raw kind byte and its body.
#[derive(Debug, Copy, Clone)]
pub struct RawSection<'a> {
    pub kind: u8,
    /// Absolute offset of the record header.
    pub offset: usize,
    pub body: &'a [u8],
}

impl RawSection<'_> {
    #[must_use]
    pub const fn kind(&self) -> Option<SectionKind> {
        SectionKind::from_raw(self.kind)
    }

    /// Absolute offset of the first body byte.
    #[must_use]
    pub const fn body_offset(&self) -> usize {
        self.offset + SECTION_HEADER_LEN
    }
}

/// Walks section records between the header and `limit`.
///
/// Stops at the end record or when `limit` is reached exactly; a record that
/// claims to extend past `limit` yields one error and ends the walk.
pub struct Sections<'a> {
    buf: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> Sections<'a> {
    /// `limit` must already be clamped to the declared table size.
    #[must_use]
    pub fn new(table: &'a [u8], limit: usize) -> Self {
        let limit = limit.min(table.len());
        Self {
            buf: &table[..limit],
            pos: HEADER_LEN,
            done: limit < HEADER_LEN,
        }
    }

    fn next_record(&mut self) -> Result<Option<RawSection<'a>>, ReadError> {
        if self.pos == self.buf.len() {
            return Ok(None);
        }
        let kind = read_u8(self.buf, self.pos)?;
        if kind == SectionKind::End as u8 {
            return Ok(None);
        }
        let len = read_u32_le(self.buf, self.pos + 1)? as usize;
        if len < SECTION_HEADER_LEN {
            return Err(ReadError::OutOfBounds { offset: self.pos });
        }
        let end = self
            .pos
            .checked_add(len)
            .ok_or(ReadError::OutOfBounds { offset: self.pos })?;
        let body = self
            .buf
            .get(self.pos + SECTION_HEADER_LEN..end)
            .ok_or(ReadError::OutOfBounds { offset: self.pos })?;

        let record = RawSection {
            kind,
            offset: self.pos,
            body,
        };
        self.pos = end;
        Ok(Some(record))
    }
}

impl<'a> Iterator for Sections<'a> {
    type Item = Result<RawSection<'a>, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl core::iter::FusedIterator for Sections<'_> {}
