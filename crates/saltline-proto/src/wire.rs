//! Checked little-endian cursor primitives.
//!
//! [`Reader`] consumes fixed-size fields from a borrowed slice, failing with
//! [`ProtocolError::Truncated`] instead of panicking when the buffer runs
//! short. [`Writer`] appends fields in the same order and also knows the
//! TL-style length-prefixed byte string used by the connection-init prefix.

use bytes::Bytes;

use crate::errors::{ProtocolError, Result};

/// Long-form marker for TL byte strings (length does not fit in one byte).
const TL_LONG_STRING_MARKER: u8 = 0xfe;

/// Cursor over a borrowed byte slice.
///
/// Slices handed out by [`Reader::read_bytes`] borrow the underlying input,
/// not the reader, so container unpacking can recurse into an item's body
/// while the cursor stays positioned after it.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a cursor at the start of `buf`.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes left to consume.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// True when the cursor has consumed the whole input.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(ProtocolError::Truncated {
            needed: len,
            available: self.remaining(),
        })?;
        let slice = self.buf.get(self.pos..end).ok_or(ProtocolError::Truncated {
            needed: len,
            available: self.remaining(),
        })?;
        self.pos = end;
        Ok(slice)
    }

    /// Consume a little-endian u32.
    pub fn read_u32(&mut self) -> Result<u32> {
        let raw = self.read_bytes(4)?;
        let mut field = [0u8; 4];
        field.copy_from_slice(raw);
        Ok(u32::from_le_bytes(field))
    }

    /// Consume a little-endian u64.
    pub fn read_u64(&mut self) -> Result<u64> {
        let raw = self.read_bytes(8)?;
        let mut field = [0u8; 8];
        field.copy_from_slice(raw);
        Ok(u64::from_le_bytes(field))
    }

    /// Consume everything left in the input.
    pub fn read_to_end(&mut self) -> &'a [u8] {
        let rest = self.buf.get(self.pos..).unwrap_or(&[]);
        self.pos = self.buf.len();
        rest
    }
}

/// Append-only little-endian encoder.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append a little-endian u32.
    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a little-endian u64.
    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append raw bytes without framing.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append a TL-style length-prefixed byte string.
    ///
    /// Short form (under 254 bytes) is a one-byte length; long form is the
    /// 0xfe marker plus a three-byte little-endian length. Both forms are
    /// zero-padded to a four-byte boundary.
    ///
    /// Padding is relative to the string's own start, so the encoding is
    /// identical at any buffer offset.
    pub fn write_tl_bytes(&mut self, bytes: &[u8]) {
        let start = self.buf.len();
        if bytes.len() < usize::from(TL_LONG_STRING_MARKER) {
            self.buf.push(bytes.len() as u8);
        } else {
            self.buf.push(TL_LONG_STRING_MARKER);
            let len = (bytes.len() as u32).to_le_bytes();
            self.buf.extend_from_slice(&len[..3]);
        }
        self.buf.extend_from_slice(bytes);
        while (self.buf.len() - start) % 4 != 0 {
            self.buf.push(0);
        }
    }

    /// Append a TL-style string (UTF-8 bytes of `value`).
    pub fn write_tl_string(&mut self, value: &str) {
        self.write_tl_bytes(value.as_bytes());
    }

    /// Finish writing and take the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buf)
    }
}
