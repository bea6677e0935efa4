//! SSH wire encoding (RFC 4251 section 5).
//!
//! Every variable-length value is a 4-byte big-endian length followed by the
//! raw bytes. Readers borrow from the input and check every length against the
//! remaining buffer before touching it.

use crate::error::*;

pub fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

pub fn put_string(buf: &mut Vec<u8>, bytes: impl AsRef<[u8]>) {
    let bytes = bytes.as_ref();
    debug_assert!(bytes.len() <= u32::MAX as usize);
    put_u32(buf, bytes.len() as u32);
    buf.extend_from_slice(bytes);
}

/// Write an unsigned big-endian magnitude as an mpint.
pub fn put_mpint(buf: &mut Vec<u8>, magnitude: &[u8]) {
    let start = magnitude
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(magnitude.len());
    let magnitude = &magnitude[start..];
    if magnitude.first().is_some_and(|&b| b & 0x80 != 0) {
        put_u32(buf, magnitude.len() as u32 + 1);
        buf.push(0);
        buf.extend_from_slice(magnitude);
    } else {
        put_string(buf, magnitude);
    }
}

/// Cursor over an SSH wire-encoded buffer.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Reader { buf }
    }

    /// Bytes not consumed yet.
    pub fn remaining(&self) -> &'a [u8] {
        self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn read_raw(&mut self, len: usize, field: &str) -> Result<&'a [u8], SSError> {
        if len > self.buf.len() {
            return Err(SSError::FormatError(format!(
                "{}: needs {} bytes, {} left",
                field,
                len,
                self.buf.len()
            )));
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    pub fn read_u32(&mut self, field: &str) -> Result<u32, SSError> {
        let bytes = self.read_raw(4, field)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_string(&mut self, field: &str) -> Result<&'a [u8], SSError> {
        let len = self.read_u32(field)? as usize;
        self.read_raw(len, field)
    }

    pub fn read_utf8(&mut self, field: &str) -> Result<&'a str, SSError> {
        let bytes = self.read_string(field)?;
        std::str::from_utf8(bytes)
            .map_err(|_| SSError::FormatError(format!("{}: invalid UTF-8", field)))
    }

    /// Read a non-negative mpint and return its magnitude without leading zeros.
    pub fn read_mpint(&mut self, field: &str) -> Result<&'a [u8], SSError> {
        let bytes = self.read_string(field)?;
        if bytes.first().is_some_and(|&b| b & 0x80 != 0) {
            return Err(SSError::FormatError(format!("{}: negative mpint", field)));
        }
        let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
        Ok(&bytes[start..])
    }

    /// Consume the reader, failing if anything is left over.
    pub fn finish(self, what: &str) -> Result<(), SSError> {
        if !self.buf.is_empty() {
            return Err(SSError::FormatError(format!(
                "{}: {} trailing bytes",
                what,
                self.buf.len()
            )));
        }
        Ok(())
    }
}
