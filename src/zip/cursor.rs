//! Bounds-checked little-endian field reader over a byte slice.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::{Error, Result};

/// Sequential reader for fixed-width ZIP record fields.
///
/// Every read is checked against the end of the slice; running past it
/// yields [`Error::CorruptDirectory`] instead of a panic.
pub(crate) struct FieldReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> FieldReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    pub fn u16(&mut self) -> Result<u16> {
        let at = self.position();
        self.cursor.read_u16::<LittleEndian>().map_err(|_| {
            self.cursor.set_position(at as u64);
            truncated(at, 2)
        })
    }

    pub fn u32(&mut self) -> Result<u32> {
        let at = self.position();
        self.cursor.read_u32::<LittleEndian>().map_err(|_| {
            self.cursor.set_position(at as u64);
            truncated(at, 4)
        })
    }

    pub fn u64(&mut self) -> Result<u64> {
        let at = self.position();
        self.cursor.read_u64::<LittleEndian>().map_err(|_| {
            self.cursor.set_position(at as u64);
            truncated(at, 8)
        })
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let at = self.position();
        if self.remaining() < len {
            return Err(truncated(at, len));
        }
        let data: &'a [u8] = *self.cursor.get_ref();
        self.cursor.set_position((at + len) as u64);
        Ok(&data[at..at + len])
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.bytes(len).map(|_| ())
    }

    /// Consume a 4-byte signature, failing if it does not match.
    pub fn expect_signature(&mut self, signature: &[u8], what: &str) -> Result<()> {
        let at = self.position();
        if self.bytes(signature.len())? != signature {
            return Err(Error::corrupt(format!("bad {what} signature at offset {at}")));
        }
        Ok(())
    }
}

fn truncated(at: usize, len: usize) -> Error {
    Error::corrupt(format!("record truncated: need {len} bytes at offset {at}"))
}
