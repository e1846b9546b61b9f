use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use super::LocalFileReader;

/// A stream restricted to `[offset, offset + len)` of an archive file.
///
/// Bytes are read straight from the file on demand; nothing is buffered.
#[derive(Debug)]
pub struct RegionReader {
    file: Arc<LocalFileReader>,
    offset: u64,
    len: u64,
    pos: u64,
}

impl RegionReader {
    pub fn new(file: Arc<LocalFileReader>, offset: u64, len: u64) -> Self {
        Self {
            file,
            offset,
            len,
            pos: 0,
        }
    }

    /// Absolute file offset of the first byte of the region.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The archive file this region belongs to.
    pub fn file(&self) -> &Arc<LocalFileReader> {
        &self.file
    }
}

impl Read for RegionReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.len.saturating_sub(self.pos);
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let want = (buf.len() as u64).min(remaining) as usize;
        let n = self.file.pread(self.offset + self.pos, &mut buf[..want])?;
        if n == 0 {
            // The file is shorter than the central directory claims.
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "{} truncated at offset {}",
                    self.file.path().display(),
                    self.offset + self.pos
                ),
            ));
        }
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for RegionReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(d) => self.len.checked_add_signed(d),
            SeekFrom::Current(d) => self.pos.checked_add_signed(d),
        };
        match target {
            Some(p) => {
                self.pos = p;
                Ok(p)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of region",
            )),
        }
    }
}
