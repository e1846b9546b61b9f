use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

use flate2::read::DeflateDecoder;

use crate::io::{LocalFileReader, RegionReader};
use crate::zip::CompressionMethod;
use crate::{Error, Result};

/// Where an entry's bytes live and how to decode them.
#[derive(Debug, Clone)]
pub(crate) struct EntryLocation {
    pub method: CompressionMethod,
    pub data_offset: u64,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
}

/// A readable stream over one archive entry.
///
/// Stored entries read straight from the archive file region; deflated
/// entries are decoded on the fly. The stream keeps its own reference to
/// the archive file and is released by dropping it.
pub struct EntryStream {
    kind: StreamKind,
    method: CompressionMethod,
    len: u64,
}

enum StreamKind {
    Stored(CrcReader<RegionReader>),
    Deflated(CrcReader<DeflateDecoder<RegionReader>>),
}

impl EntryStream {
    pub(crate) fn open(
        file: Arc<LocalFileReader>,
        location: &EntryLocation,
        verify_crc: bool,
    ) -> Result<Self> {
        let kind = match location.method {
            CompressionMethod::Stored => {
                let region =
                    RegionReader::new(file, location.data_offset, location.uncompressed_size);
                StreamKind::Stored(CrcReader::new(region, location, verify_crc))
            }
            CompressionMethod::Deflate => {
                let region = RegionReader::new(file, location.data_offset, location.compressed_size);
                let decoder = DeflateDecoder::new(region);
                StreamKind::Deflated(CrcReader::new(decoder, location, verify_crc))
            }
            other => return Err(Error::UnsupportedCompression(other.to_string())),
        };

        Ok(Self {
            kind,
            method: location.method,
            len: location.uncompressed_size,
        })
    }

    /// The file region backing a stored entry.
    ///
    /// `None` for compressed entries, whose bytes are decoded.
    pub fn region(&self) -> Option<&RegionReader> {
        match &self.kind {
            StreamKind::Stored(r) => Some(&r.inner),
            StreamKind::Deflated(_) => None,
        }
    }

    pub fn compression_method(&self) -> CompressionMethod {
        self.method
    }

    /// Decoded length of the entry.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Read for EntryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.kind {
            StreamKind::Stored(r) => r.read(buf),
            StreamKind::Deflated(r) => r.read(buf),
        }
    }
}

impl fmt::Debug for EntryStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryStream")
            .field("method", &self.method)
            .field("len", &self.len)
            .field("region", &self.region())
            .finish()
    }
}

/// Checks length and CRC-32 of everything read once the inner reader
/// reports end of stream.
struct CrcReader<R> {
    inner: R,
    hasher: crc32fast::Hasher,
    read: u64,
    expected_len: u64,
    expected_crc: u32,
    verify: bool,
}

impl<R> CrcReader<R> {
    fn new(inner: R, location: &EntryLocation, verify: bool) -> Self {
        Self {
            inner,
            hasher: crc32fast::Hasher::new(),
            read: 0,
            expected_len: location.uncompressed_size,
            expected_crc: location.crc32,
            verify,
        }
    }

    fn check(&self) -> io::Result<()> {
        if self.read != self.expected_len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "entry length mismatch: expected {}, got {}",
                    self.expected_len, self.read
                ),
            ));
        }
        let crc = self.hasher.clone().finalize();
        if crc != self.expected_crc {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "entry CRC-32 mismatch: expected {:08x}, got {crc:08x}",
                    self.expected_crc
                ),
            ));
        }
        Ok(())
    }
}

impl<R: Read> Read for CrcReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() {
            if self.verify {
                self.check()?;
            }
            return Ok(0);
        }
        if self.verify {
            self.hasher.update(&buf[..n]);
        }
        self.read += n as u64;
        Ok(n)
    }
}
