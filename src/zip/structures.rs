use std::fmt;

use crate::{Error, Result};

use super::cursor::FieldReader;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionMethod::Stored => f.write_str("stored"),
            CompressionMethod::Deflate => f.write_str("deflate"),
            CompressionMethod::Unknown(v) => write!(f, "method {v}"),
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(data);
        r.expect_signature(Self::SIGNATURE, "end of central directory")?;

        Ok(Self {
            disk_number: r.u16()?,
            disk_with_cd: r.u16()?,
            disk_entries: r.u16()?,
            total_entries: r.u16()?,
            cd_size: r.u32()?,
            cd_offset: r.u32()?,
            comment_len: r.u16()?,
        })
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(data);
        r.expect_signature(Self::SIGNATURE, "ZIP64 locator")?;

        Ok(Self {
            disk_with_eocd64: r.u32()?,
            eocd64_offset: r.u64()?,
            total_disks: r.u32()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(data);
        r.expect_signature(Self::SIGNATURE, "ZIP64 end of central directory")?;

        Ok(Self {
            eocd64_size: r.u64()?,
            version_made_by: r.u16()?,
            version_needed: r.u16()?,
            disk_number: r.u32()?,
            disk_with_cd: r.u32()?,
            disk_entries: r.u64()?,
            total_entries: r.u64()?,
            cd_size: r.u64()?,
            cd_offset: r.u64()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// ZIP64 extended information extra field id
const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Variable-length part of a Local File Header.
pub struct LocalFileHeader {
    pub compression_method: u16,
    pub file_name_length: u16,
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(data);
        r.expect_signature(LFH_SIGNATURE, "local file header")?;
        // version needed, flags
        r.skip(4)?;
        let compression_method = r.u16()?;
        // mod time, mod date, crc, compressed size, uncompressed size
        r.skip(16)?;

        Ok(Self {
            compression_method,
            file_name_length: r.u16()?,
            extra_field_length: r.u16()?,
        })
    }

    /// Bytes between the start of the header and the first content byte.
    pub fn total_len(&self) -> u64 {
        LFH_SIZE as u64 + self.file_name_length as u64 + self.extra_field_length as u64
    }
}

/// One Central Directory record, before its local header has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryEntry {
    /// Archive-relative path with forward slashes
    pub path: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub is_directory: bool,
}

impl CentralDirectoryEntry {
    /// Parse one CDFH at the reader's position and advance past its
    /// name, extra field and comment.
    pub(crate) fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Self::read_named(r).map(|(entry, _)| entry)
    }

    /// Like [`read`](Self::read), also returning the raw file name bytes.
    pub(crate) fn read_named<'a>(r: &mut FieldReader<'a>) -> Result<(Self, &'a [u8])> {
        r.expect_signature(CDFH_SIGNATURE, "central directory file header")?;

        let _version_made_by = r.u16()?;
        let _version_needed = r.u16()?;
        let _flags = r.u16()?;
        let compression_method = r.u16()?;
        let last_mod_time = r.u16()?;
        let last_mod_date = r.u16()?;
        let crc32 = r.u32()?;
        let mut compressed_size = r.u32()? as u64;
        let mut uncompressed_size = r.u32()? as u64;
        let file_name_length = r.u16()? as usize;
        let extra_field_length = r.u16()? as usize;
        let file_comment_length = r.u16()? as usize;
        let _disk_number_start = r.u16()?;
        let _internal_attrs = r.u16()?;
        let _external_attrs = r.u32()?;
        let mut lfh_offset = r.u32()? as u64;

        let name = r.bytes(file_name_length)?;
        let path = entry_path(name);
        let is_directory = path.ends_with('/');

        let extra = r.bytes(extra_field_length)?;
        apply_zip64_extra(
            extra,
            &mut uncompressed_size,
            &mut compressed_size,
            &mut lfh_offset,
        )?;

        r.skip(file_comment_length)?;

        let entry = Self {
            path,
            compression_method: CompressionMethod::from_u16(compression_method),
            compressed_size,
            uncompressed_size,
            crc32,
            lfh_offset,
            last_mod_time,
            last_mod_date,
            is_directory,
        };
        Ok((entry, name))
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

/// Index key for a raw central directory file name.
///
/// Names are decoded as UTF-8 whatever the language encoding flag says, and
/// `\` separators written by some archivers become `/`.
pub fn entry_path(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).replace('\\', "/")
}

/// Walk the central directory records at the start of `data`, stopping at
/// the first bytes that are not a record signature.
///
/// Each record comes with its raw file name, in directory order.
pub fn walk_directory(data: &[u8]) -> Result<Vec<(&[u8], CentralDirectoryEntry)>> {
    let mut r = FieldReader::new(data);
    let mut records = Vec::new();
    while data[r.position()..].starts_with(CDFH_SIGNATURE) {
        let (entry, name) = CentralDirectoryEntry::read_named(&mut r)?;
        records.push((name, entry));
    }
    Ok(records)
}

/// Replace saturated 32-bit fields with their ZIP64 extra field values.
///
/// Values are present only for fields set to 0xFFFFFFFF, in the fixed
/// order uncompressed size, compressed size, local header offset.
fn apply_zip64_extra(
    extra: &[u8],
    uncompressed_size: &mut u64,
    compressed_size: &mut u64,
    lfh_offset: &mut u64,
) -> Result<()> {
    let mut r = FieldReader::new(extra);

    while r.remaining() >= 4 {
        let header_id = r.u16()?;
        let field_size = r.u16()? as usize;
        let body = r.bytes(field_size)?;

        if header_id != ZIP64_EXTRA_ID {
            continue;
        }

        let mut body = FieldReader::new(body);
        for field in [&mut *uncompressed_size, &mut *compressed_size, &mut *lfh_offset] {
            if *field == 0xFFFFFFFF && body.remaining() >= 8 {
                *field = body.u64()?;
            }
        }
    }

    Ok(())
}

/// A central directory entry whose data offset has been resolved
/// from its local file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub meta: CentralDirectoryEntry,
    /// Offset of the first content byte in the archive file
    pub data_offset: u64,
}
