//! Central directory parser.
//!
//! This module indexes a ZIP archive by reading its structures directly,
//! from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Check the leading signature to reject empty or foreign files early
//! 2. Find the End of Central Directory (EOCD) at the file's end
//! 3. If ZIP64, read the ZIP64 EOCD for large file support
//! 4. Read the Central Directory in one request and walk its records
//! 5. Read each entry's Local File Header to find where its data starts
//!
//! Entries whose local header cannot be validated are dropped one by one;
//! the rest of the archive is still indexed.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::io::ReadAt;
use crate::{Error, Result};

use super::cursor::FieldReader;
use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Location of the Central Directory as described by the EOCD records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryLocation {
    pub offset: u64,
    pub size: u64,
    pub entries: u64,
}

/// Low-level ZIP central directory parser.
///
/// Generic over the reader type; the archive set uses it with
/// [`LocalFileReader`](crate::io::LocalFileReader).
///
/// ## Example
///
/// ```ignore
/// let parser = ArchiveParser::new(reader);
/// let entries = parser.parse().await?;
/// for (path, entry) in &entries {
///     println!("{path} @ {}", entry.data_offset);
/// }
/// ```
pub struct ArchiveParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ArchiveParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Parse the whole archive into a path → entry map.
    ///
    /// If a path occurs twice in one central directory the later record wins.
    pub async fn parse(&self) -> Result<HashMap<String, ResolvedEntry>> {
        self.check_leading_signature().await?;

        let location = self.locate_central_directory().await?;
        let entries = self.read_central_directory(location).await?;

        let mut resolved = HashMap::with_capacity(entries.len());
        for entry in entries {
            match self.resolve(entry).await {
                Ok(entry) => {
                    resolved.insert(entry.meta.path.clone(), entry);
                }
                Err(e) => debug!(error = %e, "dropping entry"),
            }
        }

        Ok(resolved)
    }

    /// Reject files that are too small, empty archives, and non-ZIP files.
    async fn check_leading_signature(&self) -> Result<()> {
        if self.size < EndOfCentralDirectory::SIZE as u64 {
            return Err(Error::ArchiveTooSmall(self.size));
        }

        let mut sig = [0u8; 4];
        self.reader.read_exact_at(0, &mut sig).await?;

        if sig == EndOfCentralDirectory::SIGNATURE {
            // An EOCD at offset 0 means there are no local file headers.
            return Err(Error::EmptyArchive);
        }
        if sig != LFH_SIGNATURE {
            return Err(Error::NotAnArchive);
        }
        Ok(())
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// The EOCD is located at the end of the ZIP file. The common case of an
    /// archive without a comment is tried first; otherwise the last
    /// `65535 + 22` bytes are scanned backwards for the signature.
    ///
    /// Returns the EOCD record and its offset in the file.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        if self.size < EndOfCentralDirectory::SIZE as u64 {
            return Err(Error::ArchiveTooSmall(self.size));
        }

        let offset = self.size - EndOfCentralDirectory::SIZE as u64;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.reader.read_exact_at(offset, &mut buf).await?;

        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
            let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
            return Ok((eocd, offset));
        }

        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf).await?;

        // Prefer a record whose comment length accounts for exactly the
        // remaining bytes; the comment itself may contain the signature.
        // Failing that, take the last candidate whose comment fits, which
        // tolerates trailing bytes after the archive.
        let last = buf.len() - EndOfCentralDirectory::SIZE;
        let mut fallback = None;
        for i in (0..=last).rev() {
            if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
                continue;
            }
            let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
            let trailing = buf.len() - i - EndOfCentralDirectory::SIZE;
            if comment_len == trailing {
                fallback = Some(i);
                break;
            }
            if comment_len < trailing && fallback.is_none() {
                fallback = Some(i);
            }
        }

        match fallback {
            Some(i) => {
                let eocd =
                    EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
                Ok((eocd, search_start + i as u64))
            }
            None => Err(Error::EocdNotFound),
        }
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// Called when the regular EOCD indicates ZIP64 extensions are needed
    /// (fields set to 0xFFFF or 0xFFFFFFFF).
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        // The ZIP64 EOCD Locator is located immediately before the regular EOCD
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .ok_or_else(|| Error::corrupt("no room for a ZIP64 locator"))?;
        let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
        self.reader
            .read_exact_at(locator_offset, &mut locator_buf)
            .await?;

        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        if locator.eocd64_offset.saturating_add(Zip64EOCD::MIN_SIZE as u64) > locator_offset {
            return Err(Error::corrupt(format!(
                "ZIP64 end of central directory offset {} out of range",
                locator.eocd64_offset
            )));
        }

        let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        self.reader
            .read_exact_at(locator.eocd64_offset, &mut eocd64_buf)
            .await?;

        Zip64EOCD::from_bytes(&eocd64_buf)
    }

    /// Locate the Central Directory and validate it against the file size.
    pub async fn locate_central_directory(&self) -> Result<DirectoryLocation> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        let location = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset).await?;
            DirectoryLocation {
                offset: eocd64.cd_offset,
                size: eocd64.cd_size,
                entries: eocd64.total_entries,
            }
        } else {
            DirectoryLocation {
                offset: eocd.cd_offset as u64,
                size: eocd.cd_size as u64,
                entries: eocd.total_entries as u64,
            }
        };

        match location.offset.checked_add(location.size) {
            Some(end) if end <= self.size => {}
            _ => {
                return Err(Error::corrupt(format!(
                    "central directory [{}, +{}) exceeds file size {}",
                    location.offset, location.size, self.size
                )));
            }
        }
        if location.entries == 0 {
            return Err(Error::EmptyArchive);
        }

        Ok(location)
    }

    /// Read the Central Directory in one request and parse every record.
    pub async fn read_central_directory(
        &self,
        location: DirectoryLocation,
    ) -> Result<Vec<CentralDirectoryEntry>> {
        let mut cd_data = vec![0u8; location.size as usize];
        self.reader
            .read_exact_at(location.offset, &mut cd_data)
            .await?;

        // A record is at least CDFH_MIN_SIZE bytes, so a bogus entry count
        // cannot force a huge allocation.
        let capacity = location.entries.min((cd_data.len() / CDFH_MIN_SIZE) as u64);
        let mut entries = Vec::with_capacity(capacity as usize);
        let mut reader = FieldReader::new(&cd_data);

        for index in 0..location.entries {
            let entry = CentralDirectoryEntry::read(&mut reader).map_err(|e| match e {
                Error::CorruptDirectory(msg) => {
                    Error::corrupt(format!("record {index}: {msg}"))
                }
                other => other,
            })?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Resolve the data offset of an entry from its Local File Header.
    ///
    /// The Local File Header (LFH) has variable-length fields (filename,
    /// extra field) that may differ from the Central Directory entry.
    pub async fn resolve(&self, entry: CentralDirectoryEntry) -> Result<ResolvedEntry> {
        let header_end = entry.lfh_offset.checked_add(LFH_SIZE as u64);
        if header_end.is_none_or(|end| end > self.size) {
            return Err(Error::unresolved(
                &entry.path,
                format!("local header offset {} out of range", entry.lfh_offset),
            ));
        }

        let mut lfh_buf = [0u8; LFH_SIZE];
        self.reader
            .read_exact_at(entry.lfh_offset, &mut lfh_buf)
            .await
            .map_err(|e| Error::unresolved(&entry.path, e))?;

        let header =
            LocalFileHeader::from_bytes(&lfh_buf).map_err(|e| Error::unresolved(&entry.path, e))?;

        let data_offset = entry.lfh_offset + header.total_len();
        let data_end = data_offset.checked_add(entry.compressed_size);
        if data_end.is_none_or(|end| end > self.size) {
            return Err(Error::unresolved(
                &entry.path,
                format!(
                    "data [{data_offset}, +{}) exceeds file size {}",
                    entry.compressed_size, self.size
                ),
            ));
        }

        Ok(ResolvedEntry {
            meta: entry,
            data_offset,
        })
    }

    /// Total size of the archive in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::LocalFileReader;
    use std::io::Write;
    use std::path::Path;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8], zip::CompressionMethod)], comment: &str) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, data, method) in entries {
            let options = SimpleFileOptions::default().compression_method(*method);
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.set_comment(comment);
        writer.finish().unwrap();
    }

    fn parser_for(path: &Path) -> ArchiveParser<LocalFileReader> {
        ArchiveParser::new(Arc::new(LocalFileReader::new(path).unwrap()))
    }

    const STORED: zip::CompressionMethod = zip::CompressionMethod::Stored;
    const DEFLATED: zip::CompressionMethod = zip::CompressionMethod::Deflated;

    #[tokio::test]
    async fn indexes_stored_and_deflated_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("content.zip");
        let css = b"body { color: black; } ".repeat(20);
        write_zip(
            &path,
            &[
                ("a/index.html", &b"<html></html"[..], STORED),
                ("b/style.css", css.as_slice(), DEFLATED),
            ],
            "",
        );

        let entries = parser_for(&path).parse().await.unwrap();
        assert_eq!(entries.len(), 2);

        let html = &entries["a/index.html"];
        assert_eq!(html.meta.compression_method, CompressionMethod::Stored);
        assert_eq!(html.meta.uncompressed_size, 12);
        assert_eq!(html.meta.crc32, crc32fast::hash(b"<html></html"));

        let bytes = std::fs::read(&path).unwrap();
        let start = html.data_offset as usize;
        assert_eq!(&bytes[start..start + 12], b"<html></html");

        let style = &entries["b/style.css"];
        assert_eq!(style.meta.compression_method, CompressionMethod::Deflate);
        assert_eq!(style.meta.uncompressed_size, css.len() as u64);
        assert!(style.meta.compressed_size < style.meta.uncompressed_size);
    }

    #[tokio::test]
    async fn finds_eocd_behind_a_comment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commented.zip");
        let comment = "PK\u{5}\u{6} is not a real record ".repeat(100);
        write_zip(&path, &[("x.txt", &b"x"[..], STORED)], &comment);

        let parser = parser_for(&path);
        let (eocd, offset) = parser.find_eocd().await.unwrap();
        assert_eq!(eocd.comment_len as usize, comment.len());
        assert_eq!(offset, parser.size() - 22 - comment.len() as u64);
        assert_eq!(parser.parse().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_tiny_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.zip");
        std::fs::write(&path, b"PK\x03\x04").unwrap();

        let err = parser_for(&path).parse().await.unwrap_err();
        assert!(matches!(err, Error::ArchiveTooSmall(4)));
    }

    #[tokio::test]
    async fn rejects_empty_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.zip");
        write_zip(&path, &[], "");

        let err = parser_for(&path).parse().await.unwrap_err();
        assert!(matches!(err, Error::EmptyArchive));
    }

    #[tokio::test]
    async fn rejects_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "definitely not an archive, just text").unwrap();

        let err = parser_for(&path).parse().await.unwrap_err();
        assert!(matches!(err, Error::NotAnArchive));
    }

    #[tokio::test]
    async fn missing_eocd_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("truncated.zip");
        let mut data = b"PK\x03\x04".to_vec();
        data.extend(std::iter::repeat_n(0xAAu8, 200));
        std::fs::write(&path, &data).unwrap();

        let err = parser_for(&path).parse().await.unwrap_err();
        assert!(matches!(err, Error::EocdNotFound));
    }

    #[tokio::test]
    async fn directory_outside_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad-offset.zip");
        write_zip(&path, &[("x.txt", &b"x"[..], STORED)], "");

        let mut bytes = std::fs::read(&path).unwrap();
        let eocd = bytes.len() - 22;
        bytes[eocd + 16..eocd + 20].copy_from_slice(&0x7FFF_0000u32.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();

        let err = parser_for(&path).parse().await.unwrap_err();
        assert!(matches!(err, Error::CorruptDirectory(_)));
    }

    #[tokio::test]
    async fn bad_record_signature_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad-record.zip");
        write_zip(&path, &[("x.txt", &b"x"[..], STORED)], "");

        let mut bytes = std::fs::read(&path).unwrap();
        let eocd = bytes.len() - 22;
        let cd_offset =
            u32::from_le_bytes(bytes[eocd + 16..eocd + 20].try_into().unwrap()) as usize;
        bytes[cd_offset + 3] = 0x09;
        std::fs::write(&path, &bytes).unwrap();

        let err = parser_for(&path).parse().await.unwrap_err();
        assert!(matches!(err, Error::CorruptDirectory(_)));
    }

    #[tokio::test]
    async fn broken_local_header_drops_only_that_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.zip");
        write_zip(
            &path,
            &[
                ("first.txt", &b"first"[..], STORED),
                ("second.txt", &b"second"[..], STORED),
            ],
            "",
        );

        let entries = parser_for(&path).parse().await.unwrap();
        let second = entries["second.txt"].meta.lfh_offset as usize;
        assert!(second > 0);

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[second + 2] = 0x07;
        std::fs::write(&path, &bytes).unwrap();

        let entries = parser_for(&path).parse().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("first.txt"));
    }

    /// Single stored entry `big.txt` whose EOCD defers every field to the
    /// ZIP64 records. Returns the bytes and the offset of the ZIP64 locator.
    fn zip64_archive() -> (Vec<u8>, usize) {
        let name = b"big.txt";
        let data = b"hello";
        let crc = crc32fast::hash(data);

        let mut v = Vec::new();
        v.extend_from_slice(LFH_SIGNATURE);
        v.extend_from_slice(&45u16.to_le_bytes()); // version needed
        v.extend_from_slice(&0u16.to_le_bytes()); // flags
        v.extend_from_slice(&0u16.to_le_bytes()); // stored
        v.extend_from_slice(&[0; 4]); // time, date
        v.extend_from_slice(&crc.to_le_bytes());
        v.extend_from_slice(&5u32.to_le_bytes());
        v.extend_from_slice(&5u32.to_le_bytes());
        v.extend_from_slice(&(name.len() as u16).to_le_bytes());
        v.extend_from_slice(&0u16.to_le_bytes());
        v.extend_from_slice(name);
        v.extend_from_slice(data);

        let cd_offset = v.len() as u64;
        v.extend_from_slice(CDFH_SIGNATURE);
        v.extend_from_slice(&45u16.to_le_bytes()); // made by
        v.extend_from_slice(&45u16.to_le_bytes()); // needed
        v.extend_from_slice(&0u16.to_le_bytes()); // flags
        v.extend_from_slice(&0u16.to_le_bytes()); // stored
        v.extend_from_slice(&[0; 4]); // time, date
        v.extend_from_slice(&crc.to_le_bytes());
        v.extend_from_slice(&5u32.to_le_bytes());
        v.extend_from_slice(&5u32.to_le_bytes());
        v.extend_from_slice(&(name.len() as u16).to_le_bytes());
        v.extend_from_slice(&[0; 4]); // extra, comment
        v.extend_from_slice(&[0; 8]); // disk, internal, external
        v.extend_from_slice(&0u32.to_le_bytes()); // local header offset
        v.extend_from_slice(name);
        let cd_size = v.len() as u64 - cd_offset;

        let eocd64_offset = v.len() as u64;
        v.extend_from_slice(Zip64EOCD::SIGNATURE);
        v.extend_from_slice(&44u64.to_le_bytes());
        v.extend_from_slice(&45u16.to_le_bytes());
        v.extend_from_slice(&45u16.to_le_bytes());
        v.extend_from_slice(&0u32.to_le_bytes());
        v.extend_from_slice(&0u32.to_le_bytes());
        v.extend_from_slice(&1u64.to_le_bytes());
        v.extend_from_slice(&1u64.to_le_bytes());
        v.extend_from_slice(&cd_size.to_le_bytes());
        v.extend_from_slice(&cd_offset.to_le_bytes());

        let locator = v.len();
        v.extend_from_slice(Zip64EOCDLocator::SIGNATURE);
        v.extend_from_slice(&0u32.to_le_bytes());
        v.extend_from_slice(&eocd64_offset.to_le_bytes());
        v.extend_from_slice(&1u32.to_le_bytes());

        v.extend_from_slice(EndOfCentralDirectory::SIGNATURE);
        v.extend_from_slice(&[0xFF; 8]); // disk numbers and entry counts
        v.extend_from_slice(&[0xFF; 8]); // directory size and offset
        v.extend_from_slice(&0u16.to_le_bytes());

        (v, locator)
    }

    #[tokio::test]
    async fn follows_zip64_locator_to_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zip64.zip");
        let (bytes, _) = zip64_archive();
        std::fs::write(&path, &bytes).unwrap();

        let parser = parser_for(&path);
        let (eocd, _) = parser.find_eocd().await.unwrap();
        assert!(eocd.is_zip64());

        let location = parser.locate_central_directory().await.unwrap();
        assert_eq!(
            location,
            DirectoryLocation {
                offset: 30 + 7 + 5,
                size: 46 + 7,
                entries: 1,
            }
        );

        let entries = parser.parse().await.unwrap();
        let entry = &entries["big.txt"];
        assert_eq!(entry.data_offset, 37);
        assert_eq!(entry.meta.uncompressed_size, 5);
        assert_eq!(&bytes[37..42], b"hello");
    }

    #[tokio::test]
    async fn zip64_locator_out_of_range_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zip64-bad-locator.zip");
        let (mut bytes, locator) = zip64_archive();
        let past_end = bytes.len() as u64;
        bytes[locator + 8..locator + 16].copy_from_slice(&past_end.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();

        let err = parser_for(&path).parse().await.unwrap_err();
        assert!(matches!(err, Error::CorruptDirectory(_)));

        let (mut bytes, locator) = zip64_archive();
        bytes[locator + 3] = 0x09;
        std::fs::write(&path, &bytes).unwrap();

        let err = parser_for(&path).parse().await.unwrap_err();
        assert!(matches!(err, Error::CorruptDirectory(_)));
    }
}
