#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

pub const STORED: CompressionMethod = CompressionMethod::Stored;
pub const DEFLATED: CompressionMethod = CompressionMethod::Deflated;

/// Write a ZIP archive at `dir/name` and return its path.
pub fn write_zip(dir: &Path, name: &str, entries: &[(&str, &[u8], CompressionMethod)]) -> PathBuf {
    let path = dir.join(name);
    let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
    for (entry, data, method) in entries {
        let options = SimpleFileOptions::default().compression_method(*method);
        writer.start_file(*entry, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
    path
}

/// Offset of the first content byte of `entry`, as the `zip` crate sees it.
pub fn data_start(archive: &Path, entry: &str) -> u64 {
    let mut archive = zip::ZipArchive::new(File::open(archive).unwrap()).unwrap();
    let file = archive.by_name(entry).unwrap();
    file.data_start()
}

pub fn stylesheet() -> Vec<u8> {
    b"body { margin: 0; padding: 0; font-family: serif; }\n".repeat(40)
}

/// Clear the UTF-8 language encoding flag (bit 11) on every entry, in both
/// the central directory and the local headers.
pub fn clear_utf8_flags(archive: &Path) {
    let mut bytes = std::fs::read(archive).unwrap();
    let eocd = bytes.len() - 22;
    assert_eq!(&bytes[eocd..eocd + 4], b"PK\x05\x06");
    let entries = u16::from_le_bytes(bytes[eocd + 10..eocd + 12].try_into().unwrap());
    let mut record = u32::from_le_bytes(bytes[eocd + 16..eocd + 20].try_into().unwrap()) as usize;

    let field = |bytes: &[u8], at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]) as usize;
    for _ in 0..entries {
        assert_eq!(&bytes[record..record + 4], b"PK\x01\x02");
        let local = u32::from_le_bytes(bytes[record + 42..record + 46].try_into().unwrap()) as usize;
        bytes[record + 9] &= !0x08;
        bytes[local + 7] &= !0x08;
        record += 46 + field(&bytes, record + 28) + field(&bytes, record + 30) + field(&bytes, record + 32);
    }
    std::fs::write(archive, &bytes).unwrap();
}
