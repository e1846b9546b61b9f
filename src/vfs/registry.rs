use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use rustc_hash::FxHashMap;
use tracing::{trace, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::io::{LocalFileReader, ReadAt};
use crate::zip::{CompressionMethod, walk_directory};
use crate::{Error, Result};

use super::stream::{EntryLocation, EntryStream};

/// An open, read-only archive file.
///
/// Holds two views of the same file: a positional reader used for indexing
/// and zero-copy streams, and a generic ZIP archive used to frame entries
/// before the index exists and to decode compressed ones.
pub struct ArchiveHandle {
    rank: usize,
    reader: Arc<LocalFileReader>,
    archive: Mutex<ZipArchive<File>>,
    /// Entry path, keyed exactly like the index, to the archive's own entry number
    names: FxHashMap<String, usize>,
}

impl ArchiveHandle {
    /// Open `path` as archive number `rank` in the set.
    pub fn open(path: &Path, rank: usize) -> Result<Self> {
        let open_failed = |source: ZipError| Error::ArchiveOpen {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(|e| open_failed(e.into()))?;
        let archive = ZipArchive::new(file).map_err(open_failed)?;
        let reader = LocalFileReader::new(path).map_err(|e| match e {
            Error::Io(io) => open_failed(io.into()),
            other => other,
        })?;
        let names = entry_numbers(&archive, &reader)?;

        Ok(Self {
            rank,
            reader: Arc::new(reader),
            archive: Mutex::new(archive),
            names,
        })
    }

    pub fn path(&self) -> &Path {
        self.reader.path()
    }

    /// Position of this archive in the input list; lower ranks win on
    /// duplicate paths.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// File length in bytes.
    pub fn len(&self) -> u64 {
        self.reader.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reader(&self) -> &Arc<LocalFileReader> {
        &self.reader
    }

    /// Look `path` up in this archive's own entry listing and open it.
    ///
    /// Paths match the index keys: forward slashes, names decoded as UTF-8.
    /// Returns `Ok(None)` if the archive has no such entry.
    pub fn open_entry(&self, path: &str, verify_crc: bool) -> Result<Option<EntryStream>> {
        let Some(&number) = self.names.get(path) else {
            return Ok(None);
        };

        let location = {
            let mut archive = self.archive.lock().unwrap_or_else(|e| e.into_inner());
            let entry = archive.by_index_raw(number)?;

            let method = match entry.compression() {
                zip::CompressionMethod::Stored => CompressionMethod::Stored,
                zip::CompressionMethod::Deflated => CompressionMethod::Deflate,
                other => return Err(Error::UnsupportedCompression(format!("{other:?}"))),
            };

            EntryLocation {
                method,
                data_offset: entry.data_start(),
                compressed_size: entry.compressed_size(),
                uncompressed_size: entry.size(),
                crc32: entry.crc32(),
            }
        };

        EntryStream::open(self.reader.clone(), &location, verify_crc).map(Some)
    }
}

/// Map every entry path, normalized like the index, to its entry number in
/// `archive`.
///
/// The `zip` crate numbers entries by decoded name in directory order, with a
/// repeated name keeping its first number and its last record. Walking the
/// raw records in the same order reproduces that numbering without touching
/// any local header.
fn entry_numbers(
    archive: &ZipArchive<File>,
    reader: &LocalFileReader,
) -> Result<FxHashMap<String, usize>> {
    let start = archive.central_directory_start();
    let len = reader
        .size()
        .checked_sub(start)
        .ok_or_else(|| Error::corrupt(format!("central directory offset {start} past end of file")))?;
    let mut data = vec![0u8; len as usize];
    reader.pread_exact(start, &mut data)?;

    let mut numbers: FxHashMap<&[u8], usize> = FxHashMap::default();
    let mut names = FxHashMap::default();
    for (raw, entry) in walk_directory(&data)? {
        let next = numbers.len();
        let number = *numbers.entry(raw).or_insert(next);
        names.insert(entry.path, number);
    }

    if numbers.len() != archive.len() {
        return Err(Error::corrupt(format!(
            "{} distinct entry names, archive listing has {}",
            numbers.len(),
            archive.len()
        )));
    }
    Ok(names)
}

impl fmt::Debug for ArchiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveHandle")
            .field("path", &self.path())
            .field("rank", &self.rank)
            .field("len", &self.len())
            .field("entries", &self.names.len())
            .finish()
    }
}

/// The set of archives served by one file system, in priority order.
#[derive(Debug, Default)]
pub struct ArchiveSet {
    handles: RwLock<Vec<Arc<ArchiveHandle>>>,
}

impl ArchiveSet {
    /// Open every archive in `paths`.
    ///
    /// Archives that cannot be opened are logged and left out; they
    /// contribute no entries.
    pub fn open<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut handles = Vec::new();
        for (rank, path) in paths.into_iter().enumerate() {
            let path = path.as_ref();
            match ArchiveHandle::open(path, rank) {
                Ok(handle) => handles.push(Arc::new(handle)),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping archive"),
            }
        }

        Self {
            handles: RwLock::new(handles),
        }
    }

    pub fn handles(&self) -> Vec<Arc<ArchiveHandle>> {
        self.handles
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.handles()
            .iter()
            .map(|h| h.path().to_path_buf())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handles.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look `path` up in every archive's own listing, in input order.
    ///
    /// Slower than the index; used only while indexing is still running.
    pub fn unindexed_lookup(&self, path: &str, verify_crc: bool) -> Result<Option<EntryStream>> {
        for handle in self.handles() {
            if let Some(stream) = handle.open_entry(path, verify_crc)? {
                trace!(path, archive = %handle.path().display(), "served without index");
                return Ok(Some(stream));
            }
        }
        Ok(None)
    }

    /// Release every archive handle.
    pub fn close(&self) {
        self.handles
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
