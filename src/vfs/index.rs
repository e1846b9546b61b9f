use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rustc_hash::FxHashMap;

use crate::zip::{CentralDirectoryEntry, ResolvedEntry};

use super::registry::ArchiveHandle;
use super::stream::EntryLocation;

/// Metadata for one indexed entry and the archive that owns it.
#[derive(Debug, Clone)]
pub struct EntryRecord {
    pub meta: CentralDirectoryEntry,
    /// Offset of the first content byte in the owning archive
    pub data_offset: u64,
    pub archive: Arc<ArchiveHandle>,
}

impl EntryRecord {
    pub fn new(entry: ResolvedEntry, archive: Arc<ArchiveHandle>) -> Self {
        Self {
            meta: entry.meta,
            data_offset: entry.data_offset,
            archive,
        }
    }

    pub fn path(&self) -> &str {
        &self.meta.path
    }

    pub(crate) fn location(&self) -> EntryLocation {
        EntryLocation {
            method: self.meta.compression_method,
            data_offset: self.data_offset,
            compressed_size: self.meta.compressed_size,
            uncompressed_size: self.meta.uncompressed_size,
            crc32: self.meta.crc32,
        }
    }
}

/// Counts from merging one archive into the index.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub inserted: usize,
    /// Paths already provided by an archive earlier in the input list
    pub shadowed: usize,
}

/// Path → entry map spanning every archive in the set.
///
/// Parse tasks merge whole archives at a time. On a duplicate path the
/// entry from the archive with the lower rank is kept, so the result does
/// not depend on which parse task finishes first.
#[derive(Debug, Default)]
pub struct EntryIndex {
    entries: RwLock<FxHashMap<String, Arc<EntryRecord>>>,
}

impl EntryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(
        &self,
        archive: &Arc<ArchiveHandle>,
        entries: HashMap<String, ResolvedEntry>,
    ) -> MergeStats {
        let mut stats = MergeStats::default();
        let mut map = self.entries.write().unwrap_or_else(|e| e.into_inner());
        map.reserve(entries.len());

        for (path, entry) in entries {
            let record = Arc::new(EntryRecord::new(entry, archive.clone()));
            match map.get(&path) {
                Some(existing) if existing.archive.rank() <= archive.rank() => {
                    stats.shadowed += 1;
                }
                Some(_) => {
                    stats.shadowed += 1;
                    map.insert(path, record);
                }
                None => {
                    stats.inserted += 1;
                    map.insert(path, record);
                }
            }
        }

        stats
    }

    pub fn get(&self, path: &str) -> Option<Arc<EntryRecord>> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All indexed paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        paths.sort_unstable();
        paths
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
