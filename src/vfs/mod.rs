//! Virtual file layer over a set of ZIP archives.
//!
//! An [`ArchiveVfs`] opens every archive up front and indexes them in the
//! background. Lookups made before the index is complete search each
//! archive's own listing; once it is ready they are a single map lookup.
//!
//! ```text
//! Indexing ──(all parse tasks done)──▶ Ready
//!     │                                  │
//!     └──────────────(close)─────────────┴──▶ Closed
//! ```

mod index;
mod indexer;
mod registry;
mod stream;

pub use index::{EntryIndex, EntryRecord, MergeStats};
pub use registry::{ArchiveHandle, ArchiveSet};
pub use stream::EntryStream;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, trace};

use crate::config::VfsOptions;
use crate::zip::CompressionMethod;
use crate::{Error, Result};

/// Lifecycle of an [`ArchiveVfs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VfsState {
    /// Serving through the per-archive fallback while the index is built
    Indexing,
    /// Serving from the index
    Ready,
    /// All archive handles released
    Closed,
}

/// State shared between the file system and its indexing task.
pub(crate) struct Shared {
    archives: ArchiveSet,
    index: EntryIndex,
    options: VfsOptions,
    ready: AtomicBool,
    closed: AtomicBool,
    state: watch::Sender<VfsState>,
}

impl Shared {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Flip the ready flag. Happens once, after every parse task finished.
    fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
        self.state.send_if_modified(|state| {
            if *state == VfsState::Indexing {
                *state = VfsState::Ready;
                true
            } else {
                false
            }
        });
    }
}

/// Read-only file system over an ordered list of ZIP archives.
///
/// When the same path exists in several archives, the one listed first
/// is served.
pub struct ArchiveVfs {
    shared: Arc<Shared>,
    state: watch::Receiver<VfsState>,
    indexer: Mutex<Option<JoinHandle<()>>>,
}

impl ArchiveVfs {
    /// Open `paths` and start indexing them on `runtime`.
    ///
    /// Returns without waiting for the index. Archives that cannot be
    /// opened are skipped.
    pub fn open<I, P>(paths: I, runtime: &Handle, options: VfsOptions) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let archives = ArchiveSet::open(paths);
        let (state_tx, state_rx) = watch::channel(VfsState::Indexing);

        let shared = Arc::new(Shared {
            archives,
            index: EntryIndex::new(),
            options,
            ready: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            state: state_tx,
        });
        let indexer = indexer::begin_indexing(shared.clone(), runtime);

        Self {
            shared,
            state: state_rx,
            indexer: Mutex::new(Some(indexer)),
        }
    }

    pub fn state(&self) -> VfsState {
        *self.state.borrow()
    }

    /// Whether the index is complete. Never reverts once true.
    pub fn is_ready(&self) -> bool {
        self.shared.is_ready()
    }

    /// Wait for indexing to finish.
    ///
    /// Returns `false` if the file system was closed first.
    pub async fn wait_until_ready(&self) -> bool {
        let mut state = self.state.clone();
        let ready = match state.wait_for(|s| *s != VfsState::Indexing).await {
            Ok(s) => *s == VfsState::Ready,
            Err(_) => false,
        };
        ready
    }

    /// Number of indexed entries; 0 until the index is ready.
    pub fn entry_count(&self) -> usize {
        if !self.is_ready() || self.shared.is_closed() {
            return 0;
        }
        self.shared.index.len()
    }

    /// Number of archives that were opened successfully.
    pub fn archive_count(&self) -> usize {
        self.shared.archives.len()
    }

    /// Indexed metadata for `path`, once the index is ready.
    pub fn entry(&self, path: &str) -> Option<Arc<EntryRecord>> {
        if !self.is_ready() || self.shared.is_closed() {
            return None;
        }
        self.shared.index.get(path)
    }

    /// All indexed paths, sorted. Empty until the index is ready.
    pub fn paths(&self) -> Vec<String> {
        if !self.is_ready() || self.shared.is_closed() {
            return Vec::new();
        }
        self.shared.index.paths()
    }

    /// Open a stream over the entry at `path`.
    ///
    /// `path` is matched exactly: archive-relative, forward slashes, case
    /// sensitive. Returns `Ok(None)` if no archive has it and
    /// [`Error::Closed`] after [`close`](Self::close).
    pub fn get_stream(&self, path: &str) -> Result<Option<EntryStream>> {
        if self.shared.is_closed() {
            return Err(Error::Closed);
        }
        let verify = self.shared.options.verify_crc;

        if !self.is_ready() {
            return self.shared.archives.unindexed_lookup(path, verify);
        }

        let Some(record) = self.shared.index.get(path) else {
            trace!(path, "not in index");
            return Ok(None);
        };

        match record.meta.compression_method {
            CompressionMethod::Stored => {
                EntryStream::open(record.archive.reader().clone(), &record.location(), verify)
                    .map(Some)
            }
            CompressionMethod::Deflate => record.archive.open_entry(path, verify),
            other => Err(Error::UnsupportedCompression(other.to_string())),
        }
    }

    /// Release every archive handle and drop the index.
    ///
    /// Indexing still in progress is cancelled. Streams already handed out
    /// hold their own file reference and should be dropped by their owners
    /// before closing.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.abort_indexer();
        self.shared.index.clear();
        self.shared.archives.close();
        self.shared.state.send_replace(VfsState::Closed);
        info!("archive set closed");
    }

    fn abort_indexer(&self) {
        let task = self
            .indexer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

impl Drop for ArchiveVfs {
    fn drop(&mut self) {
        self.abort_indexer();
    }
}
