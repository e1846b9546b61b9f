//! Background indexing of every archive in the set.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::io::ReadAt;
use crate::zip::{ArchiveParser, ResolvedEntry};
use crate::{Error, Result};

use super::Shared;

/// Spawn the orchestrator on `runtime` and return immediately.
///
/// One parse task runs per archive, at most `max_parallel_indexing` at a
/// time. Results are merged into the shared index as each task finishes,
/// and the set is marked ready once every task is done, whether or not it
/// succeeded.
pub(crate) fn begin_indexing(shared: Arc<Shared>, runtime: &Handle) -> JoinHandle<()> {
    runtime.spawn(index_all(shared))
}

async fn index_all(shared: Arc<Shared>) {
    let started = Instant::now();
    let permits = Arc::new(Semaphore::new(shared.options.max_parallel_indexing));

    // Dropping the set (when the orchestrator is aborted) aborts every
    // parse task. A parse already on the blocking pool runs to the end and
    // its result is discarded.
    let mut tasks = JoinSet::new();
    for handle in shared.archives.handles() {
        let permits = permits.clone();
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let result = parse_blocking(handle.reader().clone()).await;
            (handle, result)
        });
    }

    let mut indexed = 0usize;
    let mut failed = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((handle, Ok(entries))) => {
                let found = entries.len();
                let stats = shared.index.merge(&handle, entries);
                indexed += 1;
                debug!(
                    archive = %handle.path().display(),
                    entries = found,
                    shadowed = stats.shadowed,
                    "indexed archive"
                );
            }
            Ok((handle, Err(e))) => {
                failed += 1;
                warn!(archive = %handle.path().display(), error = %e, "failed to index archive");
            }
            Err(e) => {
                failed += 1;
                error!(error = %e, "indexing task did not complete");
            }
        }

        if shared.is_closed() {
            shared.index.clear();
            return;
        }
    }

    shared.mark_ready();
    info!(
        entries = shared.index.len(),
        archives = indexed,
        failed,
        elapsed = ?started.elapsed(),
        "archive index ready"
    );
}

/// Parse one archive on the runtime's blocking pool.
///
/// The reads behind [`ReadAt`] for local files are blocking `pread`s, so the
/// parse never runs on a worker thread or on a current-thread runtime's
/// only thread.
pub(crate) async fn parse_blocking<R: ReadAt + 'static>(
    reader: Arc<R>,
) -> Result<HashMap<String, ResolvedEntry>> {
    let runtime = Handle::current();
    tokio::task::spawn_blocking(move || runtime.block_on(ArchiveParser::new(reader).parse()))
        .await
        .unwrap_or_else(|e| Err(Error::Io(std::io::Error::other(e))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::LocalFileReader;
    use async_trait::async_trait;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use std::thread::ThreadId;
    use zip::write::SimpleFileOptions;

    /// Local reader that remembers which threads it was read from.
    struct TrackingReader {
        inner: LocalFileReader,
        threads: Mutex<Vec<ThreadId>>,
    }

    #[async_trait]
    impl ReadAt for TrackingReader {
        async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
            self.threads.lock().unwrap().push(std::thread::current().id());
            self.inner.read_at(offset, buf).await
        }

        fn size(&self) -> u64 {
            self.inner.size()
        }
    }

    #[tokio::test]
    async fn archives_are_parsed_off_the_runtime_thread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.zip");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        for name in ["one.txt", "two.txt"] {
            writer.start_file(name, SimpleFileOptions::default()).unwrap();
            writer.write_all(name.as_bytes()).unwrap();
        }
        writer.finish().unwrap();

        let reader = Arc::new(TrackingReader {
            inner: LocalFileReader::new(&path).unwrap(),
            threads: Mutex::new(Vec::new()),
        });
        let entries = parse_blocking(reader.clone()).await.unwrap();
        assert_eq!(entries.len(), 2);

        // On the current-thread runtime the test thread is the runtime thread.
        let runtime_thread = std::thread::current().id();
        let threads = reader.threads.lock().unwrap();
        assert!(!threads.is_empty());
        assert!(threads.iter().all(|t| *t != runtime_thread));
    }
}
