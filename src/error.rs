use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while indexing archives or serving entries.
///
/// The first group describes why a single archive contributed nothing to the
/// index. Those are logged by the indexer and never abort the archive set.
#[derive(Error, Debug)]
pub enum Error {
    #[error("archive is too small to hold an end of central directory record ({0} bytes)")]
    ArchiveTooSmall(u64),

    #[error("not a ZIP archive")]
    NotAnArchive,

    #[error("end of central directory record not found")]
    EocdNotFound,

    #[error("archive contains no entries")]
    EmptyArchive,

    #[error("corrupt central directory: {0}")]
    CorruptDirectory(String),

    /// A central directory record whose local file header could not be validated.
    #[error("unresolved entry {path}: {reason}")]
    UnresolvedEntry { path: String, reason: String },

    #[error("unsupported compression method: {0}")]
    UnsupportedCompression(String),

    #[error("failed to open archive {}: {source}", .path.display())]
    ArchiveOpen {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("archive set is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Error::CorruptDirectory(msg.into())
    }

    pub(crate) fn unresolved(path: &str, reason: impl ToString) -> Self {
        Error::UnresolvedEntry {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for archive operations
pub type Result<T> = std::result::Result<T, Error>;
