//! # zipvfs
//!
//! A read-only, random-access virtual file layer over a set of ZIP archives.
//!
//! Bundled content (HTML, CSS, media) is shipped as a handful of large
//! archives. This crate serves individual entries out of them by path without
//! unpacking anything to disk.
//!
//! ## Features
//!
//! - Direct parsing of the End of Central Directory and Central Directory,
//!   including ZIP64 archives
//! - One path index spanning many archive files, built concurrently in the
//!   background
//! - Lookups work immediately: before the index is ready they search each
//!   archive's own listing
//! - STORED entries are served as zero-copy file-region streams, DEFLATE
//!   entries through a decompressing stream
//! - Optional CRC-32 verification of everything served
//!
//! ## Example
//!
//! ```no_run
//! use std::io::Read;
//! use zipvfs::{ArchiveVfs, VfsOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let vfs = ArchiveVfs::open(
//!         ["content-1.zip", "content-2.zip"],
//!         &tokio::runtime::Handle::current(),
//!         VfsOptions::default(),
//!     );
//!     vfs.wait_until_ready().await;
//!
//!     if let Some(mut stream) = vfs.get_stream("a/index.html")? {
//!         let mut html = String::new();
//!         stream.read_to_string(&mut html)?;
//!         println!("{html}");
//!     }
//!
//!     vfs.close();
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod vfs;
pub mod zip;

pub use cli::Cli;
pub use config::VfsOptions;
pub use error::{Error, Result};
pub use io::{LocalFileReader, ReadAt, RegionReader};
pub use vfs::{ArchiveVfs, EntryRecord, EntryStream, VfsState};
pub use self::zip::{ArchiveParser, CompressionMethod, ResolvedEntry};
