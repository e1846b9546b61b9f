//! ZIP central directory parsing.
//!
//! This module reads the structures of a ZIP archive directly so the archive
//! set can build its path index without going through a general purpose
//! archive library.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: Locates and walks the Central Directory, resolving each entry's data offset
//! - `cursor`: Bounds-checked little-endian field reader shared by both
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions for files > 4GB
//! - STORED (no compression) method
//! - DEFLATE compression method
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support

mod cursor;
mod parser;
mod structures;

pub use parser::{ArchiveParser, DirectoryLocation};
pub use structures::*;
