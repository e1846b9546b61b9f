use super::ReadAt;
use crate::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Local file reader with random access support.
///
/// Reads are positional, so one reader can be shared by any number of
/// streams without coordinating a file cursor.
#[derive(Debug)]
pub struct LocalFileReader {
    file: std::fs::File,
    path: PathBuf,
    size: u64,
}

impl LocalFileReader {
    pub fn new(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocking positional read, used by streams handed to callers.
    pub fn pread(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.read_at(buf, offset)
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            self.file.seek_read(buf, offset)
        }
    }

    /// Blocking positional read that fills the whole buffer.
    pub fn pread_exact(&self, mut offset: u64, mut buf: &mut [u8]) -> std::io::Result<()> {
        while !buf.is_empty() {
            match self.pread(offset, buf)? {
                0 => {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("{} ends before offset {offset}", self.path.display()),
                    ));
                }
                n => {
                    offset += n as u64;
                    buf = &mut std::mem::take(&mut buf)[n..];
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ReadAt for LocalFileReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        Ok(self.pread(offset, buf)?)
    }

    fn size(&self) -> u64 {
        self.size
    }
}
