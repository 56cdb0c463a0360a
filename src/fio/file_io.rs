//! Standard file I/O
//!
//! `std::fs::File` behind a `parking_lot::RwLock`. Reads are positional so
//! they only need the shared side of the lock on unix.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use parking_lot::RwLock;

use crate::error::Result;

use super::IoManager;

/// File-backed [`IoManager`]
#[derive(Debug)]
pub struct FileIo {
    fd: RwLock<File>,
}

impl FileIo {
    /// Open or create the file at `path` without truncating it
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        Ok(Self {
            fd: RwLock::new(file),
        })
    }
}

impl IoManager for FileIo {
    #[cfg(unix)]
    fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        use std::os::unix::fs::FileExt;

        let fd = self.fd.read();
        Ok(fd.read_at(buf, offset)?)
    }

    #[cfg(not(unix))]
    fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        use std::io::{Read, Seek, SeekFrom};

        // Seeking moves the shared cursor, so take the exclusive side
        let mut fd = self.fd.write();
        fd.seek(SeekFrom::Start(offset))?;
        Ok(fd.read(buf)?)
    }

    fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut fd = self.fd.write();
        fd.write_all(buf)?;
        Ok(buf.len())
    }

    fn sync(&self) -> Result<()> {
        let fd = self.fd.read();
        fd.sync_all()?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut fd = self.fd.write();
        fd.flush()?;
        fd.sync_all()?;
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        let fd = self.fd.read();
        Ok(fd.metadata()?.len())
    }

    fn truncate(&self, len: u64) -> Result<()> {
        let fd = self.fd.write();
        fd.set_len(len)?;
        fd.sync_all()?;
        Ok(())
    }
}
