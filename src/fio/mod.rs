//! File I/O Module
//!
//! The raw byte-level handle a data file sits on.
//!
//! ## Responsibilities
//! - Positional reads from anywhere in the file
//! - Appending writes (always at the current end)
//! - Durability (`sync`) and size queries
//!
//! The handle knows nothing about records; `DataFile` owns the format.

mod file_io;

use std::path::Path;

use crate::error::Result;

pub use file_io::FileIo;

/// Byte-level I/O on one underlying file
///
/// Implementations must be `Send + Sync`: the engine reads older data files
/// from many threads while holding only a shared lock.
pub trait IoManager: Send + Sync {
    /// Read up to `buf.len()` bytes starting at `offset`, returning the count read
    fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Append `buf` at the end of the file, returning the count written
    fn write(&self, buf: &[u8]) -> Result<usize>;

    /// Force everything written so far to stable storage
    fn sync(&self) -> Result<()>;

    /// Flush and release the handle's resources
    fn close(&self) -> Result<()>;

    /// Current length of the file in bytes
    fn size(&self) -> Result<u64>;

    /// Cut the file down to `len` bytes. Only used to drop a torn tail
    /// during recovery.
    fn truncate(&self, len: u64) -> Result<()>;
}

/// Open the default I/O implementation for `path`
pub fn new_io_manager(path: &Path) -> Result<Box<dyn IoManager>> {
    Ok(Box::new(FileIo::open(path)?))
}
