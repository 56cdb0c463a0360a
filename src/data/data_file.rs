//! Data file (one log segment)
//!
//! Owns one on-disk file, its append cursor, and read-by-offset access.

use std::path::{Path, PathBuf};

use crate::error::{CaskError, Result};
use crate::fio::{self, IoManager};

use super::log_record::{
    decode_header, verify_crc, LogRecord, ReadLogRecord, MAX_LOG_RECORD_HEADER_SIZE,
};

/// Suffix every data file name carries
pub const DATA_FILE_NAME_SUFFIX: &str = ".data";

/// One append-only segment of the log
pub struct DataFile {
    file_id: u32,
    write_off: u64,
    io_manager: Box<dyn IoManager>,
}

impl DataFile {
    /// Open (or create) the data file for `file_id` inside `dir_path`
    ///
    /// Existing contents are kept. The write cursor starts at 0; recovery
    /// moves it to the end of the last valid record.
    pub fn open(dir_path: &Path, file_id: u32) -> Result<Self> {
        let path = Self::file_name(dir_path, file_id);
        let io_manager = fio::new_io_manager(&path)?;
        Ok(Self {
            file_id,
            write_off: 0,
            io_manager,
        })
    }

    /// "{dir}/000000042.data"
    pub fn file_name(dir_path: &Path, file_id: u32) -> PathBuf {
        dir_path.join(format!("{:09}{}", file_id, DATA_FILE_NAME_SUFFIX))
    }

    /// Parse the id out of a data file name
    ///
    /// Returns:
    /// - `None`: not a data file (wrong suffix), ignore it
    /// - `Some(Err(_))`: has the suffix but the stem is not the zero-padded
    ///   id `file_name` would produce (`7.data`, `+1.data`, `abc.data`)
    /// - `Some(Ok(id))`: a data file
    pub fn parse_file_id(file_name: &str) -> Option<Result<u32>> {
        let stem = file_name.strip_suffix(DATA_FILE_NAME_SUFFIX)?;
        let id = stem
            .parse::<u32>()
            .ok()
            .filter(|id| format!("{:09}", id) == stem);
        Some(id.ok_or_else(|| {
            CaskError::DirectoryCorrupted(format!("unexpected data file name {:?}", file_name))
        }))
    }

    pub fn file_id(&self) -> u32 {
        self.file_id
    }

    /// Offset the next write lands at
    pub fn write_off(&self) -> u64 {
        self.write_off
    }

    pub fn set_write_off(&mut self, offset: u64) {
        self.write_off = offset;
    }

    /// Read the record starting at `offset`
    ///
    /// Reads a bounded header first, then exactly the payload it describes.
    /// Returns `ReadPastEnd` when `offset` is at (or the record runs past)
    /// the end of the file.
    pub fn read_log_record(&self, offset: u64) -> Result<ReadLogRecord> {
        let file_size = self.io_manager.size()?;
        if offset >= file_size {
            return Err(CaskError::ReadPastEnd);
        }

        // Near the end of the file the header may be shorter than the max
        let header_bytes = (MAX_LOG_RECORD_HEADER_SIZE as u64).min(file_size - offset) as usize;
        let header_buf = self.read_exact_at(header_bytes, offset)?;

        let (header, header_len) = decode_header(&header_buf)?.ok_or(CaskError::ReadPastEnd)?;

        let key_size = header.key_size as u64;
        let value_size = header.value_size as u64;
        let payload_off = offset + header_len as u64;
        if payload_off + key_size + value_size > file_size {
            return Err(CaskError::ReadPastEnd);
        }

        let payload = self.read_exact_at((key_size + value_size) as usize, payload_off)?;
        let (key, value) = payload.split_at(key_size as usize);
        verify_crc(&header, &header_buf[4..header_len], key, value)?;

        Ok(ReadLogRecord {
            record: LogRecord {
                key: key.to_vec(),
                value: value.to_vec(),
                rec_type: header.rec_type,
            },
            size: header_len as u64 + key_size + value_size,
        })
    }

    /// Append `buf` and advance the write cursor
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let n = self.io_manager.write(buf)?;
        self.write_off += n as u64;
        Ok(n)
    }

    pub fn sync(&self) -> Result<()> {
        self.io_manager.sync()
    }

    pub fn close(&self) -> Result<()> {
        self.io_manager.close()
    }

    /// Current on-disk length (may exceed `write_off` before recovery trims)
    pub fn file_size(&self) -> Result<u64> {
        self.io_manager.size()
    }

    /// Drop everything from `offset` on and move the write cursor there
    pub fn truncate(&mut self, offset: u64) -> Result<()> {
        self.io_manager.truncate(offset)?;
        self.write_off = offset;
        Ok(())
    }

    /// Raw bytes `[offset, offset + len)`
    pub(crate) fn read_bytes(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.read_exact_at(len, offset)
    }

    fn read_exact_at(&self, len: usize, offset: u64) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = self.io_manager.read(&mut buf[filled..], offset + filled as u64)?;
            if n == 0 {
                return Err(CaskError::ReadPastEnd);
            }
            filled += n;
        }
        Ok(buf)
    }
}

impl std::fmt::Debug for DataFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFile")
            .field("file_id", &self.file_id)
            .field("write_off", &self.write_off)
            .finish()
    }
}
