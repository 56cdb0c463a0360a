//! Engine Module
//!
//! The core storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Own the active data file, the older data files, and the index
//! - Rebuild the index by replaying data files on startup
//! - Rotate the active data file when it reaches the size threshold
//! - Handle concurrent read/write access

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::batch::{
    log_record_key_with_seq, parse_log_record_key, WriteBatch, NON_TRANSACTION_SEQ_NO,
};
use crate::config::{Config, IteratorOptions, SyncStrategy, WriteBatchOptions};
use crate::data::{claimed_len, DataFile, LogRecord, LogRecordPos, LogRecordType};
use crate::error::{CaskError, Result};
use crate::index::{self, Indexer};
use crate::iterator::EngineIterator;

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/batch commit/rotation): hold `files` exclusively
///   for the whole append + index update, so no reader ever sees a record
///   on disk without its index entry or half of a batch.
///
/// - **Reads** (get/iterator value): hold `files` shared. Any number run
///   together; they wait only behind an in-flight writer.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Active + older data files. Its lock is the engine-wide read/write gate.
    files: RwLock<DataFiles>,

    /// Key → position of the latest record
    index: Box<dyn Indexer>,

    /// Last sequence number handed to a write batch
    seq_no: AtomicU64,
}

/// Data files owned by the engine
pub(crate) struct DataFiles {
    /// The only writable file
    active: DataFile,

    /// Read-only files, by id
    older: HashMap<u32, DataFile>,

    /// Bytes appended since the active file was last synced
    bytes_since_sync: u64,
}

/// Snapshot of engine statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Number of live keys
    pub key_count: usize,

    /// Number of data files, active included
    pub data_file_count: usize,

    /// Bytes occupied by all data files
    pub disk_size: u64,
}

/// What one recovery pass found
#[derive(Debug, Default)]
struct RecoveryStats {
    records_replayed: u64,
    batches_applied: u64,
    batches_discarded: u64,
    max_seq_no: u64,
    truncated_bytes: u64,
}

/// A batch record waiting for its commit marker
struct PendingRecord {
    key: Vec<u8>,
    rec_type: LogRecordType,
    pos: LogRecordPos,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Validate config, create the data directory
    /// 2. Discover data files, the highest id becomes active
    /// 3. Replay every data file to rebuild the index
    /// 4. Resume the batch sequence counter
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        // Step 1: Create data directory if it doesn't exist
        fs::create_dir_all(&config.dir_path)?;

        // Step 2: Discover and open data files
        let file_ids = Self::discover_file_ids(&config.dir_path)?;
        let mut older = HashMap::new();
        let mut active = None;
        for (i, &file_id) in file_ids.iter().enumerate() {
            let data_file = DataFile::open(&config.dir_path, file_id)?;
            if i == file_ids.len() - 1 {
                active = Some(data_file);
            } else {
                older.insert(file_id, data_file);
            }
        }
        let active = match active {
            Some(file) => file,
            None => DataFile::open(&config.dir_path, 0)?,
        };

        let engine = Self {
            index: index::new_indexer(config.index_type),
            files: RwLock::new(DataFiles {
                active,
                older,
                bytes_since_sync: 0,
            }),
            seq_no: AtomicU64::new(NON_TRANSACTION_SEQ_NO),
            config,
        };

        // Step 3: Rebuild the index
        let stats = {
            let mut files = engine.files.write();
            engine.load_index_from_data_files(&mut files, &file_ids)?
        };

        // Step 4: Resume the sequence counter above anything on disk
        engine.seq_no.store(stats.max_seq_no, Ordering::SeqCst);

        info!(
            dir = %engine.config.dir_path.display(),
            data_files = file_ids.len().max(1),
            keys = engine.index.size(),
            records = stats.records_replayed,
            batches_applied = stats.batches_applied,
            batches_discarded = stats.batches_discarded,
            seq_no = stats.max_seq_no,
            truncated_bytes = stats.truncated_bytes,
            "engine opened"
        );

        Ok(engine)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().dir_path(path).build())
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Acquire write gate
    /// 2. Append a Normal record to the active data file
    /// 3. Point the index at it
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(CaskError::EmptyKey);
        }

        let record = LogRecord::normal(log_record_key_with_seq(key, NON_TRANSACTION_SEQ_NO), value);

        let mut files = self.files.write();
        let pos = self.append_log_record(&mut files, &record)?;
        self.sync_after_write(&mut files)?;

        if !self.index.put(key.to_vec(), pos) {
            return Err(CaskError::IndexUpdateFailed);
        }
        Ok(())
    }

    /// Delete a key
    ///
    /// Deleting a key that is not present writes nothing.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(CaskError::EmptyKey);
        }

        let mut files = self.files.write();
        if self.index.get(key).is_none() {
            return Ok(());
        }

        let record = LogRecord::tombstone(log_record_key_with_seq(key, NON_TRANSACTION_SEQ_NO));
        self.append_log_record(&mut files, &record)?;
        self.sync_after_write(&mut files)?;

        if !self.index.delete(key) {
            return Err(CaskError::IndexUpdateFailed);
        }
        Ok(())
    }

    /// Get a value by key
    pub fn get(&self, key: &[u8]) -> Result<Bytes> {
        if key.is_empty() {
            return Err(CaskError::EmptyKey);
        }

        let files = self.files.read();
        let pos = self.index.get(key).ok_or(CaskError::KeyNotFound)?;
        Self::get_value_by_position(&files, pos)
    }

    /// Stage writes that commit atomically
    pub fn new_write_batch(&self, options: WriteBatchOptions) -> WriteBatch<'_> {
        WriteBatch::new(self, options)
    }

    /// Iterate over live keys in order, optionally filtered by prefix
    pub fn iter(&self, options: IteratorOptions) -> EngineIterator<'_> {
        // Snapshot under the read gate so a half-applied batch is never captured
        let index_iter = {
            let _files = self.files.read();
            self.index.iterator(options.reverse)
        };
        EngineIterator::new(self, index_iter, options)
    }

    /// All live keys in ascending order
    pub fn list_keys(&self) -> Vec<Bytes> {
        let _files = self.files.read();
        self.index.list_keys().into_iter().map(Bytes::from).collect()
    }

    /// Visit every live key/value in ascending key order until `f` returns false
    pub fn fold<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let mut iter = self.iter(IteratorOptions::default());
        while iter.valid() {
            let value = iter.value()?;
            let keep_going = match iter.key() {
                Some(key) => f(key, &value),
                None => false,
            };
            if !keep_going {
                break;
            }
            iter.next();
        }
        iter.close();
        Ok(())
    }

    /// fsync the active data file
    pub fn sync(&self) -> Result<()> {
        let mut files = self.files.write();
        files.active.sync()?;
        files.bytes_since_sync = 0;
        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Syncs the active data file and releases every file handle's buffers.
    pub fn close(&self) -> Result<()> {
        let mut files = self.files.write();
        files.active.close()?;
        for file in files.older.values() {
            file.close()?;
        }
        files.bytes_since_sync = 0;

        info!(
            dir = %self.config.dir_path.display(),
            active_file = files.active.file_id(),
            "engine closed"
        );
        Ok(())
    }

    /// Engine statistics
    pub fn stat(&self) -> Result<EngineStats> {
        let files = self.files.read();
        let mut disk_size = files.active.file_size()?;
        for file in files.older.values() {
            disk_size += file.file_size()?;
        }

        Ok(EngineStats {
            key_count: self.index.size(),
            data_file_count: files.older.len() + 1,
            disk_size,
        })
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.index.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Last sequence number handed to a write batch (0 if none yet)
    pub fn sequence_number(&self) -> u64 {
        self.seq_no.load(Ordering::SeqCst)
    }

    /// Id of the active data file
    pub fn active_file_id(&self) -> u32 {
        self.files.read().active.file_id()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.dir_path
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Crate-internal write path (used by WriteBatch)
    // =========================================================================

    pub(crate) fn files(&self) -> &RwLock<DataFiles> {
        &self.files
    }

    pub(crate) fn index(&self) -> &dyn Indexer {
        self.index.as_ref()
    }

    /// Allocate the next batch sequence number (caller holds the write gate)
    pub(crate) fn next_seq_no(&self) -> u64 {
        self.seq_no.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Append one encoded record, rotating the active file first if needed
    ///
    /// Caller must hold the write gate (`files` exclusively).
    pub(crate) fn append_log_record(
        &self,
        files: &mut DataFiles,
        record: &LogRecord,
    ) -> Result<LogRecordPos> {
        let encoded = record.encode();
        let record_len = encoded.len() as u64;

        // An empty active file takes the record even if it alone exceeds the threshold
        if files.active.write_off() > 0
            && files.active.write_off() + record_len > self.config.data_file_size
        {
            self.rotate_active_file(files)?;
        }

        let write_off = files.active.write_off();
        files.active.write(&encoded)?;
        files.bytes_since_sync += record_len;

        Ok(LogRecordPos {
            file_id: files.active.file_id(),
            offset: write_off,
        })
    }

    /// Apply the configured sync strategy after a non-batched write
    pub(crate) fn sync_after_write(&self, files: &mut DataFiles) -> Result<()> {
        let need_sync = match self.config.sync_strategy {
            SyncStrategy::OsBuffered => false,
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNBytes { bytes } => files.bytes_since_sync >= bytes,
        };
        if need_sync {
            Self::sync_active(files)?;
        }
        Ok(())
    }

    pub(crate) fn sync_active(files: &mut DataFiles) -> Result<()> {
        files.active.sync()?;
        files.bytes_since_sync = 0;
        Ok(())
    }

    /// Resolve a position to its value (caller holds the gate, either side)
    pub(crate) fn get_value_by_position(files: &DataFiles, pos: LogRecordPos) -> Result<Bytes> {
        let data_file = if files.active.file_id() == pos.file_id {
            &files.active
        } else {
            files
                .older
                .get(&pos.file_id)
                .ok_or(CaskError::DataFileNotFound {
                    file_id: pos.file_id,
                })?
        };

        let read = data_file.read_log_record(pos.offset)?;
        match read.record.rec_type {
            LogRecordType::Normal => Ok(Bytes::from(read.record.value)),
            LogRecordType::Deleted | LogRecordType::TxnFinished => Err(CaskError::KeyNotFound),
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Sync the active file, freeze it, and start the next one
    fn rotate_active_file(&self, files: &mut DataFiles) -> Result<()> {
        Self::sync_active(files)?;

        let next_id = files.active.file_id() + 1;
        let new_active = DataFile::open(&self.config.dir_path, next_id)?;
        let old_active = std::mem::replace(&mut files.active, new_active);
        let old_id = old_active.file_id();
        files.older.insert(old_id, old_active);

        debug!(from = old_id, to = next_id, "rotated active data file");
        Ok(())
    }

    /// Ids of every data file in `dir`, ascending
    fn discover_file_ids(dir: &Path) -> Result<Vec<u32>> {
        let mut file_ids = Vec::new();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(id) = DataFile::parse_file_id(&name) {
                file_ids.push(id?);
            }
        }

        file_ids.sort_unstable();
        Ok(file_ids)
    }

    /// Replay data files in id order into the index
    ///
    /// Batch records are staged by sequence number and applied only when
    /// their commit marker is read; anything still staged at the end is an
    /// incomplete batch and is dropped.
    fn load_index_from_data_files(
        &self,
        files: &mut DataFiles,
        file_ids: &[u32],
    ) -> Result<RecoveryStats> {
        let mut stats = RecoveryStats::default();
        let mut pending: HashMap<u64, Vec<PendingRecord>> = HashMap::new();

        for &file_id in file_ids {
            let is_active = file_id == files.active.file_id();
            let data_file = if is_active {
                &files.active
            } else {
                files
                    .older
                    .get(&file_id)
                    .ok_or(CaskError::DataFileNotFound { file_id })?
            };
            let file_size = data_file.file_size()?;

            let mut offset = 0;
            let mut torn_tail = false;
            loop {
                let read = match data_file.read_log_record(offset) {
                    Ok(read) => read,
                    Err(CaskError::ReadPastEnd) if offset >= file_size => break,
                    // A record cut off by EOF is what a crash mid-append leaves behind
                    Err(CaskError::ReadPastEnd) if is_active => {
                        torn_tail = true;
                        break;
                    }
                    Err(e) if e.is_corruption() => {
                        if is_active && !Self::has_valid_record_after(data_file, offset, file_size)? {
                            torn_tail = true;
                            break;
                        }
                        error!(file_id, offset, error = %e, "corrupted record in data file");
                        return Err(CaskError::Corrupted(format!(
                            "data file {} damaged at offset {}: {}",
                            file_id, offset, e
                        )));
                    }
                    Err(e) => return Err(e),
                };

                let (key, seq_no) = parse_log_record_key(&read.record.key)?;
                let pos = LogRecordPos { file_id, offset };
                stats.max_seq_no = stats.max_seq_no.max(seq_no);
                stats.records_replayed += 1;

                if seq_no == NON_TRANSACTION_SEQ_NO {
                    self.apply_to_index(key, read.record.rec_type, pos)?;
                } else if read.record.rec_type == LogRecordType::TxnFinished {
                    if let Some(records) = pending.remove(&seq_no) {
                        for record in records {
                            self.apply_to_index(record.key, record.rec_type, record.pos)?;
                        }
                    }
                    stats.batches_applied += 1;
                } else {
                    pending.entry(seq_no).or_default().push(PendingRecord {
                        key,
                        rec_type: read.record.rec_type,
                        pos,
                    });
                }

                offset += read.size;
            }

            if is_active {
                if torn_tail {
                    warn!(
                        file_id,
                        offset,
                        discarded_bytes = file_size - offset,
                        "truncating torn tail of active data file"
                    );
                    stats.truncated_bytes += file_size - offset;
                    files.active.truncate(offset)?;
                } else {
                    files.active.set_write_off(offset);
                }
            }
        }

        stats.batches_discarded = pending.len() as u64;
        if stats.batches_discarded > 0 {
            debug!(
                batches = stats.batches_discarded,
                "discarded uncommitted write batches"
            );
        }

        Ok(stats)
    }

    fn apply_to_index(&self, key: Vec<u8>, rec_type: LogRecordType, pos: LogRecordPos) -> Result<()> {
        let ok = match rec_type {
            LogRecordType::Normal => self.index.put(key, pos),
            LogRecordType::Deleted => self.index.delete(&key),
            LogRecordType::TxnFinished => true,
        };
        if ok {
            Ok(())
        } else {
            Err(CaskError::IndexUpdateFailed)
        }
    }

    /// Whether any well-formed record starts after a damaged one at `offset`
    ///
    /// A crash can only damage the end of the active file, so damage with
    /// nothing valid behind it is a torn tail. Anything else is real corruption.
    /// The search starts past the extent the damaged record's length fields
    /// claim, so bytes inside its own value are never mistaken for a record.
    fn has_valid_record_after(data_file: &DataFile, offset: u64, file_size: u64) -> Result<bool> {
        let tail = data_file.read_bytes(offset, (file_size - offset) as usize)?;
        let first = claimed_len(&tail).unwrap_or(1).max(1);
        for start in first..tail.len() {
            if LogRecord::decode(&tail[start..]).is_ok() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
