//! Write Batch
//!
//! Stages puts and deletes, then makes all of them visible at once.
//!
//! ## Commit Protocol
//! ```text
//! ┌──────────────────┬──────────────────┬─────┬──────────────────────┐
//! │ [seq|key1] rec   │ [seq|key2] rec   │ ... │ [seq] TxnFinished    │
//! └──────────────────┴──────────────────┴─────┴──────────────────────┘
//! ```
//! Every staged record is written with its key prefixed by the batch's
//! sequence number, followed by one commit marker. The index is touched only
//! after the marker is on disk. On replay, records whose sequence number has
//! no marker are dropped.

use std::collections::HashMap;

use bytes::BufMut;
use tracing::debug;

use crate::config::WriteBatchOptions;
use crate::data::varint::{decode_varint, encode_varint, varint_len, MAX_VARINT_LEN_U64};
use crate::data::{LogRecord, LogRecordPos, LogRecordType};
use crate::engine::Engine;
use crate::error::{CaskError, Result};

/// Sequence number carried by records written outside any batch
pub const NON_TRANSACTION_SEQ_NO: u64 = 0;

/// Pending mutations for one engine, committed atomically
pub struct WriteBatch<'a> {
    engine: &'a Engine,

    /// Caller key → staged record (last write per key wins)
    pending: HashMap<Vec<u8>, LogRecord>,

    options: WriteBatchOptions,
}

impl<'a> WriteBatch<'a> {
    pub(crate) fn new(engine: &'a Engine, options: WriteBatchOptions) -> Self {
        Self {
            engine,
            pending: HashMap::new(),
            options,
        }
    }

    /// Stage a put. Not visible to readers until `commit`.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(CaskError::EmptyKey);
        }
        self.pending
            .insert(key.to_vec(), LogRecord::normal(key, value));
        Ok(())
    }

    /// Stage a delete. Not visible to readers until `commit`.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(CaskError::EmptyKey);
        }
        self.pending.insert(key.to_vec(), LogRecord::tombstone(key));
        Ok(())
    }

    /// Number of staged entries
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Write every staged record plus a commit marker, then update the index
    ///
    /// On success the batch is empty and can be reused. On an I/O error the
    /// records already appended stay on disk without a marker and are ignored
    /// by recovery; the staged entries are kept.
    pub fn commit(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        if self.pending.len() > self.options.max_batch_entries {
            return Err(CaskError::ExceedMaxBatchSize {
                staged: self.pending.len(),
                max: self.options.max_batch_entries,
            });
        }

        let mut files = self.engine.files().write();
        let seq_no = self.engine.next_seq_no();

        // Step 1: Append every staged record under the batch's sequence number
        let mut positions: Vec<(&[u8], LogRecordType, LogRecordPos)> =
            Vec::with_capacity(self.pending.len());
        for (key, staged) in &self.pending {
            let record = LogRecord {
                key: log_record_key_with_seq(key, seq_no),
                value: staged.value.clone(),
                rec_type: staged.rec_type,
            };
            let pos = self.engine.append_log_record(&mut files, &record)?;
            positions.push((key.as_slice(), staged.rec_type, pos));
        }

        // Step 2: Commit marker
        let finished = LogRecord {
            key: log_record_key_with_seq(&[], seq_no),
            value: Vec::new(),
            rec_type: LogRecordType::TxnFinished,
        };
        self.engine.append_log_record(&mut files, &finished)?;

        if self.options.sync_on_commit {
            Engine::sync_active(&mut files)?;
        } else {
            self.engine.sync_after_write(&mut files)?;
        }

        // Step 3: Only now make the batch visible
        let index = self.engine.index();
        for (key, rec_type, pos) in positions {
            let ok = match rec_type {
                LogRecordType::Normal => index.put(key.to_vec(), pos),
                LogRecordType::Deleted => index.delete(key),
                LogRecordType::TxnFinished => true,
            };
            if !ok {
                return Err(CaskError::IndexUpdateFailed);
            }
        }

        debug!(seq_no, entries = self.pending.len(), "write batch committed");
        self.pending.clear();
        Ok(())
    }
}

/// `varint(seq_no) ++ key`, the key as stored on disk
pub(crate) fn log_record_key_with_seq(key: &[u8], seq_no: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(varint_len(seq_no) + key.len());
    encode_varint(&mut buf, seq_no);
    buf.put_slice(key);
    buf
}

/// Split an on-disk key into the caller key and its sequence number
pub(crate) fn parse_log_record_key(key: &[u8]) -> Result<(Vec<u8>, u64)> {
    let (seq_no, n) = decode_varint(key, MAX_VARINT_LEN_U64)?.ok_or_else(|| {
        CaskError::Corrupted("record key missing sequence number".to_string())
    })?;
    Ok((key[n..].to_vec(), seq_no))
}
