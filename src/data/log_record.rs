//! Log record definitions and codec
//!
//! Defines a single entry of a data file and its byte encoding.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CaskError, Result};

use super::varint::{decode_varint, encode_varint, varint_len, MAX_VARINT_LEN_U32};

/// CRC (4) + Type (1) + KeyLen (≤5) + ValLen (≤5)
pub const MAX_LOG_RECORD_HEADER_SIZE: usize = 4 + 1 + MAX_VARINT_LEN_U32 * 2;

/// Smallest possible header: CRC + Type + two one-byte lengths
const MIN_LOG_RECORD_HEADER_SIZE: usize = 4 + 1 + 1 + 1;

/// Kind of a log record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogRecordType {
    /// A live key/value pair
    Normal = 0,

    /// A tombstone (deleted key)
    Deleted = 1,

    /// Marks the end of one committed write batch
    TxnFinished = 2,
}

impl LogRecordType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(LogRecordType::Normal),
            1 => Some(LogRecordType::Deleted),
            2 => Some(LogRecordType::TxnFinished),
            _ => None,
        }
    }
}

/// A single entry in a data file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub rec_type: LogRecordType,
}

/// Where a record lives on disk. This is what the index stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecordPos {
    /// Data file holding the record
    pub file_id: u32,

    /// Byte offset of the record's first header byte
    pub offset: u64,
}

/// Decoded fixed + varint prefix of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecordHeader {
    pub crc: u32,
    pub rec_type: LogRecordType,
    pub key_size: u32,
    pub value_size: u32,
}

/// A record read back from a data file, with the bytes it occupied
#[derive(Debug, Clone)]
pub struct ReadLogRecord {
    pub record: LogRecord,
    pub size: u64,
}

impl LogRecord {
    pub fn normal(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            rec_type: LogRecordType::Normal,
        }
    }

    pub fn tombstone(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: Vec::new(),
            rec_type: LogRecordType::Deleted,
        }
    }

    /// Encode into the on-disk layout:
    ///
    /// ```text
    /// ┌─────────┬──────────┬────────────┬────────────┬───────┬─────────┐
    /// │ CRC (4) │ Type (1) │ KeyLen (v) │ ValLen (v) │  Key  │  Value  │
    /// └─────────┴──────────┴────────────┴────────────┴───────┴─────────┘
    /// ```
    ///
    /// The CRC is little-endian and covers every byte after itself.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());

        buf.put_u32_le(0); // patched below
        buf.put_u8(self.rec_type as u8);
        encode_varint(&mut buf, self.key.len() as u64);
        encode_varint(&mut buf, self.value.len() as u64);
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.value);

        let crc = crc32fast::hash(&buf[4..]);
        buf[..4].copy_from_slice(&crc.to_le_bytes());

        buf.freeze()
    }

    /// Exact length of `encode()`'s output
    pub fn encoded_len(&self) -> usize {
        4 + 1
            + varint_len(self.key.len() as u64)
            + varint_len(self.value.len() as u64)
            + self.key.len()
            + self.value.len()
    }

    /// Decode one record from the front of `buf`
    ///
    /// Returns the record and the number of bytes it occupied.
    /// `ReadPastEnd` if `buf` stops before the record does.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let (header, header_len) = decode_header(buf)?.ok_or(CaskError::ReadPastEnd)?;

        let key_end = header_len + header.key_size as usize;
        let value_end = key_end + header.value_size as usize;
        if buf.len() < value_end {
            return Err(CaskError::ReadPastEnd);
        }

        let key = &buf[header_len..key_end];
        let value = &buf[key_end..value_end];
        verify_crc(&header, &buf[4..header_len], key, value)?;

        Ok((
            Self {
                key: key.to_vec(),
                value: value.to_vec(),
                rec_type: header.rec_type,
            },
            value_end,
        ))
    }
}

/// Decode a record header from the front of `buf`
///
/// Returns:
/// - `Ok(Some((header, header_len)))`: a complete header
/// - `Ok(None)`: `buf` is too short to hold the whole header
/// - `Err(Corrupted)`: unknown record type or malformed length
pub fn decode_header(buf: &[u8]) -> Result<Option<(LogRecordHeader, usize)>> {
    if buf.len() < MIN_LOG_RECORD_HEADER_SIZE {
        return Ok(None);
    }

    let crc = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let rec_type = LogRecordType::from_u8(buf[4])
        .ok_or_else(|| CaskError::Corrupted(format!("unknown record type {}", buf[4])))?;

    let mut pos = 5;
    let (key_size, n) = match decode_varint(&buf[pos..], MAX_VARINT_LEN_U32)? {
        Some(v) => v,
        None => return Ok(None),
    };
    pos += n;

    let (value_size, n) = match decode_varint(&buf[pos..], MAX_VARINT_LEN_U32)? {
        Some(v) => v,
        None => return Ok(None),
    };
    pos += n;

    if key_size > u32::MAX as u64 || value_size > u32::MAX as u64 {
        return Err(CaskError::Corrupted("record length exceeds u32".to_string()));
    }

    Ok(Some((
        LogRecordHeader {
            crc,
            rec_type,
            key_size: key_size as u32,
            value_size: value_size as u32,
        },
        pos,
    )))
}

/// Bytes the record at the front of `buf` claims to occupy, judged from its
/// length fields alone. The CRC and type byte are not checked.
pub(crate) fn claimed_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < MIN_LOG_RECORD_HEADER_SIZE {
        return None;
    }

    let mut pos = 5;
    let (key_size, n) = decode_varint(&buf[pos..], MAX_VARINT_LEN_U32).ok()??;
    pos += n;
    let (value_size, n) = decode_varint(&buf[pos..], MAX_VARINT_LEN_U32).ok()??;
    pos += n;

    Some(pos.saturating_add(key_size as usize).saturating_add(value_size as usize))
}

/// Check `header.crc` against the type/length bytes and the payload
pub(crate) fn verify_crc(
    header: &LogRecordHeader,
    header_tail: &[u8],
    key: &[u8],
    value: &[u8],
) -> Result<()> {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(header_tail);
    hasher.update(key);
    hasher.update(value);
    let computed = hasher.finalize();

    if computed != header.crc {
        return Err(CaskError::ChecksumMismatch {
            stored: header.crc,
            computed,
        });
    }
    Ok(())
}
