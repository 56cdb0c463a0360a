//! Data Module
//!
//! The on-disk log: record encoding and the segment files holding records.
//!
//! ## Responsibilities
//! - Encode/decode log records with CRC32 checksums
//! - Append records to a segment and read them back by offset
//! - Map file ids to file names
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ Record 1                                             │
//! │ ┌─────────┬─────────┬─────────┬─────────┬──────────┐ │
//! │ │ CRC (4) │Type (1) │KeyLen(v)│ValLen(v)│Key|Value │ │
//! │ └─────────┴─────────┴─────────┴─────────┴──────────┘ │
//! ├──────────────────────────────────────────────────────┤
//! │ Record 2 ...                                         │
//! └──────────────────────────────────────────────────────┘
//! ```
//! No file header, footer, or manifest: a data file is just records.

mod data_file;
mod log_record;
pub(crate) mod varint;

pub(crate) use log_record::claimed_len;

pub use data_file::{DataFile, DATA_FILE_NAME_SUFFIX};
pub use log_record::{
    decode_header, LogRecord, LogRecordHeader, LogRecordPos, LogRecordType, ReadLogRecord,
    MAX_LOG_RECORD_HEADER_SIZE,
};
