//! Error types for CaskDB
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using CaskError
pub type Result<T> = std::result::Result<T, CaskError>;

/// Unified error type for CaskDB operations
#[derive(Debug, Error)]
pub enum CaskError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Key Errors
    // -------------------------------------------------------------------------
    #[error("Key is empty")]
    EmptyKey,

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Index / Data File Errors
    // -------------------------------------------------------------------------
    #[error("Failed to update index")]
    IndexUpdateFailed,

    #[error("Data file {file_id} not found")]
    DataFileNotFound { file_id: u32 },

    #[error("Data directory corrupted: {0}")]
    DirectoryCorrupted(String),

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("Corrupted record: {0}")]
    Corrupted(String),

    /// End of the written region of a data file. Recovery treats this as the
    /// end of a segment, not as a failure.
    #[error("Read past end of data file")]
    ReadPastEnd,

    // -------------------------------------------------------------------------
    // Write Batch Errors
    // -------------------------------------------------------------------------
    #[error("Exceeded max batch size: {staged} staged, limit {max}")]
    ExceedMaxBatchSize { staged: usize, max: usize },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CaskError {
    /// True for errors that mean "the bytes at this offset are not a whole,
    /// valid record". Recovery uses this to tell a torn tail from I/O failure.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            CaskError::ChecksumMismatch { .. } | CaskError::Corrupted(_) | CaskError::ReadPastEnd
        )
    }
}
