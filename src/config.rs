//! Configuration for CaskDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{CaskError, Result};

/// Main configuration for a CaskDB instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding the data files
    /// Internal structure:
    ///   {dir_path}/
    ///     ├── 000000000.data   (oldest segment)
    ///     ├── 000000001.data
    ///     └── 00000000N.data   (active segment)
    pub dir_path: PathBuf,

    /// Size threshold (in bytes) at which the active data file is rotated
    pub data_file_size: u64,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the active data file
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Index Configuration
    // -------------------------------------------------------------------------
    /// Which in-memory index implementation to use
    pub index_type: IndexType,
}

/// Data file sync strategy for non-batched writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// Leave flushing to the OS page cache (fastest, may lose recent writes)
    OsBuffered,

    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync once this many bytes have been appended since the last sync
    EveryNBytes { bytes: u64 },
}

/// In-memory index implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexType {
    /// Ordered map backed by `BTreeMap`
    #[default]
    BTree,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dir_path: PathBuf::from("./caskdb_data"),
            data_file_size: 256 * 1024 * 1024, // 256 MB
            sync_strategy: SyncStrategy::OsBuffered,
            index_type: IndexType::BTree,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that the options can back an engine
    pub fn validate(&self) -> Result<()> {
        if self.dir_path.as_os_str().is_empty() {
            return Err(CaskError::Config("database dir path is empty".to_string()));
        }
        if self.data_file_size == 0 {
            return Err(CaskError::Config(
                "data file size must be greater than 0".to_string(),
            ));
        }
        if let SyncStrategy::EveryNBytes { bytes: 0 } = self.sync_strategy {
            return Err(CaskError::Config(
                "EveryNBytes sync threshold must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory
    pub fn dir_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.dir_path = path.into();
        self
    }

    /// Set the rotation threshold for data files (in bytes)
    pub fn data_file_size(mut self, size: u64) -> Self {
        self.config.data_file_size = size;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Shorthand: `true` syncs every write, `false` leaves it to the OS
    pub fn sync_writes(mut self, sync: bool) -> Self {
        self.config.sync_strategy = if sync {
            SyncStrategy::EveryWrite
        } else {
            SyncStrategy::OsBuffered
        };
        self
    }

    /// Set the index implementation
    pub fn index_type(mut self, index_type: IndexType) -> Self {
        self.config.index_type = index_type;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// Options for [`crate::Engine::iter`]
#[derive(Debug, Clone, Default)]
pub struct IteratorOptions {
    /// Only yield keys starting with this prefix (empty matches everything)
    pub prefix: Vec<u8>,

    /// Walk keys in descending order
    pub reverse: bool,
}

/// Options for [`crate::Engine::new_write_batch`]
#[derive(Debug, Clone, Copy)]
pub struct WriteBatchOptions {
    /// Maximum number of staged entries a single commit accepts
    pub max_batch_entries: usize,

    /// fsync the active data file when a batch commits
    pub sync_on_commit: bool,
}

impl Default for WriteBatchOptions {
    fn default() -> Self {
        Self {
            max_batch_entries: 10_000,
            sync_on_commit: true,
        }
    }
}
