//! # CaskDB
//!
//! An embeddable key-value store built on the Bitcask design:
//! - Append-only data files with CRC32-checked records
//! - In-memory ordered index of key → record position
//! - Crash recovery by replaying data files, with torn-tail handling
//! - Atomic multi-key write batches
//! - Single-writer/multi-reader concurrency model
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │        Engine  (put / get / delete / iter / batch)          │
//! │              (Single Writer / Multi Reader)                 │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │                              │
//!                ▼                              ▼
//!   ┌─────────────────────────┐      ┌─────────────────────┐
//!   │       Data Files        │      │        Index        │
//!   │ active (append) + older │      │  key → (file, off)  │
//!   └────────────┬────────────┘      └─────────────────────┘
//!                │
//!                ▼
//!         ┌─────────────┐
//!         │  File I/O   │
//!         └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use caskdb::{Config, Engine};
//!
//! let engine = Engine::open(Config::builder().dir_path("/tmp/caskdb").build())?;
//! engine.put(b"name", b"caskdb")?;
//! assert_eq!(engine.get(b"name")?.as_ref(), b"caskdb");
//! engine.delete(b"name")?;
//! # Ok::<(), caskdb::CaskError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod fio;
pub mod data;
pub mod index;
pub mod engine;
pub mod batch;
pub mod iterator;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CaskError, Result};
pub use config::{Config, IndexType, IteratorOptions, SyncStrategy, WriteBatchOptions};
pub use engine::{Engine, EngineStats};
pub use batch::WriteBatch;
pub use iterator::EngineIterator;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of CaskDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
