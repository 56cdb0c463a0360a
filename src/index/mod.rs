//! Index Module
//!
//! In-memory map from each live key to the position of its latest record.
//!
//! ## Responsibilities
//! - Point lookup / insert / delete by key
//! - Ordered (byte-lexicographic) iteration in both directions
//! - Snapshot iterators unaffected by later writes
//!
//! ## Concurrency
//! Implementations are `Send + Sync` and guard their own memory. The engine
//! decides what is atomic: it holds its write gate across a whole batch of
//! index updates, and its read gate while taking an iterator snapshot.

mod btree;

pub use btree::BTree;

use crate::config::IndexType;
use crate::data::LogRecordPos;

/// Key → position map
pub trait Indexer: Send + Sync {
    /// Insert or replace the position for `key`. False only on internal failure.
    fn put(&self, key: Vec<u8>, pos: LogRecordPos) -> bool;

    /// Position of `key`, if present
    fn get(&self, key: &[u8]) -> Option<LogRecordPos>;

    /// Remove `key`. Removing an absent key succeeds. False only on internal failure.
    fn delete(&self, key: &[u8]) -> bool;

    /// Number of keys
    fn size(&self) -> usize;

    /// Snapshot iterator over the current contents
    fn iterator(&self, reverse: bool) -> Box<dyn IndexIterator>;

    /// All keys in ascending order
    fn list_keys(&self) -> Vec<Vec<u8>>;
}

/// Cursor over an index snapshot
pub trait IndexIterator: Send + Sync {
    /// Go back to the first entry (the largest key when reversed)
    fn rewind(&mut self);

    /// Position at the first key >= `key` (<= `key` when reversed)
    fn seek(&mut self, key: &[u8]);

    /// Advance one entry
    fn next(&mut self);

    /// Whether the cursor is on an entry
    fn valid(&self) -> bool;

    /// Key under the cursor
    fn key(&self) -> Option<&[u8]>;

    /// Position under the cursor
    fn value(&self) -> Option<LogRecordPos>;

    /// Release the snapshot
    fn close(&mut self);
}

/// Build the index implementation selected by `index_type`
pub fn new_indexer(index_type: IndexType) -> Box<dyn Indexer> {
    match index_type {
        IndexType::BTree => Box::new(BTree::new()),
    }
}
