//! Engine Iterator
//!
//! Walks an index snapshot in key order, skipping keys outside the prefix
//! and reading values from the data files on demand.

use bytes::Bytes;

use crate::config::IteratorOptions;
use crate::engine::Engine;
use crate::error::{CaskError, Result};
use crate::index::IndexIterator;

/// Cursor over the engine's keys as of its creation
pub struct EngineIterator<'a> {
    engine: &'a Engine,
    index_iter: Box<dyn IndexIterator>,
    options: IteratorOptions,
}

impl<'a> EngineIterator<'a> {
    pub(crate) fn new(
        engine: &'a Engine,
        index_iter: Box<dyn IndexIterator>,
        options: IteratorOptions,
    ) -> Self {
        let mut iter = Self {
            engine,
            index_iter,
            options,
        };
        iter.rewind();
        iter
    }

    /// Back to the first matching key
    pub fn rewind(&mut self) {
        self.index_iter.rewind();
        self.skip_to_next();
    }

    /// First matching key >= `key` (<= `key` when reversed)
    pub fn seek(&mut self, key: &[u8]) {
        self.index_iter.seek(key);
        self.skip_to_next();
    }

    /// Advance to the next matching key
    pub fn next(&mut self) {
        self.index_iter.next();
        self.skip_to_next();
    }

    pub fn valid(&self) -> bool {
        self.index_iter.valid()
    }

    /// Key under the cursor, `None` once exhausted
    pub fn key(&self) -> Option<&[u8]> {
        self.index_iter.key()
    }

    /// Read the value under the cursor from its data file
    pub fn value(&self) -> Result<Bytes> {
        let pos = self.index_iter.value().ok_or(CaskError::KeyNotFound)?;
        let files = self.engine.files().read();
        Engine::get_value_by_position(&files, pos)
    }

    /// Release the snapshot
    pub fn close(&mut self) {
        self.index_iter.close();
    }

    /// Adapt into a `std::iter::Iterator` of `(key, value)` starting at the cursor
    pub fn entries(&mut self) -> Entries<'_, 'a> {
        Entries { iter: self }
    }

    fn skip_to_next(&mut self) {
        let prefix = &self.options.prefix;
        if prefix.is_empty() {
            return;
        }

        while let Some(key) = self.index_iter.key() {
            if key.starts_with(prefix) {
                break;
            }
            self.index_iter.next();
        }
    }
}

/// Owned `(key, value)` pairs from an [`EngineIterator`]
pub struct Entries<'i, 'a> {
    iter: &'i mut EngineIterator<'a>,
}

impl Iterator for Entries<'_, '_> {
    type Item = Result<(Bytes, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = Bytes::copy_from_slice(self.iter.key()?);
        let item = self.iter.value().map(|value| (key, value));
        self.iter.next();
        Some(item)
    }
}
