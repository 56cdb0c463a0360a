//! BTreeMap index
//!
//! `BTreeMap` wrapped in a `parking_lot::RwLock`. Ordered by `Vec<u8>`'s
//! `Ord`, which is byte-lexicographic.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::data::LogRecordPos;

use super::{IndexIterator, Indexer};

/// Default ordered index
#[derive(Debug, Default)]
pub struct BTree {
    tree: RwLock<BTreeMap<Vec<u8>, LogRecordPos>>,
}

impl BTree {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Indexer for BTree {
    fn put(&self, key: Vec<u8>, pos: LogRecordPos) -> bool {
        self.tree.write().insert(key, pos);
        true
    }

    fn get(&self, key: &[u8]) -> Option<LogRecordPos> {
        self.tree.read().get(key).copied()
    }

    fn delete(&self, key: &[u8]) -> bool {
        self.tree.write().remove(key);
        true
    }

    fn size(&self) -> usize {
        self.tree.read().len()
    }

    fn iterator(&self, reverse: bool) -> Box<dyn IndexIterator> {
        let tree = self.tree.read();
        let mut items: Vec<(Vec<u8>, LogRecordPos)> =
            tree.iter().map(|(k, v)| (k.clone(), *v)).collect();
        if reverse {
            items.reverse();
        }

        Box::new(BTreeIterator {
            items,
            curr_index: 0,
            reverse,
        })
    }

    fn list_keys(&self) -> Vec<Vec<u8>> {
        self.tree.read().keys().cloned().collect()
    }
}

/// Iterator over a copy of the tree taken at creation time
pub struct BTreeIterator {
    /// Entries in iteration order (descending when `reverse`)
    items: Vec<(Vec<u8>, LogRecordPos)>,
    curr_index: usize,
    reverse: bool,
}

impl IndexIterator for BTreeIterator {
    fn rewind(&mut self) {
        self.curr_index = 0;
    }

    fn seek(&mut self, key: &[u8]) {
        // `items` is sorted in iteration order, so a partition point works both ways
        self.curr_index = if self.reverse {
            self.items.partition_point(|(k, _)| k.as_slice() > key)
        } else {
            self.items.partition_point(|(k, _)| k.as_slice() < key)
        };
    }

    fn next(&mut self) {
        if self.curr_index < self.items.len() {
            self.curr_index += 1;
        }
    }

    fn valid(&self) -> bool {
        self.curr_index < self.items.len()
    }

    fn key(&self) -> Option<&[u8]> {
        self.items.get(self.curr_index).map(|(k, _)| k.as_slice())
    }

    fn value(&self) -> Option<LogRecordPos> {
        self.items.get(self.curr_index).map(|(_, pos)| *pos)
    }

    fn close(&mut self) {
        self.items.clear();
        self.curr_index = 0;
    }
}
