//! Tests for the BTree index
//!
//! These tests verify:
//! - Point put/get/delete and size
//! - Forward and reverse iteration order
//! - Seek semantics in both directions
//! - Snapshot isolation of iterators

use std::sync::Arc;
use std::thread;

use caskdb::data::LogRecordPos;
use caskdb::index::{new_indexer, BTree, Indexer};
use caskdb::IndexType;

// =============================================================================
// Helper Functions
// =============================================================================

fn pos(file_id: u32, offset: u64) -> LogRecordPos {
    LogRecordPos { file_id, offset }
}

fn collect_keys(index: &dyn Indexer, reverse: bool) -> Vec<Vec<u8>> {
    let mut iter = index.iterator(reverse);
    let mut keys = Vec::new();
    iter.rewind();
    while iter.valid() {
        keys.push(iter.key().unwrap().to_vec());
        iter.next();
    }
    keys
}

fn populated() -> BTree {
    let index = BTree::new();
    for (i, key) in ["ccde", "aabc", "bbcd", "eeee", "dddd"].iter().enumerate() {
        assert!(index.put(key.as_bytes().to_vec(), pos(0, i as u64 * 10)));
    }
    index
}

// =============================================================================
// Point Operation Tests
// =============================================================================

#[test]
fn test_put_get() {
    let index = BTree::new();

    assert!(index.put(b"key".to_vec(), pos(1, 10)));

    assert_eq!(index.get(b"key"), Some(pos(1, 10)));
    assert_eq!(index.get(b"missing"), None);
}

#[test]
fn test_put_overwrites() {
    let index = BTree::new();

    index.put(b"key".to_vec(), pos(1, 10));
    index.put(b"key".to_vec(), pos(2, 20));

    assert_eq!(index.get(b"key"), Some(pos(2, 20)));
    assert_eq!(index.size(), 1);
}

#[test]
fn test_delete() {
    let index = BTree::new();
    index.put(b"key".to_vec(), pos(1, 10));

    assert!(index.delete(b"key"));
    assert_eq!(index.get(b"key"), None);
    assert_eq!(index.size(), 0);

    // Absent key still succeeds
    assert!(index.delete(b"key"));
}

#[test]
fn test_factory_builds_btree() {
    let index = new_indexer(IndexType::BTree);
    index.put(b"a".to_vec(), pos(0, 0));
    assert_eq!(index.size(), 1);
}

#[test]
fn test_list_keys_sorted() {
    let index = populated();
    let keys = index.list_keys();
    assert_eq!(
        keys,
        vec![
            b"aabc".to_vec(),
            b"bbcd".to_vec(),
            b"ccde".to_vec(),
            b"dddd".to_vec(),
            b"eeee".to_vec()
        ]
    );
}

// =============================================================================
// Iterator Tests
// =============================================================================

#[test]
fn test_iterator_empty() {
    let index = BTree::new();
    let iter = index.iterator(false);

    assert!(!iter.valid());
    assert_eq!(iter.key(), None);
    assert_eq!(iter.value(), None);
}

#[test]
fn test_iterator_forward_and_reverse_are_mirrors() {
    let index = populated();

    let forward = collect_keys(&index, false);
    let mut reverse = collect_keys(&index, true);
    reverse.reverse();

    assert_eq!(forward, index.list_keys());
    assert_eq!(forward, reverse);
}

#[test]
fn test_iterator_values() {
    let index = BTree::new();
    index.put(b"a".to_vec(), pos(3, 30));

    let iter = index.iterator(false);
    assert_eq!(iter.key(), Some(&b"a"[..]));
    assert_eq!(iter.value(), Some(pos(3, 30)));
}

#[test]
fn test_seek_forward() {
    let index = populated();
    let mut iter = index.iterator(false);

    iter.seek(b"cc");
    assert_eq!(iter.key(), Some(&b"ccde"[..]));

    iter.seek(b"dddd");
    assert_eq!(iter.key(), Some(&b"dddd"[..]));

    iter.seek(b"zz");
    assert!(!iter.valid());
}

#[test]
fn test_seek_reverse() {
    let index = populated();
    let mut iter = index.iterator(true);

    iter.seek(b"cc");
    assert_eq!(iter.key(), Some(&b"bbcd"[..]));

    iter.seek(b"dddd");
    assert_eq!(iter.key(), Some(&b"dddd"[..]));

    iter.seek(b"a");
    assert!(!iter.valid());
}

#[test]
fn test_next_past_end_stays_invalid() {
    let index = BTree::new();
    index.put(b"only".to_vec(), pos(0, 0));

    let mut iter = index.iterator(false);
    iter.next();
    assert!(!iter.valid());
    iter.next();
    assert!(!iter.valid());

    iter.rewind();
    assert!(iter.valid());
}

#[test]
fn test_iterator_is_a_snapshot() {
    let index = populated();
    let mut iter = index.iterator(false);

    index.put(b"0000".to_vec(), pos(9, 9));
    index.delete(b"eeee");

    iter.rewind();
    assert_eq!(iter.key(), Some(&b"aabc"[..]));

    let mut count = 0;
    while iter.valid() {
        count += 1;
        iter.next();
    }
    assert_eq!(count, 5);
}

#[test]
fn test_close_releases_snapshot() {
    let index = populated();
    let mut iter = index.iterator(false);

    iter.close();
    assert!(!iter.valid());
}

// =============================================================================
// Concurrent Access Tests (Basic)
// =============================================================================

#[test]
fn test_concurrent_puts() {
    let index = Arc::new(BTree::new());

    let mut handles = vec![];
    for i in 0..8u32 {
        let idx = Arc::clone(&index);
        handles.push(thread::spawn(move || {
            for j in 0..100u64 {
                let key = format!("key{}_{}", i, j).into_bytes();
                assert!(idx.put(key, pos(i, j)));
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(index.size(), 800);
}
