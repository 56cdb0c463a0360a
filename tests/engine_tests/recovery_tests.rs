//! Tests for Engine recovery
//!
//! These tests verify:
//! - Recovery from a clean log
//! - Recovery with a torn tail (partial write, flipped bit, zero fill)
//! - Torn records whose value happens to hold valid record bytes
//! - Corruption before valid records is reported, not skipped
//! - Writes after recovery land where the next reopen expects them

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use caskdb::config::Config;
use caskdb::data::{DataFile, LogRecord};
use caskdb::engine::Engine;
use caskdb::CaskError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn open(dir: &Path) -> caskdb::Result<Engine> {
    Engine::open(Config::builder().dir_path(dir).sync_writes(true).build())
}

fn write_keys(dir: &Path, count: usize) {
    let engine = open(dir).unwrap();
    for i in 0..count {
        engine
            .put(format!("key{}", i).as_bytes(), format!("value{}", i).as_bytes())
            .unwrap();
    }
    engine.close().unwrap();
}

fn active_path(dir: &Path) -> std::path::PathBuf {
    DataFile::file_name(dir, 0)
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).unwrap().len()
}

fn set_len(path: &Path, len: u64) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_len(len).unwrap();
}

fn flip_bit(path: &Path, offset: u64) {
    let mut bytes = std::fs::read(path).unwrap();
    bytes[offset as usize] ^= 0x10;
    std::fs::write(path, bytes).unwrap();
}

fn append_raw(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

// =============================================================================
// Clean Log Tests
// =============================================================================

#[test]
fn test_recover_clean_log() {
    let temp = TempDir::new().unwrap();
    write_keys(temp.path(), 10);

    let engine = open(temp.path()).unwrap();

    assert_eq!(engine.len(), 10);
    assert_eq!(engine.get(b"key9").unwrap().as_ref(), b"value9");
}

#[test]
fn test_recover_empty_file() {
    let temp = TempDir::new().unwrap();
    std::fs::File::create(active_path(temp.path())).unwrap();

    let engine = open(temp.path()).unwrap();
    assert!(engine.is_empty());
    assert_eq!(engine.sequence_number(), 0);
}

// =============================================================================
// Torn Tail Tests
// =============================================================================

#[test]
fn test_recover_partial_last_record() {
    let temp = TempDir::new().unwrap();
    write_keys(temp.path(), 3);
    let path = active_path(temp.path());
    let len = file_len(&path);

    // Cut the last record in half
    set_len(&path, len - 4);

    let engine = open(temp.path()).unwrap();
    assert_eq!(engine.len(), 2);
    assert!(matches!(engine.get(b"key2"), Err(CaskError::KeyNotFound)));
    assert_eq!(engine.get(b"key1").unwrap().as_ref(), b"value1");
}

#[test]
fn test_recover_partial_header() {
    let temp = TempDir::new().unwrap();
    write_keys(temp.path(), 2);
    append_raw(&active_path(temp.path()), &[0xAA, 0xBB, 0xCC]);

    let engine = open(temp.path()).unwrap();
    assert_eq!(engine.len(), 2);
}

#[test]
fn test_recover_flipped_bit_in_last_record() {
    let temp = TempDir::new().unwrap();
    write_keys(temp.path(), 3);
    let path = active_path(temp.path());
    let len = file_len(&path);

    flip_bit(&path, len - 1);

    let engine = open(temp.path()).unwrap();
    assert_eq!(engine.len(), 2);
    assert!(matches!(engine.get(b"key2"), Err(CaskError::KeyNotFound)));
}

#[test]
fn test_recover_zero_filled_tail() {
    let temp = TempDir::new().unwrap();
    write_keys(temp.path(), 2);
    append_raw(&active_path(temp.path()), &[0u8; 64]);

    let engine = open(temp.path()).unwrap();
    assert_eq!(engine.len(), 2);
}

#[test]
fn test_torn_tail_is_truncated_before_new_writes() {
    let temp = TempDir::new().unwrap();
    write_keys(temp.path(), 2);
    let path = active_path(temp.path());
    let clean_len = file_len(&path);
    append_raw(&path, &[0xDE, 0xAD, 0xBE, 0xEF, 0x00]);

    {
        let engine = open(temp.path()).unwrap();
        assert_eq!(file_len(&path), clean_len);
        engine.put(b"after", b"crash").unwrap();
        engine.close().unwrap();
    }

    // The new record must be readable on the next recovery
    let engine = open(temp.path()).unwrap();
    assert_eq!(engine.len(), 3);
    assert_eq!(engine.get(b"after").unwrap().as_ref(), b"crash");
}

/// A value that contains a complete encoded record followed by filler
fn value_embedding_record() -> Vec<u8> {
    let mut value = LogRecord::normal(vec![0u8, b'x'], b"y".to_vec())
        .encode()
        .to_vec();
    value.extend_from_slice(&[0xAB; 32]);
    value
}

fn write_small_then_embedding(dir: &Path) {
    let engine = open(dir).unwrap();
    engine.put(b"a", b"1").unwrap();
    engine.put(b"blob", &value_embedding_record()).unwrap();
    engine.close().unwrap();
}

#[test]
fn test_recover_cut_record_whose_value_holds_a_record() {
    let temp = TempDir::new().unwrap();
    write_small_then_embedding(temp.path());
    let path = active_path(temp.path());
    let len = file_len(&path);

    // Cut into the filler after the embedded record
    set_len(&path, len - 8);

    let engine = open(temp.path()).unwrap();
    assert_eq!(engine.len(), 1);
    assert_eq!(engine.get(b"a").unwrap().as_ref(), b"1");
    assert!(matches!(engine.get(b"blob"), Err(CaskError::KeyNotFound)));
    // "a" is 4 + 1 + 1 + 1 + 2 + 1 bytes on disk
    assert_eq!(file_len(&path), 10);
}

#[test]
fn test_recover_bad_checksum_on_record_whose_value_holds_a_record() {
    let temp = TempDir::new().unwrap();
    write_small_then_embedding(temp.path());
    let path = active_path(temp.path());

    // First CRC byte of the "blob" record, which starts right after "a"
    flip_bit(&path, 10);

    let engine = open(temp.path()).unwrap();
    assert_eq!(engine.len(), 1);
    assert!(matches!(engine.get(b"blob"), Err(CaskError::KeyNotFound)));

    engine.put(b"blob", b"rewritten").unwrap();
    engine.close().unwrap();
    drop(engine);

    let engine = open(temp.path()).unwrap();
    assert_eq!(engine.get(b"blob").unwrap().as_ref(), b"rewritten");
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_corruption_before_valid_records_is_an_error() {
    let temp = TempDir::new().unwrap();
    write_keys(temp.path(), 3);
    let path = active_path(temp.path());

    // Last byte of the first record's value; two valid records follow
    let first_record_len = 4 + 1 + 1 + 1 + 5 + 6;
    flip_bit(&path, first_record_len - 1);

    let result = open(temp.path());
    assert!(matches!(result, Err(CaskError::Corrupted(_))));
}

#[test]
fn test_corruption_in_older_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    {
        let engine = Engine::open(
            Config::builder()
                .dir_path(temp.path())
                .data_file_size(64)
                .build(),
        )
        .unwrap();
        for i in 0..10 {
            engine
                .put(format!("key{}", i).as_bytes(), b"0123456789")
                .unwrap();
        }
        assert!(engine.active_file_id() > 0);
        engine.close().unwrap();
    }

    // Damage the tail of the (now older) first file
    let path = DataFile::file_name(temp.path(), 0);
    let len = file_len(&path);
    flip_bit(&path, len - 1);

    let result = Engine::open(
        Config::builder()
            .dir_path(temp.path())
            .data_file_size(64)
            .build(),
    );
    assert!(matches!(result, Err(CaskError::Corrupted(_))));
}
