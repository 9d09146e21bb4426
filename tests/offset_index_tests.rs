//! Tests for OffsetIndex
//!
//! These tests verify:
//! - Write + lookup through the in-memory table
//! - Reload after close/reopen yields the same table
//! - Eviction and on-demand reload
//! - Tolerance of a torn trailing entry

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use commitlog::segment::{segment_path, OffsetIndex, INDEX_EXT};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();
    (temp_dir, path)
}

fn open_loaded(dir: &PathBuf, base_offset: u64) -> OffsetIndex {
    let mut index = OffsetIndex::open(dir, base_offset).unwrap();
    index.load().unwrap();
    index
}

// =============================================================================
// Write / Lookup Tests
// =============================================================================

#[test]
fn test_open_creates_file() {
    let (_temp, dir) = setup_temp_dir();

    let index = OffsetIndex::open(&dir, 7).unwrap();

    assert_eq!(index.path(), segment_path(&dir, 7, INDEX_EXT));
    assert!(index.path().exists());
    assert!(!index.is_loaded());
}

#[test]
fn test_write_and_lookup() {
    let (_temp, dir) = setup_temp_dir();
    let mut index = open_loaded(&dir, 0);

    index.write(0, 0).unwrap();
    index.write(1, 14).unwrap();
    index.write(2, 28).unwrap();

    assert_eq!(index.lookup(0), Some(0));
    assert_eq!(index.lookup(1), Some(14));
    assert_eq!(index.lookup(2), Some(28));
    assert_eq!(index.lookup(3), None);
    assert_eq!(index.count().unwrap(), 3);
}

#[test]
fn test_load_sees_unsynced_writes() {
    let (_temp, dir) = setup_temp_dir();
    let mut index = open_loaded(&dir, 0);

    index.write(0, 0).unwrap();
    index.write(1, 5).unwrap();
    index.load().unwrap();

    assert_eq!(index.lookup(1), Some(5));
    assert_eq!(index.count().unwrap(), 2);
}

#[test]
fn test_count_loads_fresh_index() {
    let (_temp, dir) = setup_temp_dir();
    {
        let mut index = open_loaded(&dir, 0);
        index.write(0, 0).unwrap();
        index.sync().unwrap();
    }

    let mut index = OffsetIndex::open(&dir, 0).unwrap();
    assert!(!index.is_loaded());

    assert_eq!(index.count().unwrap(), 1);
    assert!(index.is_loaded());
}

// =============================================================================
// Reload Tests
// =============================================================================

#[test]
fn test_reopen_yields_identical_table() {
    let (_temp, dir) = setup_temp_dir();

    let before: Vec<Option<u64>> = {
        let mut index = open_loaded(&dir, 1);
        index.write(0, 0).unwrap();
        index.write(1, 1).unwrap();
        index.write(2, 2).unwrap();
        index.sync().unwrap();
        let table: Vec<Option<u64>> = (0..4).map(|seq| index.lookup(seq)).collect();
        index.close().unwrap();
        table
    };

    let index = open_loaded(&dir, 1);
    let after: Vec<Option<u64>> = (0..4).map(|seq| index.lookup(seq)).collect();

    assert_eq!(before, after);
    assert_eq!(after, vec![Some(0), Some(1), Some(2), None]);
}

#[test]
fn test_large_positions_survive_reload() {
    let (_temp, dir) = setup_temp_dir();
    {
        let mut index = open_loaded(&dir, 0);
        index.write(0, 0).unwrap();
        index.write(1, 1 << 40).unwrap();
        index.sync().unwrap();
    }

    let index = open_loaded(&dir, 0);

    assert_eq!(index.lookup(1), Some(1 << 40));
}

// =============================================================================
// Eviction Tests
// =============================================================================

#[test]
fn test_evict_clears_table_until_reload() {
    let (_temp, dir) = setup_temp_dir();
    let mut index = open_loaded(&dir, 0);
    index.write(0, 0).unwrap();
    index.write(1, 9).unwrap();

    index.evict();

    assert!(!index.is_loaded());
    assert_eq!(index.lookup(0), None);

    index.ensure_loaded().unwrap();

    assert_eq!(index.lookup(0), Some(0));
    assert_eq!(index.lookup(1), Some(9));
}

#[test]
fn test_write_while_evicted_is_seen_after_reload() {
    let (_temp, dir) = setup_temp_dir();
    let mut index = open_loaded(&dir, 0);
    index.write(0, 0).unwrap();
    index.evict();

    index.write(1, 3).unwrap();
    index.ensure_loaded().unwrap();

    assert_eq!(index.lookup(1), Some(3));
}

// =============================================================================
// Torn Tail Tests
// =============================================================================

#[test]
fn test_torn_trailing_entry_is_ignored() {
    let (_temp, dir) = setup_temp_dir();
    {
        let mut index = open_loaded(&dir, 0);
        index.write(0, 0).unwrap();
        index.write(1, 300).unwrap();
        index.sync().unwrap();
    }

    // Half of a varint: continuation bit set, no following byte
    let mut file = OpenOptions::new()
        .append(true)
        .open(segment_path(&dir, 0, INDEX_EXT))
        .unwrap();
    file.write_all(&[0x02, 0xAC]).unwrap();
    file.sync_all().unwrap();

    let mut index = open_loaded(&dir, 0);

    assert_eq!(index.count().unwrap(), 2);
    assert_eq!(index.lookup(1), Some(300));
}

#[test]
fn test_remove_deletes_file() {
    let (_temp, dir) = setup_temp_dir();
    let index = open_loaded(&dir, 0);
    let path = index.path().to_path_buf();

    index.remove().unwrap();

    assert!(!path.exists());
}
