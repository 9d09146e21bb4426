//! Tests for TimeIndex
//!
//! These tests verify:
//! - Retention classification (None / All / Before)
//! - Persistence across reopen
//! - Cache clearing and reload

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use commitlog::segment::{segment_path, TimeBoundary, TimeIndex, TIME_INDEX_EXT};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const BASE_TIME: u32 = 1_700_000_000;

fn setup_temp_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();
    (temp_dir, path)
}

/// Three records, one, two and three minutes after BASE_TIME
fn write_three_minutes(dir: &PathBuf) -> TimeIndex {
    let mut index = TimeIndex::open(dir, 0).unwrap();
    index.write(BASE_TIME + 60, 0).unwrap();
    index.write(BASE_TIME + 120, 1).unwrap();
    index.write(BASE_TIME + 180, 2).unwrap();
    index.sync().unwrap();
    index.load().unwrap();
    index
}

// =============================================================================
// Classification Tests
// =============================================================================

#[test]
fn test_cutoff_after_newest_is_all() {
    let (_temp, dir) = setup_temp_dir();
    let mut index = write_three_minutes(&dir);

    let boundary = index.last_offset_before_time(BASE_TIME + 240).unwrap();

    assert_eq!(boundary, TimeBoundary::All);
}

#[test]
fn test_cutoff_equal_to_newest_is_all() {
    let (_temp, dir) = setup_temp_dir();
    let mut index = write_three_minutes(&dir);

    let boundary = index.last_offset_before_time(BASE_TIME + 180).unwrap();

    assert_eq!(boundary, TimeBoundary::All);
}

#[test]
fn test_cutoff_before_oldest_is_none() {
    let (_temp, dir) = setup_temp_dir();
    let mut index = write_three_minutes(&dir);

    let boundary = index.last_offset_before_time(BASE_TIME).unwrap();

    assert_eq!(boundary, TimeBoundary::None);
}

#[test]
fn test_cutoff_in_the_middle_is_boundary() {
    let (_temp, dir) = setup_temp_dir();
    let mut index = write_three_minutes(&dir);

    assert_eq!(
        index.last_offset_before_time(BASE_TIME + 90).unwrap(),
        TimeBoundary::Before(0)
    );
    assert_eq!(
        index.last_offset_before_time(BASE_TIME + 150).unwrap(),
        TimeBoundary::Before(1)
    );
}

#[test]
fn test_empty_index_is_all() {
    let (_temp, dir) = setup_temp_dir();
    let mut index = TimeIndex::open(&dir, 0).unwrap();

    assert!(index.is_empty().unwrap());
    assert_eq!(index.last_offset_before_time(0).unwrap(), TimeBoundary::All);
}

#[test]
fn test_writes_after_load_are_visible() {
    let (_temp, dir) = setup_temp_dir();
    let mut index = write_three_minutes(&dir);

    index.write(BASE_TIME + 600, 3).unwrap();

    assert_eq!(index.len().unwrap(), 4);
    assert_eq!(
        index.last_offset_before_time(BASE_TIME + 300).unwrap(),
        TimeBoundary::Before(2)
    );
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_reopen_preserves_entries() {
    let (_temp, dir) = setup_temp_dir();
    {
        let index = write_three_minutes(&dir);
        index.close().unwrap();
    }

    let mut index = TimeIndex::open(&dir, 0).unwrap();

    assert_eq!(
        index.entries().unwrap(),
        vec![(BASE_TIME + 60, 0), (BASE_TIME + 120, 1), (BASE_TIME + 180, 2)]
    );
}

#[test]
fn test_file_uses_fixed_width_entries() {
    let (_temp, dir) = setup_temp_dir();
    let index = write_three_minutes(&dir);

    let len = std::fs::metadata(index.path()).unwrap().len();

    assert_eq!(len, 3 * 12);
}

#[test]
fn test_partial_trailing_entry_is_ignored() {
    let (_temp, dir) = setup_temp_dir();
    {
        write_three_minutes(&dir);
    }

    let mut file = OpenOptions::new()
        .append(true)
        .open(segment_path(&dir, 0, TIME_INDEX_EXT))
        .unwrap();
    file.write_all(&[1, 2, 3, 4, 5]).unwrap();
    file.sync_all().unwrap();

    let mut index = TimeIndex::open(&dir, 0).unwrap();

    assert_eq!(index.len().unwrap(), 3);
}

#[test]
fn test_clear_cache_then_query_reloads() {
    let (_temp, dir) = setup_temp_dir();
    let mut index = write_three_minutes(&dir);

    index.clear_cache();
    assert!(!index.is_loaded());

    let boundary = index.last_offset_before_time(BASE_TIME + 90).unwrap();

    assert_eq!(boundary, TimeBoundary::Before(0));
    assert!(index.is_loaded());
}

#[test]
fn test_remove_deletes_file() {
    let (_temp, dir) = setup_temp_dir();
    let index = write_three_minutes(&dir);
    let path = index.path().to_path_buf();

    index.remove().unwrap();

    assert!(!path.exists());
}
