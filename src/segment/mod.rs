//! Segment Module
//!
//! A segment is a bounded slice of the log: one data file plus its offset
//! index and time index, all named after the segment's base offset.
//!
//! ## Directory Layout
//! ```text
//! {dir}/
//!   ├── 00000000000000000000.log        (framed records)
//!   ├── 00000000000000000000.index      (varint local_seq → byte position)
//!   ├── 00000000000000000000.timeindex  (created_at, local_seq)
//!   ├── 00000000000000001337.log
//!   └── ...
//! ```
//!
//! ## Offsets
//! The n-th record (0-based) of a segment has local seq `n` and global
//! offset `base_offset + n`.

mod offset_index;
mod recovery;
mod time_index;

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::{Config, SyncStrategy};
use crate::error::{LogError, Result};
use crate::record;

pub use offset_index::OffsetIndex;
pub use recovery::RecoveryResult;
pub use time_index::{to_unix_secs, unix_now, TimeBoundary, TimeIndex};

// =============================================================================
// File Naming
// =============================================================================

/// Extension of segment data files
pub const LOG_EXT: &str = "log";

/// Extension of offset index files
pub const INDEX_EXT: &str = "index";

/// Extension of time index files
pub const TIME_INDEX_EXT: &str = "timeindex";

/// Width of the zero-padded base offset in file names
const BASE_OFFSET_DIGITS: usize = 20;

/// Path of a segment file: base offset zero-padded to 20 digits
/// `(dir, 42, "log")` → `{dir}/00000000000000000042.log`
pub fn segment_path(dir: &Path, base_offset: u64, ext: &str) -> PathBuf {
    dir.join(format!("{:020}.{}", base_offset, ext))
}

/// Parse a base offset from a data file name
/// `"00000000000000000042.log"` → `Some(Ok(42))`, other extensions → `None`
///
/// The stem must be exactly the 20 digits `segment_path` produces; anything
/// else (`42.log`, `+42.log`) is an `InvalidSegmentName`.
pub fn parse_base_offset(path: &Path) -> Option<Result<u64>> {
    if path.extension()? != LOG_EXT {
        return None;
    }

    let invalid = || LogError::InvalidSegmentName(path.display().to_string());
    let stem = path.file_stem()?.to_string_lossy();
    if stem.len() != BASE_OFFSET_DIGITS || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return Some(Err(invalid()));
    }

    Some(stem.parse().map_err(|_| invalid()))
}

// =============================================================================
// Segment
// =============================================================================

/// One data file and its two indexes
#[derive(Debug)]
pub struct Segment {
    /// Path to the `.log` data file
    path: PathBuf,
    /// Data file handle, opened read + append
    file: File,
    offset_index: OffsetIndex,
    time_index: TimeIndex,

    /// Global offset of the first record (also the file name stem)
    base_offset: u64,
    /// Records written into this segment so far
    count: u64,
    /// Data file length, i.e. where the next frame starts
    position: u64,

    max_segment_size: u64,
    sync_strategy: SyncStrategy,
    /// Appends since the last fsync (for `EveryNEntries`)
    unsynced: usize,

    is_loaded: bool,
    /// Sticky: a full segment never accepts records again
    is_full: bool,
}

impl Segment {
    /// Open or create the three files of the segment at `base_offset`
    ///
    /// Nothing is read until `load()`.
    pub fn open(dir: &Path, base_offset: u64, config: &Config) -> Result<Self> {
        let path = segment_path(dir, base_offset, LOG_EXT);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let offset_index = OffsetIndex::open(dir, base_offset)?;
        let time_index = TimeIndex::open(dir, base_offset)?;

        Ok(Self {
            path,
            file,
            offset_index,
            time_index,
            base_offset,
            count: 0,
            position: 0,
            max_segment_size: config.max_segment_size,
            sync_strategy: config.sync_strategy,
            unsynced: 0,
            is_loaded: false,
            is_full: false,
        })
    }

    /// Load both indexes and recover `count`/`position`
    ///
    /// If the data file and the indexes disagree, the segment is repaired
    /// with `recover()` before returning.
    pub fn load(&mut self) -> Result<()> {
        self.offset_index.load()?;
        self.time_index.load()?;
        self.count = self.offset_index.count()? as u64;
        self.position = self.file.metadata()?.len();
        self.is_loaded = true;

        if !self.is_consistent()? {
            tracing::warn!(
                base_offset = self.base_offset,
                indexed = self.count,
                data_bytes = self.position,
                "segment files are inconsistent, recovering"
            );
            let result = self.recover()?;
            tracing::info!(base_offset = self.base_offset, ?result, "segment recovered");
        }

        tracing::debug!(
            base_offset = self.base_offset,
            count = self.count,
            position = self.position,
            "segment loaded"
        );
        Ok(())
    }

    /// Load the segment unless it already is
    pub fn ensure_loaded(&mut self) -> Result<()> {
        if !self.is_loaded {
            self.load()?;
        }
        Ok(())
    }

    /// Whether the data file and both indexes describe the same records
    ///
    /// Holds when local seqs `0..count` are all indexed at strictly
    /// increasing positions starting at 0, the last indexed frame ends
    /// exactly at the end of the data file, and the time index has one
    /// entry per record.
    pub fn is_consistent(&mut self) -> Result<bool> {
        self.offset_index.ensure_loaded()?;

        if self.time_index.len()? as u64 != self.count {
            return Ok(false);
        }

        let mut last = None;
        for seq in 0..self.count {
            let Some(pos) = self.offset_index.lookup(seq) else {
                return Ok(false);
            };
            let in_order = match last {
                None => pos == 0,
                Some(prev) => pos > prev,
            };
            if !in_order {
                return Ok(false);
            }
            last = Some(pos);
        }

        let Some(last_pos) = last else {
            return Ok(self.position == 0);
        };

        if last_pos + record::HEADER_SIZE as u64 > self.position {
            return Ok(false);
        }

        let mut header = [0u8; record::HEADER_SIZE];
        self.file.seek(SeekFrom::Start(last_pos))?;
        self.file.read_exact(&mut header)?;
        let frame_end = match record::read_len(&header) {
            Some(len) => last_pos + record::frame_len(len) as u64,
            None => return Ok(false),
        };

        Ok(frame_end == self.position)
    }

    /// Whether appending `payload` would overflow this segment
    ///
    /// Sticky once true. An empty segment is never full, so a single record
    /// larger than `max_segment_size` still gets a home.
    pub fn check_full(&mut self, payload: &[u8]) -> Result<bool> {
        if self.is_full {
            return Ok(true);
        }

        self.ensure_loaded()?;

        if self.count == 0 {
            return Ok(false);
        }

        let needed = record::frame_len(payload.len()) as u64;
        if self.position + needed > self.max_segment_size {
            self.is_full = true;
        }

        Ok(self.is_full)
    }

    /// Append a record stamped with the current wall-clock time
    pub fn write(&mut self, payload: &[u8]) -> Result<()> {
        self.write_at(payload, unix_now())
    }

    /// Append a record with an explicit creation time (Unix seconds)
    ///
    /// If the data file or either index fails mid-append the segment is
    /// marked unloaded, so the next access reloads it and runs recovery.
    pub fn write_at(&mut self, payload: &[u8], created_at: u32) -> Result<()> {
        let frame = record::encode(payload)?;
        self.ensure_loaded()?;

        let seq = self.count;
        let start = self.position;

        let appended = self
            .file
            .write_all(&frame)
            .map_err(LogError::from)
            .and_then(|_| self.offset_index.write(seq, start))
            .and_then(|_| self.time_index.write(created_at, seq));

        if let Err(e) = appended {
            self.is_loaded = false;
            return Err(e);
        }

        self.count += 1;
        self.position += frame.len() as u64;

        match self.sync_strategy {
            SyncStrategy::OnClose => {}
            SyncStrategy::EveryWrite => self.sync()?,
            SyncStrategy::EveryNEntries { count } => {
                self.unsynced += 1;
                if self.unsynced >= count {
                    self.sync()?;
                }
            }
        }

        Ok(())
    }

    /// Read the record at global `offset`
    ///
    /// The frame spans from its own index entry to the next one, or to the
    /// write cursor for the newest record.
    pub fn read(&mut self, offset: u64) -> Result<Vec<u8>> {
        let local_seq = offset
            .checked_sub(self.base_offset)
            .ok_or(LogError::RecordNotFound { offset })?;

        self.ensure_loaded()?;
        self.offset_index.ensure_loaded()?;

        let start = self
            .offset_index
            .lookup(local_seq)
            .ok_or(LogError::RecordNotFound { offset })?;
        let end = self
            .offset_index
            .lookup(local_seq + 1)
            .unwrap_or(self.position);

        if end < start {
            return Err(LogError::CorruptRecord(format!(
                "offset {} spans backwards ({}..{})",
                offset, start, end
            )));
        }

        let mut frame = vec![0u8; (end - start) as usize];
        self.file.seek(SeekFrom::Start(start))?;
        self.file.read_exact(&mut frame)?;

        record::decode(&frame)?;
        Ok(frame.split_off(record::HEADER_SIZE))
    }

    /// Classify this segment against a retention cutoff (Unix seconds)
    pub fn last_offset_before_time(&mut self, cutoff: u32) -> Result<TimeBoundary> {
        self.ensure_loaded()?;
        self.time_index.last_offset_before_time(cutoff)
    }

    /// Global offset the next `write` will receive
    pub fn next_offset(&self) -> u64 {
        self.base_offset + self.count
    }

    /// Drop both in-memory index tables; they reload on demand
    pub fn evict_cache(&mut self) {
        self.offset_index.evict();
        self.time_index.clear_cache();
        tracing::trace!(base_offset = self.base_offset, "segment index cache evicted");
    }

    /// fsync the data file and both indexes
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        self.offset_index.sync()?;
        self.time_index.sync()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Make everything durable; the segment stays readable afterwards
    pub fn close(&mut self) -> Result<()> {
        self.sync()
    }

    /// Total bytes of the three backing files
    pub fn disk_usage(&self) -> u64 {
        [
            self.path.as_path(),
            self.offset_index.path(),
            self.time_index.path(),
        ]
        .iter()
        .filter_map(|p| p.metadata().ok())
        .map(|m| m.len())
        .sum()
    }

    /// Close and delete all three backing files
    ///
    /// The data file goes first: leftover index files are never rediscovered
    /// on open, a leftover `.log` would be.
    pub fn remove(self) -> Result<()> {
        let Segment {
            path,
            file,
            offset_index,
            time_index,
            ..
        } = self;

        drop(file);
        std::fs::remove_file(path)?;
        offset_index.remove()?;
        time_index.remove()?;

        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub fn is_full(&self) -> bool {
        self.is_full
    }

    /// Whether the offset index table is resident
    pub fn is_index_cached(&self) -> bool {
        self.offset_index.is_loaded()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub(crate) fn fail_time_index_reads(&mut self) -> Result<()> {
        self.time_index.fail_reads()
    }
}
