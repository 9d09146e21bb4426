//! Time Index
//!
//! Durable, append-only mapping from record creation time to segment-local
//! sequence number. Only consulted by retention.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────┬───────────────────────┐
//! │ CreatedAt: u32 LE (4)    │ LocalSeq: u64 LE (8)  │
//! └──────────────────────────┴───────────────────────┘
//! ... repeated once per record, in write order ...
//! ```
//!
//! Entries are monotonic in local seq. They are monotonic in time only as
//! long as the wall clock never steps backwards.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::Result;

use super::{segment_path, TIME_INDEX_EXT};

/// Size of one on-disk entry: CreatedAt (4) + LocalSeq (8)
pub const ENTRY_SIZE: usize = 12;

/// Where a retention cutoff falls within one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBoundary {
    /// No record is older than the cutoff
    None,
    /// Every record is older than (or exactly at) the cutoff
    All,
    /// Records up to and including this local seq are older than the cutoff
    Before(u64),
}

#[derive(Debug)]
enum TimeCache {
    Unloaded,
    Loaded {
        created_ats: Vec<u32>,
        local_seqs: Vec<u64>,
    },
}

/// Time index for one segment
#[derive(Debug)]
pub struct TimeIndex {
    path: PathBuf,
    file: File,
    writer: BufWriter<File>,
    cache: TimeCache,
}

impl TimeIndex {
    /// Open or create the time index file for the segment at `base_offset`
    pub fn open(dir: &Path, base_offset: u64) -> Result<Self> {
        let path = segment_path(dir, base_offset, TIME_INDEX_EXT);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        let writer = BufWriter::new(file.try_clone()?);

        Ok(Self {
            path,
            file,
            writer,
            cache: TimeCache::Unloaded,
        })
    }

    /// Append an entry; `created_at` is seconds since the Unix epoch
    pub fn write(&mut self, created_at: u32, local_seq: u64) -> Result<()> {
        let mut buf = BytesMut::with_capacity(ENTRY_SIZE);
        buf.put_u32_le(created_at);
        buf.put_u64_le(local_seq);
        self.writer.write_all(&buf)?;

        if let TimeCache::Loaded {
            created_ats,
            local_seqs,
        } = &mut self.cache
        {
            created_ats.push(created_at);
            local_seqs.push(local_seq);
        }

        Ok(())
    }

    /// Replace the in-memory arrays with the full contents of the file
    ///
    /// A partial trailing entry is ignored.
    pub fn load(&mut self) -> Result<()> {
        self.writer.flush()?;

        let mut data = Vec::new();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_to_end(&mut data)?;

        let entries = data.len() / ENTRY_SIZE;
        if data.len() % ENTRY_SIZE != 0 {
            tracing::debug!(
                path = %self.path.display(),
                entries,
                "time index ends with a torn entry"
            );
        }

        let mut created_ats = Vec::with_capacity(entries);
        let mut local_seqs = Vec::with_capacity(entries);
        let mut cursor = &data[..entries * ENTRY_SIZE];
        while cursor.has_remaining() {
            created_ats.push(cursor.get_u32_le());
            local_seqs.push(cursor.get_u64_le());
        }

        self.cache = TimeCache::Loaded {
            created_ats,
            local_seqs,
        };
        Ok(())
    }

    pub fn ensure_loaded(&mut self) -> Result<()> {
        if !self.is_loaded() {
            self.load()?;
        }
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.cache, TimeCache::Loaded { .. })
    }

    /// Number of entries (loads the arrays if needed)
    pub fn len(&mut self) -> Result<usize> {
        self.ensure_loaded()?;
        Ok(match &self.cache {
            TimeCache::Loaded { local_seqs, .. } => local_seqs.len(),
            TimeCache::Unloaded => 0,
        })
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// All entries as `(created_at, local_seq)` pairs, in write order
    pub fn entries(&mut self) -> Result<Vec<(u32, u64)>> {
        self.ensure_loaded()?;
        Ok(match &self.cache {
            TimeCache::Loaded {
                created_ats,
                local_seqs,
            } => created_ats
                .iter()
                .copied()
                .zip(local_seqs.iter().copied())
                .collect(),
            TimeCache::Unloaded => Vec::new(),
        })
    }

    /// Classify this segment against a retention cutoff (Unix seconds)
    ///
    /// Scans in write order for the first record created after `cutoff`.
    pub fn last_offset_before_time(&mut self, cutoff: u32) -> Result<TimeBoundary> {
        self.ensure_loaded()?;

        let TimeCache::Loaded {
            created_ats,
            local_seqs,
        } = &self.cache
        else {
            return Ok(TimeBoundary::None);
        };

        Ok(match created_ats.iter().position(|&ts| ts > cutoff) {
            None => TimeBoundary::All,
            Some(0) => TimeBoundary::None,
            Some(i) => TimeBoundary::Before(local_seqs[i - 1]),
        })
    }

    /// Replace the whole file with `entries` and fsync it
    pub(crate) fn rewrite(&mut self, entries: &[(u32, u64)]) -> Result<()> {
        self.writer.flush()?;
        self.file.set_len(0)?;

        let mut buf = BytesMut::with_capacity(entries.len() * ENTRY_SIZE);
        for &(created_at, seq) in entries {
            buf.put_u32_le(created_at);
            buf.put_u64_le(seq);
        }

        self.writer.write_all(&buf)?;
        self.sync()?;
        self.cache = TimeCache::Loaded {
            created_ats: entries.iter().map(|&(ts, _)| ts).collect(),
            local_seqs: entries.iter().map(|&(_, seq)| seq).collect(),
        };

        Ok(())
    }

    /// Drop the in-memory arrays without touching the file
    pub fn clear_cache(&mut self) {
        self.cache = TimeCache::Unloaded;
    }

    /// Flush buffered entries and fsync the file
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Close and delete the backing file
    pub fn remove(self) -> Result<()> {
        let path = self.path.clone();
        self.close()?;
        fs::remove_file(path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Swap in a write-only handle so the next `load()` fails
    #[cfg(test)]
    pub(crate) fn fail_reads(&mut self) -> Result<()> {
        self.file = OpenOptions::new().append(true).open(&self.path)?;
        self.cache = TimeCache::Unloaded;
        Ok(())
    }
}

/// Current wall-clock time in Unix seconds
pub fn unix_now() -> u32 {
    to_unix_secs(SystemTime::now())
}

/// Convert to the u32 seconds stored on disk, saturating at both ends
pub fn to_unix_secs(time: SystemTime) -> u32 {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    u32::try_from(secs).unwrap_or(u32::MAX)
}
