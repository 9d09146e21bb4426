//! Segment Recovery
//!
//! Brings a segment whose data file and indexes disagree back to a
//! consistent state. Policy: the data file is the source of truth.
//!
//! 1. Scan the data file frame by frame from byte 0
//! 2. Truncate a trailing incomplete frame (torn append)
//! 3. Rewrite the offset index from the scanned frame positions if it differs
//! 4. Keep time index entries for surviving records, backfill missing ones
//!    with the recovery time

use std::io::{Read, Seek, SeekFrom};

use crate::error::Result;
use crate::record;

use super::{unix_now, Segment};

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Complete records found in the data file
    pub records_recovered: u64,

    /// Offset index entries that were missing or wrong
    pub index_entries_rebuilt: u64,

    /// Time index entries that had to be backfilled
    pub time_entries_rebuilt: u64,

    /// Bytes cut from the end of the data file
    pub bytes_truncated: u64,

    /// Whether the data file was truncated (partial frame removed)
    pub was_truncated: bool,
}

impl Segment {
    /// Reconcile the data file and both indexes
    ///
    /// Afterwards the offset index holds exactly one entry per complete
    /// frame, `count` equals that number and `position` the data file size.
    pub fn recover(&mut self) -> Result<RecoveryResult> {
        let mut data = Vec::new();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_to_end(&mut data)?;

        let (positions, valid_len) = scan_frames(&data);
        let mut result = RecoveryResult {
            records_recovered: positions.len() as u64,
            ..Default::default()
        };

        // Step 1: Drop the torn tail of the data file
        let file_len = data.len() as u64;
        if valid_len < file_len {
            self.file.set_len(valid_len)?;
            self.file.sync_all()?;
            result.bytes_truncated = file_len - valid_len;
            result.was_truncated = true;
        }

        // Step 2: Rebuild the offset index if it disagrees with the scan
        self.offset_index.ensure_loaded()?;
        let mismatched = positions
            .iter()
            .enumerate()
            .filter(|&(seq, &pos)| self.offset_index.lookup(seq as u64) != Some(pos))
            .count() as u64;
        let stale = self.offset_index.count()? != positions.len();

        if mismatched > 0 || stale {
            self.offset_index.rewrite(&positions)?;
            result.index_entries_rebuilt = mismatched;
        }

        // Step 3: Keep the dense prefix of time entries, backfill the rest
        let existing = self.time_index.entries()?;
        let mut entries: Vec<(u32, u64)> = Vec::with_capacity(positions.len());
        for (created_at, seq) in existing.iter().copied() {
            if seq == entries.len() as u64 && seq < positions.len() as u64 {
                entries.push((created_at, seq));
            }
        }

        let now = unix_now();
        let kept = entries.len() as u64;
        for seq in kept..positions.len() as u64 {
            entries.push((now, seq));
        }

        if entries != existing {
            self.time_index.rewrite(&entries)?;
            result.time_entries_rebuilt = positions.len() as u64 - kept;
        }

        self.count = positions.len() as u64;
        self.position = valid_len;
        self.is_loaded = true;

        Ok(result)
    }
}

/// Start positions of every complete frame, and the byte length they cover
fn scan_frames(data: &[u8]) -> (Vec<u64>, u64) {
    let mut positions = Vec::new();
    let mut pos = 0usize;

    while let Some(len) = record::read_len(&data[pos..]) {
        let end = pos + record::frame_len(len);
        if end > data.len() {
            break;
        }
        positions.push(pos as u64);
        pos = end;
    }

    (positions, pos as u64)
}
