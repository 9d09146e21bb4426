//! Offset Index
//!
//! Durable, append-only mapping from a segment-local sequence number to the
//! byte position of that record in the segment data file.
//!
//! ## File Format
//! ```text
//! ┌────────────────────────┬──────────────────────────┐
//! │ LocalSeq: varint       │ BytePosition: varint     │
//! └────────────────────────┴──────────────────────────┘
//! ... repeated once per record, in write order ...
//! ```

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::BytesMut;

use crate::error::Result;
use crate::varint;

use super::{segment_path, INDEX_EXT};

/// In-memory copy of the index
///
/// Only the active segment keeps its table resident; idle segments drop it
/// and reload from disk on their next read.
#[derive(Debug)]
enum IndexCache {
    Unloaded,
    Loaded(HashMap<u64, u64>),
}

/// Offset index for one segment
#[derive(Debug)]
pub struct OffsetIndex {
    /// Path to the `.index` file
    path: PathBuf,
    /// Handle used for loading (reads are positional, writes always append)
    file: File,
    /// Buffered append handle; flushed on `sync()` and before every load
    writer: BufWriter<File>,
    cache: IndexCache,
}

impl OffsetIndex {
    /// Open or create the index file for the segment at `base_offset`
    ///
    /// The in-memory table starts unloaded.
    pub fn open(dir: &Path, base_offset: u64) -> Result<Self> {
        let path = segment_path(dir, base_offset, INDEX_EXT);
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
            cache: IndexCache::Unloaded,
        })
    }

    /// Append an entry
    ///
    /// Buffered; durable only after `sync()`.
    pub fn write(&mut self, local_seq: u64, position: u64) -> Result<()> {
        let mut buf = BytesMut::with_capacity(2 * varint::MAX_VARINT_LEN);
        varint::encode_u64(&mut buf, local_seq);
        varint::encode_u64(&mut buf, position);
        self.writer.write_all(&buf)?;

        // An unloaded table picks the entry up from disk on its next load
        if let IndexCache::Loaded(table) = &mut self.cache {
            table.insert(local_seq, position);
        }

        Ok(())
    }

    /// Byte position of `local_seq`, or `None` if it was never written or
    /// the table is currently unloaded
    pub fn lookup(&self, local_seq: u64) -> Option<u64> {
        match &self.cache {
            IndexCache::Loaded(table) => table.get(&local_seq).copied(),
            IndexCache::Unloaded => None,
        }
    }

    /// Rebuild the in-memory table from the full file
    ///
    /// A torn entry at the tail (crash mid-append) ends decoding at the last
    /// complete pair; the segment consistency check decides what to do next.
    pub fn load(&mut self) -> Result<()> {
        self.writer.flush()?;

        let mut data = Vec::new();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_to_end(&mut data)?;

        let mut table = HashMap::new();
        let mut cursor = data.as_slice();
        while !cursor.is_empty() {
            let entry = varint::decode_u64(&mut cursor)
                .and_then(|seq| varint::decode_u64(&mut cursor).map(|pos| (seq, pos)));

            match entry {
                Some((seq, pos)) => {
                    table.insert(seq, pos);
                }
                None => {
                    tracing::debug!(
                        path = %self.path.display(),
                        entries = table.len(),
                        "offset index ends with a torn entry"
                    );
                    break;
                }
            }
        }

        self.cache = IndexCache::Loaded(table);
        Ok(())
    }

    /// Load the table unless it is already resident
    pub fn ensure_loaded(&mut self) -> Result<()> {
        if !self.is_loaded() {
            self.load()?;
        }
        Ok(())
    }

    /// Drop the in-memory table without touching the file
    pub fn evict(&mut self) {
        self.cache = IndexCache::Unloaded;
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.cache, IndexCache::Loaded(_))
    }

    /// Number of entries (loads the table if needed)
    pub fn count(&mut self) -> Result<usize> {
        self.ensure_loaded()?;
        Ok(match &self.cache {
            IndexCache::Loaded(table) => table.len(),
            IndexCache::Unloaded => 0,
        })
    }

    /// Replace the whole file with one entry per position (`positions[i]` is
    /// the position of local seq `i`) and fsync it
    pub(crate) fn rewrite(&mut self, positions: &[u64]) -> Result<()> {
        self.writer.flush()?;
        self.file.set_len(0)?;

        let mut buf = BytesMut::with_capacity(positions.len() * 4);
        let mut table = HashMap::with_capacity(positions.len());
        for (seq, &pos) in positions.iter().enumerate() {
            varint::encode_u64(&mut buf, seq as u64);
            varint::encode_u64(&mut buf, pos);
            table.insert(seq as u64, pos);
        }

        self.writer.write_all(&buf)?;
        self.sync()?;
        self.cache = IndexCache::Loaded(table);

        Ok(())
    }

    /// Flush buffered entries and fsync the file
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Flush and release the file handles
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
}
