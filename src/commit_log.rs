//! Commit Log
//!
//! The public entry point: an ordered list of segments, the active segment
//! receiving appends, and the background retention worker.
//!
//! ## Responsibilities
//! - Discover and load segments on open
//! - Assign offsets and rotate the active segment when it fills up
//! - Route reads to the segment owning an offset
//! - Reclaim expired segments (on a timer and on demand)

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::compaction::{self, CompactionResult, Compactor};
use crate::config::Config;
use crate::error::{LogError, Result};
use crate::record::MAX_RECORD_SIZE;
use crate::segment::{self, to_unix_secs, Segment};

/// An append-only, offset-addressed log of opaque records
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader
///
/// All mutable state sits behind one `Mutex`:
/// - **Appends** hold it for the whole append, including rotation
/// - **Reads** hold it too: a read of a cold segment reloads its index, and
///   the segment list must not change under a lookup
/// - **Compaction** holds it while scanning time indexes and deleting files
///
/// The handle is `Send + Sync`; share it with `Arc<CommitLog>`.
pub struct CommitLog {
    shared: Arc<Shared>,

    /// Background retention worker (None if disabled or already stopped)
    compactor: Option<Compactor>,
}

/// State shared with the compaction worker
struct Shared {
    dir: PathBuf,
    config: Config,
    state: Mutex<LogState>,
}

/// The segment list: sealed segments oldest → newest, then the active one
struct LogState {
    sealed: Vec<Segment>,
    active: Segment,

    /// Base offset of the sealed segment whose indexes the last read loaded
    ///
    /// At most one sealed segment keeps its tables resident between reads.
    cold: Option<u64>,
}

impl CommitLog {
    /// Open or create a log in `dir`
    ///
    /// On startup:
    /// 1. Validate config and create the directory
    /// 2. Discover `.log` files and parse their base offsets
    /// 3. Open every segment; only the newest (active) one is loaded
    /// 4. Start the compaction worker if enabled
    pub fn open(dir: impl AsRef<Path>, config: Config) -> Result<Self> {
        config.validate()?;

        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        // Discover existing segments
        let mut base_offsets = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(base_offset) = segment::parse_base_offset(&path) {
                base_offsets.push(base_offset?);
            }
        }
        base_offsets.sort_unstable();

        let mut sealed = Vec::with_capacity(base_offsets.len());
        for base_offset in base_offsets {
            sealed.push(Segment::open(&dir, base_offset, &config)?);
        }

        // Newest segment is active; a fresh directory starts at offset 0
        let mut active = match sealed.pop() {
            Some(segment) => segment,
            None => Segment::open(&dir, 0, &config)?,
        };
        active.load()?;

        tracing::info!(
            dir = %dir.display(),
            segments = sealed.len() + 1,
            next_offset = active.next_offset(),
            "commit log opened"
        );

        let shared = Arc::new(Shared {
            dir,
            config,
            state: Mutex::new(LogState {
                sealed,
                active,
                cold: None,
            }),
        });

        let compactor = if shared.config.background_compaction {
            let worker_shared = Arc::clone(&shared);
            Some(Compactor::spawn(shared.config.compaction_interval, move || {
                worker_shared.compact_before(retention_cutoff(&worker_shared.config));
            })?)
        } else {
            None
        };

        Ok(Self { shared, compactor })
    }

    /// Append a record, returning its offset
    pub fn append(&self, payload: &[u8]) -> Result<u64> {
        // Reject before touching the active segment so nothing rotates
        if payload.len() > MAX_RECORD_SIZE {
            return Err(LogError::RecordTooLarge {
                size: payload.len(),
                max: MAX_RECORD_SIZE,
            });
        }

        let mut state = self.shared.state.lock();
        state.active.ensure_loaded()?;

        let offset = state.active.next_offset();
        if state.active.check_full(payload)? {
            self.shared.rotate(&mut state, offset)?;
        }

        state.active.write(payload)?;
        Ok(offset)
    }

    /// Read the record at `offset`
    ///
    /// Returns:
    /// - `Err(SegmentNotFound)`: offset is below the oldest retained segment
    /// - `Err(RecordNotFound)`: the owning segment has no such record
    pub fn read(&self, offset: u64) -> Result<Vec<u8>> {
        self.shared.state.lock().read(offset)
    }

    /// Offset of the most recently appended record, `None` on an empty log
    pub fn current_offset(&self) -> Option<u64> {
        self.next_offset().checked_sub(1)
    }

    /// Offset the next append will receive
    pub fn next_offset(&self) -> u64 {
        self.shared.state.lock().active.next_offset()
    }

    /// Smallest offset still covered by a retained segment
    pub fn oldest_offset(&self) -> u64 {
        let state = self.shared.state.lock();
        state
            .sealed
            .first()
            .map(Segment::base_offset)
            .unwrap_or_else(|| state.active.base_offset())
    }

    /// Delete every segment entirely older than `now - retention_policy`
    pub fn compact(&self) -> CompactionResult {
        self.shared
            .compact_before(retention_cutoff(&self.shared.config))
    }

    /// Delete every segment whose records were all created at or before `cutoff`
    pub fn compact_before(&self, cutoff: SystemTime) -> CompactionResult {
        self.shared.compact_before(cutoff)
    }

    /// fsync every segment
    pub fn sync(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.active.sync()?;
        for segment in state.sealed.iter_mut() {
            segment.sync()?;
        }
        Ok(())
    }

    /// Close the log gracefully
    ///
    /// Stops the compaction worker (an in-flight sweep finishes first), then
    /// fsyncs every segment. File handles are released when `self` drops.
    pub fn close(mut self) -> Result<()> {
        if let Some(mut compactor) = self.compactor.take() {
            compactor.stop();
        }

        let mut state = self.shared.state.lock();
        state.active.close()?;
        for segment in state.sealed.iter_mut() {
            segment.close()?;
        }

        tracing::info!(dir = %self.shared.dir.display(), "commit log closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the log directory
    pub fn dir(&self) -> &Path {
        &self.shared.dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Number of segments, including the active one
    pub fn segment_count(&self) -> usize {
        self.shared.state.lock().sealed.len() + 1
    }

    /// Number of segments whose index tables are resident, active included
    pub fn resident_index_count(&self) -> usize {
        let state = self.shared.state.lock();
        state
            .sealed
            .iter()
            .chain(std::iter::once(&state.active))
            .filter(|segment| segment.is_index_cached())
            .count()
    }

    /// Base offsets of all segments, oldest first
    pub fn segment_base_offsets(&self) -> Vec<u64> {
        let state = self.shared.state.lock();
        state
            .sealed
            .iter()
            .chain(std::iter::once(&state.active))
            .map(Segment::base_offset)
            .collect()
    }
}

impl Drop for CommitLog {
    fn drop(&mut self) {
        if let Some(mut compactor) = self.compactor.take() {
            compactor.stop();
        }
    }
}

impl Shared {
    /// Seal the active segment and start a new one at `base_offset`
    ///
    /// The outgoing segment is synced and its index caches dropped, so only
    /// the active segment keeps its tables resident.
    fn rotate(&self, state: &mut LogState, base_offset: u64) -> Result<()> {
        let mut next = Segment::open(&self.dir, base_offset, &self.config)?;
        next.load()?;

        state.active.sync()?;

        let mut previous = std::mem::replace(&mut state.active, next);
        previous.evict_cache();

        tracing::info!(
            sealed_base_offset = previous.base_offset(),
            sealed_records = previous.count(),
            new_base_offset = base_offset,
            "rotated active segment"
        );

        state.sealed.push(previous);
        Ok(())
    }

    fn compact_before(&self, cutoff: SystemTime) -> CompactionResult {
        let cutoff = to_unix_secs(cutoff);
        let mut state = self.state.lock();
        let result = compaction::sweep(&mut state.sealed, cutoff);

        if result.segments_removed > 0 {
            tracing::info!(
                segments = result.segments_removed,
                records = result.records_removed,
                bytes = result.bytes_reclaimed,
                "compaction removed expired segments"
            );
        } else {
            tracing::debug!(cutoff, "compaction found nothing to remove");
        }

        result
    }
}

impl LogState {
    /// Read `offset` from the segment whose range covers it
    ///
    /// The active segment covers `[base, ∞)`; each sealed segment covers
    /// `[base, next base)`. Moving on to a different sealed segment evicts
    /// the indexes of the one read before.
    fn read(&mut self, offset: u64) -> Result<Vec<u8>> {
        if offset >= self.active.base_offset() {
            return self.active.read(offset);
        }

        let idx = self
            .sealed
            .partition_point(|segment| segment.base_offset() <= offset);
        if idx == 0 {
            return Err(LogError::SegmentNotFound { offset });
        }

        let base_offset = self.sealed[idx - 1].base_offset();
        if let Some(previous) = self.cold.replace(base_offset) {
            if previous != base_offset {
                self.evict_sealed(previous);
            }
        }

        self.sealed[idx - 1].read(offset)
    }

    /// Drop the index tables of the sealed segment at `base_offset`, if any
    fn evict_sealed(&mut self, base_offset: u64) {
        if let Ok(idx) = self
            .sealed
            .binary_search_by_key(&base_offset, |segment| segment.base_offset())
        {
            self.sealed[idx].evict_cache();
        }
    }
}

/// `now - retention_policy`, clamped to the epoch
fn retention_cutoff(config: &Config) -> SystemTime {
    SystemTime::now()
        .checked_sub(config.retention_policy)
        .unwrap_or(SystemTime::UNIX_EPOCH)
}
