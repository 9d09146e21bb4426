//! Compaction Module
//!
//! Retention-based reclamation of whole segments.
//!
//! ## Responsibilities
//! - Walk sealed segments oldest → newest, asking each time index whether
//!   every record is older than the retention cutoff
//! - Delete the files of fully expired segments and drop them from the list
//! - Run the sweep periodically on a background thread
//!
//! The sweep is a plain function over the segment list; the worker only
//! decides *when* it runs.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};

use crate::error::Result;
use crate::segment::{Segment, TimeBoundary};

/// Outcome of one retention sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionResult {
    /// Segments removed from the log
    pub segments_removed: usize,

    /// Records contained in the removed segments
    pub records_removed: u64,

    /// Bytes of data and index files deleted
    pub bytes_reclaimed: u64,

    /// Base offsets of the removed segments, oldest first
    pub removed_base_offsets: Vec<u64>,
}

/// Remove every sealed segment whose records are all at or before `cutoff`
/// (Unix seconds)
///
/// Stops at the first segment that still holds a newer record. A segment
/// whose time index cannot be read is kept and the sweep moves on; a
/// segment whose files cannot be deleted is logged and dropped anyway.
pub(crate) fn sweep(sealed: &mut Vec<Segment>, cutoff: u32) -> CompactionResult {
    let mut expired = Vec::new();

    for (i, segment) in sealed.iter_mut().enumerate() {
        let boundary = segment.last_offset_before_time(cutoff);
        segment.evict_cache();

        match boundary {
            Ok(TimeBoundary::All) => expired.push(i),
            Ok(_) => break,
            Err(e) => {
                tracing::warn!(
                    base_offset = segment.base_offset(),
                    error = %e,
                    "failed to read time index, retaining segment"
                );
            }
        }
    }

    let mut result = CompactionResult::default();
    if expired.is_empty() {
        return result;
    }

    for (i, segment) in std::mem::take(sealed).into_iter().enumerate() {
        if expired.binary_search(&i).is_err() {
            sealed.push(segment);
            continue;
        }

        let base_offset = segment.base_offset();
        let records = segment.count();
        let bytes = segment.disk_usage();

        if let Err(e) = segment.remove() {
            tracing::error!(base_offset, error = %e, "failed to delete segment files");
        }

        result.segments_removed += 1;
        result.records_removed += records;
        result.bytes_reclaimed += bytes;
        result.removed_base_offsets.push(base_offset);
    }

    result
}

// =============================================================================
// Background Worker
// =============================================================================

/// Background thread running a task on a fixed interval
///
/// Shutdown waits for an in-flight run to finish.
pub struct Compactor {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Compactor {
    /// Spawn the worker; `task` first runs one `interval` after spawning
    pub fn spawn<F>(interval: Duration, task: F) -> Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);
        let ticker = channel::tick(interval);

        let handle = thread::Builder::new()
            .name("commitlog-compactor".to_string())
            .spawn(move || {
                tracing::debug!(?interval, "compaction worker started");
                loop {
                    crossbeam::select! {
                        recv(shutdown_rx) -> _ => break,
                        recv(ticker) -> _ => task(),
                    }
                }
                tracing::debug!("compaction worker stopped");
            })?;

        Ok(Self {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Signal the worker and wait for it to exit
    pub fn stop(&mut self) {
        // Dropping the sender disconnects the channel, which wakes the select
        self.shutdown.take();

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("compaction worker panicked");
            }
        }
    }
}

impl Drop for Compactor {
    fn drop(&mut self) {
        self.stop();
    }
}
