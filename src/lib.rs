//! # commitlog
//!
//! An embeddable append-only commit log:
//! - Records are opaque byte payloads addressed by a monotonically
//!   increasing offset
//! - Storage is split into rotating segments, each with an offset index
//!   and a time index
//! - Crash recovery reconciles a segment's data file with its indexes
//! - A background worker deletes whole segments older than the retention
//!   policy
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        CommitLog                            │
//! │        append / read / current_offset / compact / close     │
//! └─────────────────────┬───────────────────────────┬───────────┘
//!                       │ Mutex<segments>           │ ticker
//!          ┌────────────┴────────────┐        ┌─────▼──────┐
//!          │                         │        │ Compactor  │
//!          ▼                         ▼        │ (thread)   │
//!   ┌─────────────┐          ┌─────────────┐  └────────────┘
//!   │   Sealed    │   ...    │   Active    │
//!   │  Segments   │          │   Segment   │
//!   └──────┬──────┘          └──────┬──────┘
//!          │                        │
//!          ▼                        ▼
//!   ┌─────────────────────────────────────┐
//!   │ .log  (framed records)              │
//!   │ .index (varint seq → position)      │
//!   │ .timeindex (created_at, seq)        │
//!   └─────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```no_run
//! use commitlog::{CommitLog, Config};
//!
//! let log = CommitLog::open("/tmp/my-log", Config::default())?;
//! let offset = log.append(b"hello")?;
//! assert_eq!(log.read(offset)?, b"hello");
//! log.close()?;
//! # Ok::<(), commitlog::LogError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod varint;
pub mod segment;
pub mod compaction;
pub mod commit_log;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{LogError, Result};
pub use config::{Config, SyncStrategy};
pub use commit_log::CommitLog;
pub use compaction::CompactionResult;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of commitlog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
