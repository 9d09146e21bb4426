//! commitlog-tool
//!
//! Command-line interface for inspecting and maintaining a log directory.

use std::ops::Range;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use commitlog::{CommitLog, Config, LogError};
use tracing_subscriber::{fmt, EnvFilter};

/// commitlog-tool
#[derive(Parser, Debug)]
#[command(name = "commitlog-tool")]
#[command(about = "Inspect and maintain a commit log directory")]
#[command(version)]
struct Args {
    /// Log directory
    #[arg(short, long, default_value = "./commitlog_data")]
    dir: PathBuf,

    /// Segment size in bytes before rotation
    #[arg(short = 's', long, default_value_t = commitlog::config::DEFAULT_MAX_SEGMENT_SIZE)]
    max_segment_size: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Append one record per argument
    Append {
        /// Record payloads (UTF-8)
        #[arg(required = true)]
        records: Vec<String>,
    },

    /// Read a single record
    Read {
        /// Offset to read
        offset: u64,
    },

    /// Print records in offset order
    Dump {
        /// First offset to print (defaults to the oldest retained offset)
        #[arg(short, long)]
        from: Option<u64>,

        /// Maximum number of records to print
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    /// Show segment layout and offsets
    Stat,

    /// Delete segments older than the retention period
    Compact {
        /// Retention period in seconds
        #[arg(short, long)]
        retention_secs: u64,
    },
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,commitlog=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> commitlog::Result<()> {
    let retention = match &args.command {
        Commands::Compact { retention_secs } => Duration::from_secs(*retention_secs),
        _ => commitlog::config::DEFAULT_RETENTION_POLICY,
    };

    // The tool is short-lived; retention only runs when asked for
    let config = Config::builder()
        .max_segment_size(args.max_segment_size)
        .retention_policy(retention)
        .background_compaction(false)
        .build();

    let log = CommitLog::open(&args.dir, config)?;

    match args.command {
        Commands::Append { records } => {
            for record in records {
                let offset = log.append(record.as_bytes())?;
                println!("{}", offset);
            }
        }
        Commands::Read { offset } => {
            let payload = log.read(offset)?;
            println!("{}", String::from_utf8_lossy(&payload));
        }
        Commands::Dump { from, limit } => {
            for offset in dump_range(&log, from).take(limit) {
                match log.read(offset) {
                    Ok(payload) => {
                        println!("{}\t{}", offset, String::from_utf8_lossy(&payload))
                    }
                    Err(LogError::RecordNotFound { .. }) => {
                        println!("{}\t<missing>", offset)
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Commands::Stat => {
            println!("directory:      {}", log.dir().display());
            println!("segments:       {}", log.segment_count());
            println!("oldest offset:  {}", log.oldest_offset());
            match log.current_offset() {
                Some(offset) => println!("current offset: {}", offset),
                None => println!("current offset: <empty>"),
            }
            for base_offset in log.segment_base_offsets() {
                println!("  segment {:020}", base_offset);
            }
        }
        Commands::Compact { .. } => {
            let result = log.compact();
            println!(
                "removed {} segment(s), {} record(s), {} byte(s)",
                result.segments_removed, result.records_removed, result.bytes_reclaimed
            );
        }
    }

    log.close()
}

/// Offsets to dump: from `from` (or the oldest retained offset) to the end
///
/// Offsets already compacted away are skipped rather than reported.
fn dump_range(log: &CommitLog, from: Option<u64>) -> Range<u64> {
    let oldest = log.oldest_offset();
    let start = from.map_or(oldest, |from| from.max(oldest));
    start..log.next_offset()
}
