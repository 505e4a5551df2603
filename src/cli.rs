//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};

use chapter_queue::{DownloadErrorType, DownloadPriority, DownloadQueueStatus};

/// Inspect and maintain the chapter download queue.
///
/// Chapter queue keeps manga chapter downloads in a persistent, prioritized
/// queue with per-error backoff and stuck-download recovery.
#[derive(Parser, Debug)]
#[command(name = "chapter-queue")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Queue database file (overrides `db_path` from the config file)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Queue operations.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Queue a chapter for download
    Add {
        manga_id: i64,
        chapter_id: i64,

        /// low, normal, high, urgent, or a raw integer
        #[arg(short, long, default_value_t = DownloadPriority::Normal, allow_negative_numbers = true)]
        priority: DownloadPriority,
    },

    /// List queue entries in dispatch order
    List {
        /// Only entries in this status
        #[arg(long, conflicts_with = "ready")]
        status: Option<DownloadQueueStatus>,

        /// Only entries a worker could start now
        #[arg(long)]
        ready: bool,

        /// Only entries of this manga
        #[arg(long, value_name = "MANGA_ID")]
        manga: Option<i64>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the number of entries per status
    Counts {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Mark a chapter as downloaded
    Complete { chapter_id: i64 },

    /// Record a failed download attempt for a chapter
    Fail {
        chapter_id: i64,

        /// network-error, source-error, disk-full, chapter-not-found, unknown
        #[arg(short = 't', long = "type", default_value_t = DownloadErrorType::Unknown)]
        error_type: DownloadErrorType,

        /// Error message to store with the entry
        #[arg(short, long, default_value = "")]
        message: String,
    },

    /// Change the priority of an entry
    Priority {
        /// Entry id
        id: i64,
        /// low, normal, high, urgent, or a raw integer
        #[arg(allow_negative_numbers = true)]
        priority: DownloadPriority,
    },

    /// Remove entries by id, chapter or manga
    #[command(group(ArgGroup::new("target").required(true).args(["id", "chapter", "manga"])))]
    Remove {
        #[arg(long)]
        id: Option<i64>,

        #[arg(long)]
        chapter: Option<i64>,

        #[arg(long)]
        manga: Option<i64>,
    },

    /// Return every failed entry to pending, ignoring backoff; retry counts are kept
    RetryAll,

    /// Return downloads stuck in progress to pending
    ResetStuck {
        /// Age in seconds after which a download counts as stuck
        #[arg(long, value_name = "SECS")]
        older_than: Option<u64>,
    },

    /// Delete completed entries
    ClearCompleted,

    /// Delete every entry
    ClearAll,
}
