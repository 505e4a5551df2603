//! Chapter Queue Library
//!
//! Persistent download queue and scheduler for manga chapters. The queue
//! orders work by priority and age, holds failed chapters back on a
//! per-error-type backoff, recovers downloads abandoned by crashed workers,
//! and feeds itself from recent reading history.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`db`] - Database connection and schema management
//! - [`queue`] - Queue persistence, claiming and bulk maintenance
//! - [`backoff`] - Error classification and retry delays
//! - [`auto_download`] - History-driven chapter selection
//! - [`dispatch`] - Concurrent worker loop over a pluggable downloader
//! - [`config`] - File-based scheduler settings
//! - [`clock`] - Injectable time source

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auto_download;
pub mod backoff;
pub mod clock;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod queue;

// Re-export commonly used types
pub use auto_download::{
    AutoDownloadError, AutoDownloadPlan, AutoDownloadPreferences, EnqueueSummary,
    GetChaptersForAutoDownload, enqueue_plan,
};
pub use backoff::{BackoffDelay, BackoffPolicy, DownloadErrorType};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{ConfigError, QueueConfig};
pub use db::{Database, DbError};
pub use dispatch::{
    ChapterDownloadFailure, ChapterDownloader, DEFAULT_CONCURRENCY, DispatchError, DispatchStats,
    Dispatcher,
};
pub use queue::{
    DownloadPriority, DownloadQueue, DownloadQueueEntry, DownloadQueueRepository,
    DownloadQueueStatus, QueueError,
};
