//! Worker loop that drains the queue through a [`ChapterDownloader`].
//!
//! The dispatcher owns no download logic. It claims ready entries, hands
//! each one to the injected downloader under a concurrency limit, and
//! writes the outcome back to the queue: completion, or a failure the
//! downloader has already classified into a [`DownloadErrorType`].
//!
//! # Concurrency Model
//!
//! - A semaphore permit is acquired before claiming, so entries are only
//!   stamped `downloading` when a task can start on them right away
//! - Each claimed entry runs in its own Tokio task
//! - Claims are compare-and-set in the store, so several dispatchers may
//!   share one database without double-dispatch
//!
//! # Removed Entries
//!
//! Removing an entry while it downloads is allowed. When the download
//! returns, the dispatcher re-reads the entry; if it is gone (or the chapter
//! was re-queued under a new id) the result is dropped and counted as
//! abandoned.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Semaphore, watch};
use tracing::{debug, info, instrument, warn};

use crate::backoff::DownloadErrorType;
use crate::queue::{DownloadQueueEntry, DownloadQueueRepository, QueueError};

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default number of chapters downloaded in parallel.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// A failed chapter download, already classified by the downloader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error_type}: {message}")]
pub struct ChapterDownloadFailure {
    pub error_type: DownloadErrorType,
    pub message: String,
}

impl ChapterDownloadFailure {
    #[must_use]
    pub fn new(error_type: DownloadErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
        }
    }
}

/// Performs the actual download of one chapter.
#[async_trait]
pub trait ChapterDownloader: Send + Sync {
    /// Downloads the chapter behind `entry`.
    async fn download(&self, entry: &DownloadQueueEntry) -> Result<(), ChapterDownloadFailure>;
}

/// Error type for dispatcher operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Queue operation failed.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Counts from one [`Dispatcher::run_once`] pass.
#[derive(Debug, Default)]
pub struct DispatchStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
    abandoned: AtomicUsize,
}

impl DispatchStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Chapters marked completed.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Chapters whose failure was recorded.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Chapters removed from the queue while they were downloading.
    #[must_use]
    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }

    /// Entries claimed during the pass.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.failed() + self.abandoned()
    }

    fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> Self {
        Self {
            completed: AtomicUsize::new(self.completed()),
            failed: AtomicUsize::new(self.failed()),
            abandoned: AtomicUsize::new(self.abandoned()),
        }
    }
}

/// Drains ready queue entries through a [`ChapterDownloader`].
pub struct Dispatcher {
    queue: Arc<dyn DownloadQueueRepository>,
    downloader: Arc<dyn ChapterDownloader>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher running at most `concurrency` downloads at once.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConcurrency`] if the value is outside
    /// 1-100.
    pub fn new(
        queue: Arc<dyn DownloadQueueRepository>,
        downloader: Arc<dyn ChapterDownloader>,
        concurrency: usize,
    ) -> Result<Self, DispatchError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(DispatchError::InvalidConcurrency { value: concurrency });
        }

        debug!(concurrency, "creating dispatcher");

        Ok(Self {
            queue,
            downloader,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        })
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Claims and downloads entries until none are ready, then waits for
    /// the in-flight downloads to finish.
    ///
    /// Individual download failures do not fail the pass; they are written
    /// to the queue and counted.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Queue`] if claiming fails.
    /// Returns [`DispatchError::SemaphoreClosed`] if the semaphore is closed.
    #[instrument(skip(self), fields(concurrency = self.concurrency))]
    pub async fn run_once(&self) -> Result<DispatchStats, DispatchError> {
        let stats = Arc::new(DispatchStats::new());
        let mut handles = Vec::new();
        let mut claim_error = None;

        loop {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| DispatchError::SemaphoreClosed)?;

            let entry = match self.queue.claim_next().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    claim_error = Some(e);
                    break;
                }
            };
            debug!(id = entry.id, chapter_id = entry.chapter_id, "dispatching chapter");

            let queue = Arc::clone(&self.queue);
            let downloader = Arc::clone(&self.downloader);
            let stats = Arc::clone(&stats);

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                process_entry(queue.as_ref(), downloader.as_ref(), &entry, &stats).await;
            }));
        }

        // In-flight downloads finish even when claiming failed.
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "download task panicked");
            }
        }
        if let Some(e) = claim_error {
            return Err(e.into());
        }

        info!(
            completed = stats.completed(),
            failed = stats.failed(),
            abandoned = stats.abandoned(),
            "dispatch pass complete"
        );
        Ok(stats.snapshot())
    }

    /// Runs dispatch passes every `interval` until `shutdown` turns `true`.
    ///
    /// Each pass first returns entries stuck in `downloading` for longer than
    /// `stuck_threshold` to the queue. Store errors are logged and the loop
    /// carries on with the next pass.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::SemaphoreClosed`] if the semaphore is closed.
    #[instrument(skip(self, shutdown), fields(interval_ms = interval.as_millis()))]
    pub async fn run(
        &self,
        interval: Duration,
        stuck_threshold: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), DispatchError> {
        info!("dispatcher started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.queue.reset_stuck_downloads(stuck_threshold).await {
                warn!(error = %e, transient = e.is_transient(), "stuck download recovery failed");
            }

            match self.run_once().await {
                Ok(_) => {}
                Err(DispatchError::SemaphoreClosed) => return Err(DispatchError::SemaphoreClosed),
                Err(DispatchError::Queue(e)) => {
                    warn!(error = %e, transient = e.is_transient(), "dispatch pass failed");
                }
                Err(e) => warn!(error = %e, "dispatch pass failed"),
            }

            tokio::select! {
                () = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("dispatcher stopped");
        Ok(())
    }
}

/// Downloads one claimed entry and records the outcome.
async fn process_entry(
    queue: &dyn DownloadQueueRepository,
    downloader: &dyn ChapterDownloader,
    entry: &DownloadQueueEntry,
    stats: &DispatchStats,
) {
    let outcome = downloader.download(entry).await;

    match queue.get_by_chapter_id(entry.chapter_id).await {
        Ok(Some(current)) if current.id == entry.id => {}
        Ok(_) => {
            info!(id = entry.id, chapter_id = entry.chapter_id, "entry removed during download, abandoning");
            stats.increment_abandoned();
            return;
        }
        // Best-effort: fall through and let the write below decide.
        Err(e) => warn!(
            id = entry.id,
            error = %e,
            transient = e.is_transient(),
            "could not re-read entry after download"
        ),
    }

    match outcome {
        Ok(()) => match queue.mark_completed(entry.chapter_id).await {
            Ok(true) => {
                debug!(chapter_id = entry.chapter_id, "chapter downloaded");
                stats.increment_completed();
            }
            Ok(false) => stats.increment_abandoned(),
            Err(e) => {
                warn!(
                    chapter_id = entry.chapter_id,
                    error = %e,
                    transient = e.is_transient(),
                    "failed to mark chapter completed"
                );
            }
        },
        Err(failure) => {
            warn!(
                chapter_id = entry.chapter_id,
                error_type = %failure.error_type,
                error = %failure.message,
                "chapter download failed"
            );
            match queue
                .record_failure(entry.chapter_id, &failure.message, failure.error_type)
                .await
            {
                Ok(true) => stats.increment_failed(),
                Ok(false) => stats.increment_abandoned(),
                Err(e) => {
                    warn!(
                        chapter_id = entry.chapter_id,
                        error = %e,
                        transient = e.is_transient(),
                        "failed to record chapter failure"
                    );
                }
            }
        }
    }
}
