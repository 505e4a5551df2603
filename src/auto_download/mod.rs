//! History-driven auto-download selection.
//!
//! [`GetChaptersForAutoDownload`] turns recent reading history into a plan
//! of `(manga, chapters)` pairs; [`enqueue_plan`] applies a plan to the
//! queue at normal priority. Selection never writes to the queue, and
//! re-running it with unchanged inputs yields the same plan; the queue's
//! one-entry-per-chapter rule absorbs repeated runs.
//!
//! # Example
//!
//! ```ignore
//! use chapter_queue::auto_download::{GetChaptersForAutoDownload, enqueue_plan};
//!
//! let selector = GetChaptersForAutoDownload::new(history, manga, chapters, preferences);
//! let plan = selector.select().await?;
//! let summary = enqueue_plan(&queue, &plan).await?;
//! println!("queued {} chapters", summary.queued);
//! ```

mod sources;

pub use sources::{
    AutoDownloadPreferences, Chapter, ChapterSource, HistorySource, HistoryWithRelations, Manga,
    MangaSource,
};

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::clock::{SharedClock, SystemClock};
use crate::queue::{DownloadPriority, DownloadQueueRepository, NewEntry, QueueError};

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// Manga with the chapters to queue for it.
pub type AutoDownloadPlan = Vec<(Manga, Vec<Chapter>)>;

/// Errors raised while building or applying a plan.
#[derive(Debug, Error)]
pub enum AutoDownloadError {
    /// A history, manga or chapter collaborator failed.
    #[error("auto-download source failed: {0}")]
    Source(String),

    /// The queue rejected the plan.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl AutoDownloadError {
    /// Wraps a collaborator failure.
    #[must_use]
    pub fn source(message: impl Into<String>) -> Self {
        Self::Source(message.into())
    }
}

/// Computes which chapters to auto-download from reading history.
#[derive(Clone)]
pub struct GetChaptersForAutoDownload {
    history: Arc<dyn HistorySource>,
    manga: Arc<dyn MangaSource>,
    chapters: Arc<dyn ChapterSource>,
    preferences: Arc<dyn AutoDownloadPreferences>,
    clock: SharedClock,
}

impl std::fmt::Debug for GetChaptersForAutoDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetChaptersForAutoDownload")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl GetChaptersForAutoDownload {
    #[must_use]
    pub fn new(
        history: Arc<dyn HistorySource>,
        manga: Arc<dyn MangaSource>,
        chapters: Arc<dyn ChapterSource>,
        preferences: Arc<dyn AutoDownloadPreferences>,
    ) -> Self {
        Self {
            history,
            manga,
            chapters,
            preferences,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the time source used for the lookback cutoff.
    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the plan.
    ///
    /// Returns an empty plan without touching any collaborator when
    /// auto-download is disabled. Otherwise keeps only the most recent
    /// history row per manga read within the lookback window, drops manga
    /// that no longer exist, and takes up to `chapters_per_manga` unread
    /// chapters after the one last read. Manga with nothing to download are
    /// left out.
    ///
    /// # Errors
    ///
    /// Returns [`AutoDownloadError::Source`] if a collaborator fails.
    #[instrument(skip(self))]
    pub async fn select(&self) -> Result<AutoDownloadPlan, AutoDownloadError> {
        if !self.preferences.auto_download_enabled() {
            debug!("auto-download disabled");
            return Ok(Vec::new());
        }

        let lookback_days = self.preferences.lookback_days().max(1);
        let cutoff = self
            .clock
            .now_millis()
            .saturating_sub(lookback_days.saturating_mul(DAY_MILLIS));
        let per_manga = usize::try_from(self.preferences.chapters_per_manga().max(1))
            .unwrap_or(usize::MAX);

        let mut history = self.history.get_history_for_auto_download(cutoff).await?;
        history.retain(|row| row.read_at > cutoff);
        let history = latest_per_manga(history);
        debug!(manga = history.len(), cutoff, "recent history collected");

        let mut plan = Vec::with_capacity(history.len());
        for row in history {
            let Some(manga) = self.manga.get_manga(row.manga_id).await? else {
                debug!(manga_id = row.manga_id, "manga no longer exists, skipping");
                continue;
            };

            let mut chapters = self
                .chapters
                .get_next_chapters(row.manga_id, row.chapter_id, true)
                .await?;
            chapters.truncate(per_manga);

            if chapters.is_empty() {
                continue;
            }
            plan.push((manga, chapters));
        }

        info!(manga = plan.len(), "auto-download plan built");
        Ok(plan)
    }
}

/// Keeps the most recently read row per manga, newest first.
fn latest_per_manga(mut history: Vec<HistoryWithRelations>) -> Vec<HistoryWithRelations> {
    // Stable sort: equal timestamps keep the source's order.
    history.sort_by(|a, b| b.read_at.cmp(&a.read_at));
    let mut seen = HashSet::new();
    history.retain(|row| seen.insert(row.manga_id));
    history
}

/// Outcome of applying a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnqueueSummary {
    /// Entries created.
    pub queued: usize,
    /// Chapters already in the queue.
    pub skipped: usize,
}

/// Queues every chapter of `plan` at normal priority.
///
/// # Errors
///
/// Returns [`AutoDownloadError::Queue`] if the store fails; chapters queued
/// before the failure stay queued.
#[instrument(skip(queue, plan), fields(manga = plan.len()))]
pub async fn enqueue_plan(
    queue: &dyn DownloadQueueRepository,
    plan: &[(Manga, Vec<Chapter>)],
) -> Result<EnqueueSummary, AutoDownloadError> {
    let entries: Vec<NewEntry> = plan
        .iter()
        .flat_map(|(manga, chapters)| {
            chapters
                .iter()
                .map(move |chapter| NewEntry::new(manga.id, chapter.id))
        })
        .collect();

    let ids = queue
        .add_all(&entries, DownloadPriority::Normal.value())
        .await?;

    let summary = EnqueueSummary {
        queued: ids.len(),
        skipped: entries.len() - ids.len(),
    };
    info!(queued = summary.queued, skipped = summary.skipped, "auto-download plan queued");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(manga_id: i64, chapter_id: i64, read_at: i64) -> HistoryWithRelations {
        HistoryWithRelations {
            manga_id,
            chapter_id,
            read_at,
        }
    }

    #[test]
    fn test_latest_per_manga_keeps_newest_row() {
        let rows = vec![row(1, 10, 100), row(2, 20, 300), row(1, 12, 200)];

        let latest = latest_per_manga(rows);

        assert_eq!(latest, vec![row(2, 20, 300), row(1, 12, 200)]);
    }

    #[test]
    fn test_latest_per_manga_empty() {
        assert!(latest_per_manga(Vec::new()).is_empty());
    }

    #[test]
    fn test_auto_download_error_source_message() {
        let err = AutoDownloadError::source("history db offline");
        assert!(err.to_string().contains("history db offline"));
    }
}
