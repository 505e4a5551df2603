//! Repository seam for worker-facing queue operations.
//!
//! Download workers and the auto-download job depend on this trait rather
//! than on [`DownloadQueue`] directly, so they can be exercised against a
//! fake store and so other store backends can be slotted in.

use std::time::Duration;

use async_trait::async_trait;

use super::{DownloadQueue, DownloadQueueEntry, DownloadQueueStatus, NewEntry, Result};
use crate::backoff::DownloadErrorType;

/// Data-access contract used by download workers.
#[async_trait]
pub trait DownloadQueueRepository: Send + Sync {
    /// Atomically claims the next entry that is ready for download.
    async fn claim_next(&self) -> Result<Option<DownloadQueueEntry>>;

    /// Entries ready for download, in dispatch order, without claiming them.
    async fn get_pending_with_backoff(&self) -> Result<Vec<DownloadQueueEntry>>;

    /// Looks up the entry for a chapter.
    async fn get_by_chapter_id(&self, chapter_id: i64) -> Result<Option<DownloadQueueEntry>>;

    /// Queues chapters at one priority, skipping already-queued chapters.
    async fn add_all(&self, entries: &[NewEntry], priority: i64) -> Result<Vec<i64>>;

    /// Marks a chapter completed; `false` if it has no entry.
    async fn mark_completed(&self, chapter_id: i64) -> Result<bool>;

    /// Records a classified failure; `false` if the chapter has no entry.
    async fn record_failure(
        &self,
        chapter_id: i64,
        error_message: &str,
        error_type: DownloadErrorType,
    ) -> Result<bool>;

    /// Returns abandoned `downloading` entries to `pending`.
    async fn reset_stuck_downloads(&self, threshold: Duration) -> Result<u64>;

    /// Counts entries in a status.
    async fn count_by_status(&self, status: DownloadQueueStatus) -> Result<i64>;
}

#[async_trait]
impl DownloadQueueRepository for DownloadQueue {
    async fn claim_next(&self) -> Result<Option<DownloadQueueEntry>> {
        DownloadQueue::claim_next(self).await
    }

    async fn get_pending_with_backoff(&self) -> Result<Vec<DownloadQueueEntry>> {
        DownloadQueue::get_pending_with_backoff(self).await
    }

    async fn get_by_chapter_id(&self, chapter_id: i64) -> Result<Option<DownloadQueueEntry>> {
        DownloadQueue::get_by_chapter_id(self, chapter_id).await
    }

    async fn add_all(&self, entries: &[NewEntry], priority: i64) -> Result<Vec<i64>> {
        DownloadQueue::add_all(self, entries, priority).await
    }

    async fn mark_completed(&self, chapter_id: i64) -> Result<bool> {
        DownloadQueue::mark_completed(self, chapter_id).await
    }

    async fn record_failure(
        &self,
        chapter_id: i64,
        error_message: &str,
        error_type: DownloadErrorType,
    ) -> Result<bool> {
        DownloadQueue::record_failure(self, chapter_id, error_message, error_type).await
    }

    async fn reset_stuck_downloads(&self, threshold: Duration) -> Result<u64> {
        DownloadQueue::reset_stuck_downloads(self, threshold).await
    }

    async fn count_by_status(&self, status: DownloadQueueStatus) -> Result<i64> {
        DownloadQueue::count_by_status(self, status).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::Database;
    use crate::clock::ManualClock;
    use crate::queue::DownloadPriority;

    async fn pending_count(repo: &dyn DownloadQueueRepository) -> Result<i64> {
        repo.count_by_status(DownloadQueueStatus::Pending).await
    }

    #[tokio::test]
    async fn test_repository_trait_delegates_claim_and_failure() {
        let db = Database::new_in_memory().await.unwrap();
        let queue = DownloadQueue::new(db).with_clock(Arc::new(ManualClock::new(0)));
        let repo: &dyn DownloadQueueRepository = &queue;

        repo.add_all(&[NewEntry::new(1, 11), NewEntry::new(1, 12)], DownloadPriority::Normal.value())
            .await
            .unwrap();
        assert_eq!(pending_count(repo).await.unwrap(), 2);

        let entry = repo.claim_next().await.unwrap().unwrap();
        assert_eq!(entry.chapter_id, 11);

        assert!(
            repo.record_failure(11, "source returned 500", DownloadErrorType::SourceError)
                .await
                .unwrap()
        );
        let failed = repo.get_by_chapter_id(11).await.unwrap().unwrap();
        assert_eq!(failed.status(), DownloadQueueStatus::Failed);
        assert_eq!(failed.retry_count, 1);
        assert_eq!(failed.error_type(), Some(DownloadErrorType::SourceError));
    }

    #[tokio::test]
    async fn test_repository_trait_completion_of_missing_chapter_is_false() {
        let db = Database::new_in_memory().await.unwrap();
        let queue = DownloadQueue::new(db);
        let repo: &dyn DownloadQueueRepository = &queue;

        assert!(!repo.mark_completed(404).await.unwrap());
        assert!(
            !repo
                .record_failure(404, "gone", DownloadErrorType::ChapterNotFound)
                .await
                .unwrap()
        );
    }
}
