//! Chapter download queue persistence.
//!
//! This module provides the `SQLite`-backed queue that owns the lifecycle of
//! every chapter download (pending → downloading → completed/failed).
//!
//! # Overview
//!
//! - [`DownloadQueue`] - The queue handle; all ordering, backoff
//!   eligibility and stuck detection happen here, not in callers
//! - [`DownloadQueueEntry`] - One queued chapter
//! - [`DownloadQueueStatus`] / [`DownloadPriority`] - Lifecycle and ordering
//! - [`DownloadQueueRepository`] - Worker-facing trait seam
//! - [`QueueError`] - Store failures
//!
//! # Example
//!
//! ```ignore
//! use chapter_queue::queue::{DownloadPriority, DownloadQueue};
//! use chapter_queue::{Database, DownloadErrorType};
//! use std::path::Path;
//!
//! let db = Database::new(Path::new("chapter-queue.db")).await?;
//! let queue = DownloadQueue::new(db);
//!
//! queue.add(1, 5, DownloadPriority::High).await?;
//!
//! if let Some(entry) = queue.claim_next().await? {
//!     // ... download the chapter ...
//!     queue.record_failure(entry.chapter_id, "timeout", DownloadErrorType::NetworkError).await?;
//! }
//! ```

mod error;
mod item;
mod repository;

pub use error::{QueueDbErrorKind, QueueError};
pub use item::{
    DownloadPriority, DownloadQueueEntry, DownloadQueueStatus, EntrySnapshot, EntryUpdate,
    FieldUpdate, NewEntry,
};
pub use repository::DownloadQueueRepository;

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use tokio::sync::watch;
use tracing::{debug, info, instrument};

use crate::backoff::{BackoffPolicy, DownloadErrorType};
use crate::clock::{SharedClock, SystemClock, duration_millis};
use crate::db::Database;

/// Default age after which a `downloading` entry is presumed abandoned.
///
/// Must stay well above the longest legitimate single-chapter download.
pub const DEFAULT_STUCK_THRESHOLD: Duration = Duration::from_secs(30 * 60);

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

impl From<DownloadPriority> for i64 {
    fn from(priority: DownloadPriority) -> Self {
        priority.value()
    }
}

/// Stored status normalised the way [`DownloadQueueStatus`] parses it.
const STATUS_EXPR: &str = "LOWER(TRIM(status))";

/// Queue order. Unknown stored priorities sort as `Normal`.
const QUEUE_ORDER: &str = "CASE WHEN priority IN (-1, 0, 1, 2) THEN priority ELSE 0 END DESC, \
                           added_at ASC, id ASC";

/// SQL predicate selecting entries that read back as `status`.
///
/// Unknown stored text parses as `Pending`, so the pending predicate is
/// "none of the other statuses".
fn status_clause(status: DownloadQueueStatus) -> String {
    match status {
        DownloadQueueStatus::Pending => format!(
            "{STATUS_EXPR} NOT IN ('{}', '{}', '{}')",
            DownloadQueueStatus::Downloading.as_str(),
            DownloadQueueStatus::Failed.as_str(),
            DownloadQueueStatus::Completed.as_str()
        ),
        other => format!("{STATUS_EXPR} = '{}'", other.as_str()),
    }
}

/// SQL predicate excluding entries whose recorded error type forbids retry.
///
/// Spellings the SQL cannot normalise are filtered again by
/// [`BackoffPolicy::is_ready`].
fn retryable_clause() -> String {
    let blocked: Vec<String> = DownloadErrorType::ALL
        .iter()
        .filter(|error_type| !error_type.can_retry())
        .map(|error_type| format!("'{}'", error_type.as_str()))
        .collect();
    format!(
        "(error_type IS NULL OR LOWER(TRIM(error_type)) NOT IN ({}))",
        blocked.join(", ")
    )
}

/// Chapter download queue backed by the queue store.
///
/// Cheap to clone: clones share the database pool, clock, backoff policy
/// and change notifications. Every single-entry mutation is one SQL
/// statement, so concurrent callers never observe torn writes.
#[derive(Debug, Clone)]
pub struct DownloadQueue {
    db: Database,
    clock: SharedClock,
    backoff: BackoffPolicy,
    changes: Arc<watch::Sender<u64>>,
}

impl DownloadQueue {
    /// Creates a queue over `db` using the system clock and default backoff.
    #[must_use]
    pub fn new(db: Database) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            db,
            clock: Arc::new(SystemClock),
            backoff: BackoffPolicy::default(),
            changes: Arc::new(changes),
        }
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the backoff policy.
    #[must_use]
    pub fn with_backoff_policy(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn backoff_policy(&self) -> &BackoffPolicy {
        &self.backoff
    }

    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// The underlying store handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Wakes live subscribers after a committed mutation.
    fn notify(&self) {
        self.changes
            .send_modify(|revision| *revision = revision.wrapping_add(1));
    }

    fn notify_if_changed(&self, rows_affected: u64) {
        if rows_affected > 0 {
            self.notify();
        }
    }

    async fn list_where(&self, predicate: &str) -> Result<Vec<DownloadQueueEntry>> {
        let sql = format!("SELECT * FROM download_queue WHERE {predicate} ORDER BY {QUEUE_ORDER}");
        let entries = sqlx::query_as::<_, DownloadQueueEntry>(&sql)
            .fetch_all(self.db.pool())
            .await?;
        Ok(entries)
    }

    // ==================== Reads ====================

    /// Pending entries, highest priority first, then oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get_pending_by_priority(&self) -> Result<Vec<DownloadQueueEntry>> {
        self.list_where(&status_clause(DownloadQueueStatus::Pending))
            .await
    }

    /// Entries a worker may start now: pending ones, plus failed ones whose
    /// error type allows retry and whose backoff window has elapsed.
    ///
    /// Same ordering as [`Self::get_pending_by_priority`]. Non-retryable
    /// failures never appear here.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get_pending_with_backoff(&self) -> Result<Vec<DownloadQueueEntry>> {
        let predicate = format!(
            "{} OR ({} AND {})",
            status_clause(DownloadQueueStatus::Pending),
            status_clause(DownloadQueueStatus::Failed),
            retryable_clause()
        );
        let now = self.now();
        let mut entries = self.list_where(&predicate).await?;
        entries.retain(|entry| self.backoff.is_ready(entry, now));
        Ok(entries)
    }

    /// Every entry regardless of status.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get_all(&self) -> Result<Vec<DownloadQueueEntry>> {
        self.list_where("1 = 1").await
    }

    /// Live view of the whole queue.
    ///
    /// Yields the current snapshot immediately, then a fresh snapshot after
    /// each committed mutation. Bursts of mutations may be coalesced into a
    /// single snapshot.
    #[must_use]
    pub fn get_all_as_stream(&self) -> BoxStream<'static, Result<Vec<DownloadQueueEntry>>> {
        let receiver = self.changes.subscribe();
        stream::unfold(
            (self.clone(), receiver, true),
            |(queue, mut receiver, first)| async move {
                if !first && receiver.changed().await.is_err() {
                    return None;
                }
                let snapshot = queue.get_all().await;
                Some((snapshot, (queue, receiver, false)))
            },
        )
        .boxed()
    }

    /// Looks up an entry by id.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: i64) -> Result<Option<DownloadQueueEntry>> {
        let entry =
            sqlx::query_as::<_, DownloadQueueEntry>("SELECT * FROM download_queue WHERE id = ?")
                .bind(id)
                .fetch_optional(self.db.pool())
                .await?;
        Ok(entry)
    }

    /// Looks up the entry for a chapter.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get_by_chapter_id(&self, chapter_id: i64) -> Result<Option<DownloadQueueEntry>> {
        let entry = sqlx::query_as::<_, DownloadQueueEntry>(
            "SELECT * FROM download_queue WHERE chapter_id = ?",
        )
        .bind(chapter_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(entry)
    }

    /// All entries of one manga, in queue order.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get_by_manga_id(&self, manga_id: i64) -> Result<Vec<DownloadQueueEntry>> {
        let sql = format!("SELECT * FROM download_queue WHERE manga_id = ? ORDER BY {QUEUE_ORDER}");
        let entries = sqlx::query_as::<_, DownloadQueueEntry>(&sql)
            .bind(manga_id)
            .fetch_all(self.db.pool())
            .await?;
        Ok(entries)
    }

    /// Counts entries that read back as `status`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn count_by_status(&self, status: DownloadQueueStatus) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM download_queue WHERE {}",
            status_clause(status)
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    // ==================== Enqueue ====================

    /// Queues a chapter as a new pending entry.
    ///
    /// Returns the new id, or `None` when the chapter already has an entry
    /// (in any status). The existing entry is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the insert fails.
    #[instrument(skip(self, priority))]
    pub async fn add(
        &self,
        manga_id: i64,
        chapter_id: i64,
        priority: impl Into<i64> + Send,
    ) -> Result<Option<i64>> {
        let priority = priority.into();

        let id: Option<i64> = sqlx::query_scalar(
            r"INSERT INTO download_queue (manga_id, chapter_id, priority, added_at, retry_count, status)
              VALUES (?, ?, ?, ?, 0, ?)
              ON CONFLICT (chapter_id) DO NOTHING
              RETURNING id",
        )
        .bind(manga_id)
        .bind(chapter_id)
        .bind(priority)
        .bind(self.now())
        .bind(DownloadQueueStatus::Pending.as_str())
        .fetch_optional(self.db.pool())
        .await?;

        match id {
            Some(id) => {
                debug!(id, priority, "chapter queued");
                self.notify();
            }
            None => debug!("chapter already queued, skipping"),
        }
        Ok(id)
    }

    /// Queues several chapters at one priority.
    ///
    /// Each chapter is inserted on its own; already-queued chapters are
    /// skipped. Returns the ids of the entries actually created.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] on the first failing insert; entries
    /// inserted before it stay queued.
    #[instrument(skip(self, entries, priority), fields(count = entries.len()))]
    pub async fn add_all(
        &self,
        entries: &[NewEntry],
        priority: impl Into<i64> + Send,
    ) -> Result<Vec<i64>> {
        let priority = priority.into();
        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(id) = self.add(entry.manga_id, entry.chapter_id, priority).await? {
                ids.push(id);
            }
        }
        debug!(inserted = ids.len(), skipped = entries.len() - ids.len(), "batch queued");
        Ok(ids)
    }

    // ==================== Single-entry mutations ====================

    /// Atomically claims the next entry for download.
    ///
    /// Walks [`Self::get_pending_with_backoff`] in order and moves the first
    /// entry that is still in the observed state to `downloading`
    /// (compare-and-set on status and retry count), stamping
    /// `last_attempt_at` with the claim time. Concurrent workers therefore
    /// never claim the same entry.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if a query fails.
    #[instrument(skip(self))]
    pub async fn claim_next(&self) -> Result<Option<DownloadQueueEntry>> {
        for candidate in self.get_pending_with_backoff().await? {
            let claimed = sqlx::query_as::<_, DownloadQueueEntry>(
                r"UPDATE download_queue
                  SET status = ?, last_attempt_at = ?
                  WHERE id = ? AND status = ? AND retry_count = ?
                  RETURNING *",
            )
            .bind(DownloadQueueStatus::Downloading.as_str())
            .bind(self.now())
            .bind(candidate.id)
            .bind(&candidate.status_str)
            .bind(candidate.retry_count)
            .fetch_optional(self.db.pool())
            .await?;

            if let Some(entry) = claimed {
                debug!(id = entry.id, chapter_id = entry.chapter_id, "entry claimed");
                self.notify();
                return Ok(Some(entry));
            }
            debug!(id = candidate.id, "entry changed before claim, trying next");
        }
        Ok(None)
    }

    /// Sets the status and, optionally, the attempt time and error message.
    ///
    /// Fields left as [`FieldUpdate::Keep`] are not touched.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ItemNotFound`] if no entry has this id.
    /// Returns [`QueueError::Database`] if the update fails.
    #[instrument(skip(self, update), fields(status = %update.status))]
    pub async fn update_status(&self, id: i64, update: EntryUpdate) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE download_queue
              SET status = ?,
                  last_attempt_at = CASE ? WHEN 0 THEN last_attempt_at WHEN 1 THEN ? ELSE NULL END,
                  last_error_message = CASE ? WHEN 0 THEN last_error_message WHEN 1 THEN ? ELSE NULL END
              WHERE id = ?",
        )
        .bind(update.status.as_str())
        .bind(update.last_attempt_at.mode())
        .bind(update.last_attempt_at.value().copied())
        .bind(update.last_error_message.mode())
        .bind(update.last_error_message.value().cloned())
        .bind(id)
        .execute(self.db.pool())
        .await?;

        self.check_affected(id, result.rows_affected())
    }

    /// Records a failed attempt for a chapter.
    ///
    /// Sets `failed`, bumps `retry_count`, stamps `last_attempt_at` and
    /// stores the message and classification, all in one statement.
    /// Returns `false` without error when the chapter has no entry (it was
    /// removed while the download ran).
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the update fails.
    #[instrument(skip(self, error_message, error_type), fields(error_type = %error_type))]
    pub async fn record_failure(
        &self,
        chapter_id: i64,
        error_message: &str,
        error_type: DownloadErrorType,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"UPDATE download_queue
              SET status = ?,
                  retry_count = retry_count + 1,
                  last_attempt_at = ?,
                  last_error_message = ?,
                  error_type = ?
              WHERE chapter_id = ?",
        )
        .bind(DownloadQueueStatus::Failed.as_str())
        .bind(self.now())
        .bind(error_message)
        .bind(error_type.as_str())
        .bind(chapter_id)
        .execute(self.db.pool())
        .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            self.notify();
        } else {
            debug!("no entry for chapter, failure not recorded");
        }
        Ok(updated)
    }

    /// Marks a chapter completed. Idempotent.
    ///
    /// Returns `false` without error when the chapter has no entry.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn mark_completed(&self, chapter_id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE download_queue SET status = ? WHERE chapter_id = ?")
            .bind(DownloadQueueStatus::Completed.as_str())
            .bind(chapter_id)
            .execute(self.db.pool())
            .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            self.notify();
        } else {
            debug!("no entry for chapter, nothing to complete");
        }
        Ok(updated)
    }

    /// Changes an entry's ordering key. Status and retry count are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ItemNotFound`] if no entry has this id.
    /// Returns [`QueueError::Database`] if the update fails.
    #[instrument(skip(self, priority))]
    pub async fn update_priority(&self, id: i64, priority: impl Into<i64> + Send) -> Result<()> {
        let result = sqlx::query("UPDATE download_queue SET priority = ? WHERE id = ?")
            .bind(priority.into())
            .bind(id)
            .execute(self.db.pool())
            .await?;

        self.check_affected(id, result.rows_affected())
    }

    fn check_affected(&self, id: i64, rows_affected: u64) -> Result<()> {
        if rows_affected == 0 {
            Err(QueueError::ItemNotFound(id))
        } else {
            self.notify();
            Ok(())
        }
    }

    // ==================== Removal ====================

    /// Removes the entry for a chapter. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn remove_by_chapter_id(&self, chapter_id: i64) -> Result<u64> {
        self.delete_where("chapter_id = ?", chapter_id).await
    }

    /// Removes an entry by id. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn remove_by_id(&self, id: i64) -> Result<u64> {
        self.delete_where("id = ?", id).await
    }

    /// Removes every entry of a manga. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn remove_by_manga_id(&self, manga_id: i64) -> Result<u64> {
        self.delete_where("manga_id = ?", manga_id).await
    }

    async fn delete_where(&self, predicate: &str, key: i64) -> Result<u64> {
        let sql = format!("DELETE FROM download_queue WHERE {predicate}");
        let result = sqlx::query(&sql)
            .bind(key)
            .execute(self.db.pool())
            .await?;
        self.notify_if_changed(result.rows_affected());
        Ok(result.rows_affected())
    }

    // ==================== Bulk transitions ====================

    /// Deletes all completed entries.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn clear_completed(&self) -> Result<u64> {
        let sql = format!(
            "DELETE FROM download_queue WHERE {}",
            status_clause(DownloadQueueStatus::Completed)
        );
        let result = sqlx::query(&sql).execute(self.db.pool()).await?;
        self.notify_if_changed(result.rows_affected());
        Ok(result.rows_affected())
    }

    /// Deletes every entry, including ones a worker is downloading.
    ///
    /// In-flight work is abandoned, not cancelled: workers notice the entry
    /// is gone when they next look it up.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM download_queue")
            .execute(self.db.pool())
            .await?;
        info!(removed = result.rows_affected(), "queue cleared");
        self.notify_if_changed(result.rows_affected());
        Ok(result.rows_affected())
    }

    /// Moves every failed entry back to pending, ignoring backoff and
    /// retryability. Retry counts are kept.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn reset_failed_to_pending(&self) -> Result<u64> {
        let sql = format!(
            "UPDATE download_queue SET status = ? WHERE {}",
            status_clause(DownloadQueueStatus::Failed)
        );
        let result = sqlx::query(&sql)
            .bind(DownloadQueueStatus::Pending.as_str())
            .execute(self.db.pool())
            .await?;
        info!(reset = result.rows_affected(), "failed entries reset to pending");
        self.notify_if_changed(result.rows_affected());
        Ok(result.rows_affected())
    }

    /// Returns entries stuck in `downloading` to `pending`.
    ///
    /// An entry is stuck when its last attempt (its claim time, or its
    /// creation time if it was never stamped) is older than `threshold`.
    /// Retry counts are unchanged: a dead worker is not a failed download.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the update fails.
    #[instrument(skip(self), fields(threshold_ms = threshold.as_millis()))]
    pub async fn reset_stuck_downloads(&self, threshold: Duration) -> Result<u64> {
        let cutoff = self.now().saturating_sub(duration_millis(threshold));
        let sql = format!(
            "UPDATE download_queue SET status = ?
             WHERE {} AND COALESCE(last_attempt_at, added_at) < ?",
            status_clause(DownloadQueueStatus::Downloading)
        );
        let result = sqlx::query(&sql)
            .bind(DownloadQueueStatus::Pending.as_str())
            .bind(cutoff)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() > 0 {
            info!(reset = result.rows_affected(), "recovered stuck downloads");
        }
        self.notify_if_changed(result.rows_affected());
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    // Behavioural coverage lives in tests/queue_integration.rs; these pin
    // the SQL helpers and the in-memory happy path.

    use super::*;
    use crate::clock::ManualClock;

    async fn memory_queue() -> (DownloadQueue, ManualClock) {
        let clock = ManualClock::new(1_000_000);
        let db = Database::new_in_memory().await.unwrap();
        let queue = DownloadQueue::new(db).with_clock(Arc::new(clock.clone()));
        (queue, clock)
    }

    #[test]
    fn test_status_clause_pending_excludes_other_statuses() {
        let clause = status_clause(DownloadQueueStatus::Pending);
        assert!(clause.starts_with("LOWER(TRIM(status)) NOT IN"));
        assert!(clause.contains("'downloading'"));
        assert!(clause.contains("'failed'"));
        assert!(clause.contains("'completed'"));
    }

    #[test]
    fn test_status_clause_other_statuses_match_exactly() {
        assert_eq!(
            status_clause(DownloadQueueStatus::Failed),
            "LOWER(TRIM(status)) = 'failed'"
        );
    }

    #[test]
    fn test_retryable_clause_lists_non_retryable_types() {
        let clause = retryable_clause();
        assert!(clause.contains("'disk_full'"));
        assert!(clause.contains("'chapter_not_found'"));
        assert!(!clause.contains("'network_error'"));
    }

    #[test]
    fn test_priority_into_i64() {
        assert_eq!(i64::from(DownloadPriority::Urgent), 2);
    }

    #[tokio::test]
    async fn test_add_then_get_by_chapter_id() {
        let (queue, _clock) = memory_queue().await;

        let id = queue.add(1, 10, DownloadPriority::High).await.unwrap().unwrap();
        let entry = queue.get_by_chapter_id(10).await.unwrap().unwrap();

        assert_eq!(entry.id, id);
        assert_eq!(entry.status(), DownloadQueueStatus::Pending);
        assert_eq!(entry.download_priority(), DownloadPriority::High);
        assert_eq!(entry.added_at, 1_000_000);
        assert_eq!(entry.retry_count, 0);
        assert_eq!(entry.last_attempt_at, None);
    }

    #[tokio::test]
    async fn test_update_priority_missing_id_is_not_found() {
        let (queue, _clock) = memory_queue().await;
        let result = queue.update_priority(99, DownloadPriority::Low).await;
        assert!(matches!(result, Err(QueueError::ItemNotFound(99))));
    }

    #[tokio::test]
    async fn test_claim_next_stamps_claim_time() {
        let (queue, clock) = memory_queue().await;
        queue.add(1, 10, DownloadPriority::Normal).await.unwrap();
        clock.advance(Duration::from_secs(5));

        let entry = queue.claim_next().await.unwrap().unwrap();

        assert_eq!(entry.status(), DownloadQueueStatus::Downloading);
        assert_eq!(entry.last_attempt_at, Some(1_005_000));
        assert!(queue.claim_next().await.unwrap().is_none());
    }
}
