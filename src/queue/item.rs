//! Queue entry types, priorities and status definitions.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::backoff::DownloadErrorType;

/// Status of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadQueueStatus {
    /// Eligible to be picked up by a worker.
    Pending,
    /// Claimed by a worker.
    Downloading,
    /// Last attempt failed; may or may not be retry-eligible.
    Failed,
    /// Downloaded. Terminal until the entry is removed.
    Completed,
}

impl DownloadQueueStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::Downloading,
        Self::Failed,
        Self::Completed,
    ];

    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Failed => "failed",
            Self::Completed => "completed",
        }
    }

    /// Parses a stored status, falling back to `Pending` for unknown text.
    ///
    /// A corrupt status must never stop an entry from being processed again.
    #[must_use]
    pub fn from_str_lenient(value: &str) -> Self {
        value.parse().unwrap_or(Self::Pending)
    }
}

impl fmt::Display for DownloadQueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DownloadQueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "downloading" => Ok(Self::Downloading),
            "failed" => Ok(Self::Failed),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("invalid queue status: {s}")),
        }
    }
}

/// Source of an entry's `priority` value. Higher values are served first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DownloadPriority {
    /// Chapters discovered by a library update.
    Low,
    /// History-based auto-download.
    #[default]
    Normal,
    /// Next chapter of an in-progress read.
    High,
    /// Explicit user request.
    Urgent,
}

impl DownloadPriority {
    /// Numeric value stored in the queue.
    #[must_use]
    pub fn value(self) -> i64 {
        match self {
            Self::Low => -1,
            Self::Normal => 0,
            Self::High => 1,
            Self::Urgent => 2,
        }
    }

    /// Maps a stored value back to a priority; unknown values are `Normal`.
    #[must_use]
    pub fn from_value(value: i64) -> Self {
        match value {
            -1 => Self::Low,
            1 => Self::High,
            2 => Self::Urgent,
            _ => Self::Normal,
        }
    }

    /// Returns the label used in CLI arguments and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl fmt::Display for DownloadPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DownloadPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => other
                .parse::<i64>()
                .map(Self::from_value)
                .map_err(|_| format!("invalid download priority: {s}")),
        }
    }
}

/// One chapter queued for download.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct DownloadQueueEntry {
    /// Store-assigned identifier.
    pub id: i64,
    pub manga_id: i64,
    pub chapter_id: i64,
    /// Ordering key; see [`DownloadPriority`].
    pub priority: i64,
    /// Creation time, epoch millis.
    pub added_at: i64,
    /// Failed attempts so far.
    pub retry_count: i64,
    /// Most recent attempt (claim or failure), epoch millis.
    pub last_attempt_at: Option<i64>,
    /// Human-readable reason of the last failure.
    pub last_error_message: Option<String>,
    /// Classification of the last failure (stored as text, parsed via `error_type()`).
    #[sqlx(rename = "error_type")]
    pub error_type_str: Option<String>,
    /// Current status (stored as text, parsed via `status()`).
    #[sqlx(rename = "status")]
    pub status_str: String,
}

impl DownloadQueueEntry {
    /// Returns the parsed status. Unknown text reads as `Pending`.
    #[must_use]
    pub fn status(&self) -> DownloadQueueStatus {
        DownloadQueueStatus::from_str_lenient(&self.status_str)
    }

    /// Returns the priority enum. Unknown values read as `Normal`.
    #[must_use]
    pub fn download_priority(&self) -> DownloadPriority {
        DownloadPriority::from_value(self.priority)
    }

    /// Returns the recorded failure classification, if any.
    #[must_use]
    pub fn error_type(&self) -> Option<DownloadErrorType> {
        self.error_type_str
            .as_deref()
            .map(DownloadErrorType::from_str_lenient)
    }
}

impl fmt::Display for DownloadQueueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DownloadQueueEntry {{ id: {}, manga: {}, chapter: {}, priority: {}, status: {}, retries: {} }}",
            self.id,
            self.manga_id,
            self.chapter_id,
            self.download_priority(),
            self.status(),
            self.retry_count
        )
    }
}

/// Serializable view of an entry with parsed enums, used for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct EntrySnapshot {
    pub id: i64,
    pub manga_id: i64,
    pub chapter_id: i64,
    pub priority: i64,
    pub added_at: i64,
    pub retry_count: i64,
    pub last_attempt_at: Option<i64>,
    pub last_error_message: Option<String>,
    pub error_type: Option<DownloadErrorType>,
    pub status: DownloadQueueStatus,
}

impl From<&DownloadQueueEntry> for EntrySnapshot {
    fn from(entry: &DownloadQueueEntry) -> Self {
        Self {
            id: entry.id,
            manga_id: entry.manga_id,
            chapter_id: entry.chapter_id,
            priority: entry.priority,
            added_at: entry.added_at,
            retry_count: entry.retry_count,
            last_attempt_at: entry.last_attempt_at,
            last_error_message: entry.last_error_message.clone(),
            error_type: entry.error_type(),
            status: entry.status(),
        }
    }
}

/// How a partial update treats one nullable column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldUpdate<T> {
    /// Leave the stored value unchanged.
    #[default]
    Keep,
    /// Overwrite with a value.
    Set(T),
    /// Overwrite with NULL.
    Clear,
}

impl<T> FieldUpdate<T> {
    /// Mode flag bound into SQL `CASE` expressions: 0 keep, 1 set, 2 clear.
    pub(crate) fn mode(&self) -> i64 {
        match self {
            Self::Keep => 0,
            Self::Set(_) => 1,
            Self::Clear => 2,
        }
    }

    pub(crate) fn value(&self) -> Option<&T> {
        match self {
            Self::Set(value) => Some(value),
            Self::Keep | Self::Clear => None,
        }
    }
}

/// Partial update applied by `update_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryUpdate {
    pub status: DownloadQueueStatus,
    pub last_attempt_at: FieldUpdate<i64>,
    pub last_error_message: FieldUpdate<String>,
}

impl EntryUpdate {
    /// Changes only the status.
    #[must_use]
    pub fn status(status: DownloadQueueStatus) -> Self {
        Self {
            status,
            last_attempt_at: FieldUpdate::Keep,
            last_error_message: FieldUpdate::Keep,
        }
    }

    #[must_use]
    pub fn with_last_attempt_at(mut self, at: i64) -> Self {
        self.last_attempt_at = FieldUpdate::Set(at);
        self
    }

    #[must_use]
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.last_error_message = FieldUpdate::Set(message.into());
        self
    }

    #[must_use]
    pub fn clear_error_message(mut self) -> Self {
        self.last_error_message = FieldUpdate::Clear;
        self
    }
}

/// One `(manga, chapter)` pair for batch enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NewEntry {
    pub manga_id: i64,
    pub chapter_id: i64,
}

impl NewEntry {
    #[must_use]
    pub fn new(manga_id: i64, chapter_id: i64) -> Self {
        Self {
            manga_id,
            chapter_id,
        }
    }
}
