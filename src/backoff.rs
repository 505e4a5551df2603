//! Failure classification and retry backoff for queued chapters.
//!
//! A worker classifies every failed attempt into a [`DownloadErrorType`]
//! before recording it. The [`BackoffPolicy`] then decides when, if ever,
//! the entry becomes eligible for another attempt.
//!
//! # Delay Calculation
//!
//! ```text
//! delay = min(base * multiplier * 2^(max(retry_count, 1) - 1), max_delay)
//! ```
//!
//! With the defaults (30s base, 6h cap) a network error waits 30s, 60s,
//! 120s, ... and an unknown error waits twice as long. Error types with a
//! multiplier of `0.0` are never retried automatically.
//!
//! # Example
//!
//! ```
//! use chapter_queue::{BackoffDelay, BackoffPolicy, DownloadErrorType};
//! use std::time::Duration;
//!
//! let policy = BackoffPolicy::default();
//! assert_eq!(
//!     policy.backoff_delay(1, DownloadErrorType::NetworkError),
//!     BackoffDelay::After(Duration::from_secs(30))
//! );
//! assert_eq!(
//!     policy.backoff_delay(1, DownloadErrorType::DiskFull),
//!     BackoffDelay::Never
//! );
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::duration_millis;
use crate::queue::{DownloadQueueEntry, DownloadQueueStatus};

/// Default base delay for the first retry (30 seconds).
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(30);

/// Default maximum delay cap (6 hours).
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(6 * 60 * 60);

/// Exponent cap; 2^32 times any sane base already exceeds every cap.
const MAX_EXPONENT: i32 = 32;

/// Classification of a failed chapter download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadErrorType {
    /// Connection, timeout or other transport failure.
    NetworkError,
    /// The source site answered with an error or unparseable content.
    SourceError,
    /// Local storage is full. Retrying would spin uselessly.
    DiskFull,
    /// The source no longer has the chapter.
    ChapterNotFound,
    /// Anything the worker could not classify.
    Unknown,
}

impl DownloadErrorType {
    /// All error types.
    pub const ALL: [Self; 5] = [
        Self::NetworkError,
        Self::SourceError,
        Self::DiskFull,
        Self::ChapterNotFound,
        Self::Unknown,
    ];

    /// Whether entries failing with this type are ever retried automatically.
    #[must_use]
    pub fn can_retry(self) -> bool {
        match self {
            Self::NetworkError | Self::SourceError | Self::Unknown => true,
            Self::DiskFull | Self::ChapterNotFound => false,
        }
    }

    /// Scales the backoff window. `0.0` marks a non-retryable type.
    ///
    /// Less specific failures wait longer.
    #[must_use]
    pub fn backoff_multiplier(self) -> f64 {
        match self {
            Self::NetworkError => 1.0,
            Self::SourceError => 1.5,
            Self::Unknown => 2.0,
            Self::DiskFull | Self::ChapterNotFound => 0.0,
        }
    }

    /// Returns the storage representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "network_error",
            Self::SourceError => "source_error",
            Self::DiskFull => "disk_full",
            Self::ChapterNotFound => "chapter_not_found",
            Self::Unknown => "unknown",
        }
    }

    /// Parses stored text, falling back to `Unknown`.
    #[must_use]
    pub fn from_str_lenient(value: &str) -> Self {
        value.parse().unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for DownloadErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DownloadErrorType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "network_error" | "network" => Ok(Self::NetworkError),
            "source_error" | "source" => Ok(Self::SourceError),
            "disk_full" => Ok(Self::DiskFull),
            "chapter_not_found" | "not_found" => Ok(Self::ChapterNotFound),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("invalid download error type: {value}")),
        }
    }
}

/// How long a failed entry must wait before its next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffDelay {
    /// Eligible once this much time has passed since the last attempt.
    After(Duration),
    /// Never eligible automatically.
    Never,
}

impl BackoffDelay {
    /// Returns the delay, or `None` for [`BackoffDelay::Never`].
    #[must_use]
    pub fn duration(self) -> Option<Duration> {
        match self {
            Self::After(delay) => Some(delay),
            Self::Never => None,
        }
    }
}

impl PartialOrd for BackoffDelay {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BackoffDelay {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (Self::After(a), Self::After(b)) => a.cmp(b),
            (Self::After(_), Self::Never) => Ordering::Less,
            (Self::Never, Self::After(_)) => Ordering::Greater,
            (Self::Never, Self::Never) => Ordering::Equal,
        }
    }
}

/// Exponential backoff configuration for failed entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BACKOFF_BASE,
            max_delay: DEFAULT_BACKOFF_MAX,
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy. `max_delay` is raised to `base_delay` if smaller.
    #[must_use]
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay before an entry with `retry_count` failures of `error_type`
    /// may be attempted again.
    ///
    /// Non-decreasing in `retry_count`; `Never` for non-retryable types.
    #[must_use]
    pub fn backoff_delay(&self, retry_count: i64, error_type: DownloadErrorType) -> BackoffDelay {
        if !error_type.can_retry() {
            return BackoffDelay::Never;
        }

        let multiplier = error_type.backoff_multiplier();
        if multiplier <= 0.0 {
            return BackoffDelay::Never;
        }

        let exponent = i32::try_from(retry_count.max(1) - 1)
            .unwrap_or(MAX_EXPONENT)
            .min(MAX_EXPONENT);
        let delay_secs = self.base_delay.as_secs_f64() * multiplier * 2f64.powi(exponent);
        let capped_secs = delay_secs.min(self.max_delay.as_secs_f64());

        BackoffDelay::After(Duration::try_from_secs_f64(capped_secs).unwrap_or(self.max_delay))
    }

    /// Epoch millis at which a failed entry becomes eligible again, or `None`
    /// when it never does.
    ///
    /// Entries without a recorded error type are treated as `Unknown`;
    /// entries never attempted are due immediately.
    #[must_use]
    pub fn retry_due_at(&self, entry: &DownloadQueueEntry) -> Option<i64> {
        let error_type = entry.error_type().unwrap_or(DownloadErrorType::Unknown);
        let delay = self.backoff_delay(entry.retry_count, error_type).duration()?;
        let Some(last_attempt_at) = entry.last_attempt_at else {
            return Some(i64::MIN);
        };
        Some(last_attempt_at.saturating_add(duration_millis(delay)))
    }

    /// Whether `entry` should be handed to a worker at `now_millis`.
    ///
    /// Pending entries always are; failed entries only once their backoff
    /// window has elapsed; downloading and completed entries never.
    #[must_use]
    pub fn is_ready(&self, entry: &DownloadQueueEntry, now_millis: i64) -> bool {
        match entry.status() {
            DownloadQueueStatus::Pending => true,
            DownloadQueueStatus::Failed => self
                .retry_due_at(entry)
                .is_some_and(|due_at| now_millis >= due_at),
            DownloadQueueStatus::Downloading | DownloadQueueStatus::Completed => false,
        }
    }
}
