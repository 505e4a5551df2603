//! Catalogue types and collaborator traits consumed by the selector.
//!
//! The selector only reads through these traits; the reading history,
//! manga library and chapter list live elsewhere in the application.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::AutoDownloadError;

/// A manga in the user's library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manga {
    pub id: i64,
    pub title: String,
}

/// A chapter of a manga.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: i64,
    pub manga_id: i64,
    /// Position within the manga; fractional for extras (e.g. 10.5).
    pub chapter_number: f64,
    pub name: String,
    pub read: bool,
}

/// One reading-history row joined with its manga and chapter ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryWithRelations {
    pub manga_id: i64,
    pub chapter_id: i64,
    /// When the chapter was last read, epoch millis.
    pub read_at: i64,
}

/// Reading history.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// History rows read strictly after `cutoff_millis`.
    async fn get_history_for_auto_download(
        &self,
        cutoff_millis: i64,
    ) -> Result<Vec<HistoryWithRelations>, AutoDownloadError>;
}

/// Manga lookup.
#[async_trait]
pub trait MangaSource: Send + Sync {
    /// Returns `None` when the manga no longer exists.
    async fn get_manga(&self, manga_id: i64) -> Result<Option<Manga>, AutoDownloadError>;
}

/// Chapter listing.
#[async_trait]
pub trait ChapterSource: Send + Sync {
    /// Chapters of `manga_id` strictly after `from_chapter_id`, ascending by
    /// chapter number. With `only_unread`, read chapters are left out.
    async fn get_next_chapters(
        &self,
        manga_id: i64,
        from_chapter_id: i64,
        only_unread: bool,
    ) -> Result<Vec<Chapter>, AutoDownloadError>;
}

/// Auto-download settings.
pub trait AutoDownloadPreferences: Send + Sync {
    /// Whether history-based auto-download is on.
    fn auto_download_enabled(&self) -> bool;

    /// How many days of history to consider. Values below 1 act as 1.
    fn lookback_days(&self) -> i64;

    /// Maximum chapters queued per manga. Values below 1 act as 1.
    fn chapters_per_manga(&self) -> i64;
}
