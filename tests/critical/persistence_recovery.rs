//! Re-open the database after a normal close; queue state persists.

use chapter_queue::{
    Database, DownloadErrorType, DownloadPriority, DownloadQueue, DownloadQueueStatus,
};
use tempfile::TempDir;

#[tokio::test]
async fn p0_failure_state_persists_after_reopen() {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("persist.db");

    {
        let db = Database::new(&db_path).await.expect("create db");
        let queue = DownloadQueue::new(db.clone());
        queue
            .add(1, 10, DownloadPriority::Urgent)
            .await
            .expect("add");
        queue
            .record_failure(10, "HTTP 502", DownloadErrorType::SourceError)
            .await
            .expect("record failure");
        db.close().await;
    }

    let db = Database::new(&db_path).await.expect("reopen db");
    let queue = DownloadQueue::new(db);
    let entry = queue
        .get_by_chapter_id(10)
        .await
        .expect("get")
        .expect("entry still there");
    assert_eq!(entry.status(), DownloadQueueStatus::Failed);
    assert_eq!(entry.download_priority(), DownloadPriority::Urgent);
    assert_eq!(entry.retry_count, 1);
    assert_eq!(entry.error_type(), Some(DownloadErrorType::SourceError));
    assert_eq!(entry.last_error_message.as_deref(), Some("HTTP 502"));
}

#[tokio::test]
async fn p0_wal_mode_after_reopen() {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("wal.db");

    let db = Database::new(&db_path).await.expect("create db");
    let wal1 = db.is_wal_enabled().await.expect("pragma");
    db.close().await;

    let db = Database::new(&db_path).await.expect("reopen db");
    let wal2 = db.is_wal_enabled().await.expect("pragma");
    assert!(wal1 && wal2, "WAL should remain enabled after reopen");
}

#[tokio::test]
async fn p0_two_handles_share_one_store() {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("shared.db");

    let writer = DownloadQueue::new(Database::new(&db_path).await.expect("open writer"));
    let reader = DownloadQueue::new(Database::new(&db_path).await.expect("open reader"));

    writer.add(1, 10, DownloadPriority::Normal).await.expect("add");
    assert!(reader.add(1, 10, DownloadPriority::High).await.expect("add").is_none());
    assert_eq!(reader.get_all().await.expect("list").len(), 1);
}
