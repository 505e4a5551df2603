//! Worker crashes: entries left in `downloading` come back after the threshold.

use std::sync::Arc;
use std::time::Duration;

use chapter_queue::{Database, DownloadPriority, DownloadQueue, DownloadQueueStatus, ManualClock};
use tempfile::TempDir;

#[tokio::test]
async fn p0_claimed_entry_recovered_after_restart() {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("crash.db");
    let clock = ManualClock::new(10_000_000);

    {
        let db = Database::new(&db_path).await.expect("create db");
        let queue = DownloadQueue::new(db).with_clock(Arc::new(clock.clone()));
        queue.add(1, 10, DownloadPriority::Normal).await.expect("add");
        queue.claim_next().await.expect("claim").expect("entry");
        // Process dies here without closing the pool.
    }

    clock.advance(Duration::from_secs(45 * 60));
    let db = Database::new(&db_path).await.expect("reopen db");
    let queue = DownloadQueue::new(db).with_clock(Arc::new(clock.clone()));

    assert!(queue.claim_next().await.expect("claim").is_none());
    let reset = queue
        .reset_stuck_downloads(Duration::from_secs(30 * 60))
        .await
        .expect("reset");
    assert_eq!(reset, 1);

    let entry = queue.claim_next().await.expect("claim").expect("recovered entry");
    assert_eq!(entry.chapter_id, 10);
    assert_eq!(entry.retry_count, 0);
    assert_eq!(entry.status(), DownloadQueueStatus::Downloading);
}
