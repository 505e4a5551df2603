//! Concurrent workers claiming from one queue.

use chapter_queue::queue::NewEntry;
use chapter_queue::{DownloadPriority, DownloadQueue, DownloadQueueStatus};

use crate::support::critical_utils::{concurrent_claimers, file_database};

#[tokio::test]
async fn p0_concurrent_claims_never_hand_out_an_entry_twice() {
    let (_temp, _path, db) = file_database("race.db").await;
    let queue = DownloadQueue::new(db);
    let entries: Vec<NewEntry> = (0..60).map(|chapter| NewEntry::new(1, chapter)).collect();
    queue
        .add_all(&entries, DownloadPriority::Normal)
        .await
        .expect("add_all");

    let result = concurrent_claimers(queue.clone(), 8).await;

    assert!(
        result.duplicates().is_empty(),
        "entries claimed twice: {:?}",
        result.duplicates()
    );
    assert_eq!(result.claimed.len(), 60);
    assert_eq!(
        queue
            .count_by_status(DownloadQueueStatus::Completed)
            .await
            .expect("count"),
        60
    );
}

#[tokio::test]
async fn p0_concurrent_adds_of_same_chapter_create_one_entry() {
    let (_temp, _path, db) = file_database("dup.db").await;
    let queue = DownloadQueue::new(db);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let q = queue.clone();
        handles.push(tokio::spawn(async move {
            loop {
                match q.add(1, 77, DownloadPriority::Normal).await {
                    Ok(id) => return id,
                    Err(e) if e.is_busy_or_locked() => {}
                    Err(e) => panic!("add failed: {e}"),
                }
            }
        }));
    }

    let mut inserted = 0;
    for handle in handles {
        if handle.await.expect("task").is_some() {
            inserted += 1;
        }
    }

    assert_eq!(inserted, 1);
    assert_eq!(queue.get_all().await.expect("list").len(), 1);
}

#[tokio::test]
async fn p0_removal_during_claim_leaves_no_orphan_writes() {
    let (_temp, _path, db) = file_database("remove.db").await;
    let queue = DownloadQueue::new(db);
    queue.add(1, 10, DownloadPriority::Normal).await.expect("add");

    let entry = queue.claim_next().await.expect("claim").expect("entry");
    assert_eq!(queue.remove_by_id(entry.id).await.expect("remove"), 1);

    assert!(!queue.mark_completed(entry.chapter_id).await.expect("complete"));
    assert!(queue.get_all().await.expect("list").is_empty());
}
