//! Shared utilities for critical tests (corrupted stores, concurrent workers).
//!
//! Used by tests under `tests/critical/` to create broken database files and
//! to run several claiming workers against one queue.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chapter_queue::{Database, DownloadQueue};
use tempfile::TempDir;
use tokio::sync::Barrier;

/// Creates a SQLite database file that is intentionally corrupted (invalid content).
///
/// Returns the path to the corrupted file and a `TempDir` that must be kept alive
/// for the path to remain valid. Opening this path with `Database::new()` should
/// yield `DbError::Connection` or `DbError::Migration`.
pub fn corrupted_database() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("corrupted.db");

    std::fs::write(&db_path, b"not a valid sqlite file\x00\x00\x00")
        .expect("Failed to write corrupted db file");

    (temp_dir, db_path)
}

/// Creates a file-backed queue database and returns it with its `TempDir`.
pub async fn file_database(name: &str) -> (TempDir, PathBuf, Database) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join(name);
    let db = Database::new(&db_path).await.expect("create db");
    (temp_dir, db_path, db)
}

/// Outcome of [`concurrent_claimers`].
#[derive(Debug, Default)]
#[allow(dead_code)]
pub struct ClaimResult {
    /// Every entry id handed out, in claim order per worker.
    pub claimed: Vec<i64>,
    /// Claims that came back busy and were retried.
    pub busy_retries: usize,
}

impl ClaimResult {
    /// Ids that were handed out more than once.
    pub fn duplicates(&self) -> Vec<i64> {
        let mut seen = HashSet::new();
        self.claimed
            .iter()
            .copied()
            .filter(|id| !seen.insert(*id))
            .collect()
    }
}

/// Runs `workers` tasks that each call `claim_next` until the queue is
/// drained, all released at once by a barrier. Completes each claimed entry.
pub async fn concurrent_claimers(queue: DownloadQueue, workers: usize) -> ClaimResult {
    let barrier = Arc::new(Barrier::new(workers));
    let result = Arc::new(Mutex::new(ClaimResult::default()));

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let q = queue.clone();
        let bar = Arc::clone(&barrier);
        let res = Arc::clone(&result);
        handles.push(tokio::spawn(async move {
            bar.wait().await;
            loop {
                match q.claim_next().await {
                    Ok(Some(entry)) => {
                        res.lock().unwrap().claimed.push(entry.id);
                        q.mark_completed(entry.chapter_id).await.expect("complete");
                    }
                    Ok(None) => break,
                    Err(e) if e.is_busy_or_locked() => {
                        res.lock().unwrap().busy_retries += 1;
                    }
                    Err(e) => panic!("claim failed: {e}"),
                }
            }
        }));
    }

    for handle in handles {
        handle.await.expect("claimer task panicked");
    }

    Arc::try_unwrap(result)
        .expect("all claimers finished")
        .into_inner()
        .unwrap()
}
