//! SQLite corruption and WAL behaviour.

use chapter_queue::{Database, DbError};

use crate::support::critical_utils::{corrupted_database, file_database};

#[tokio::test]
async fn p0_corrupted_database_open_fails() {
    let (_temp, path) = corrupted_database();

    let result = Database::new(path.as_path()).await;

    assert!(result.is_err(), "opening corrupted DB should fail");
    let err = result.unwrap_err();
    assert!(
        matches!(&err, DbError::Connection(_) | DbError::Migration(_)),
        "expected DbError::Connection or DbError::Migration, got {err:?}"
    );
}

#[tokio::test]
async fn p0_valid_database_wal_enabled() {
    let (_temp, _path, db) = file_database("good.db").await;

    let wal = db.is_wal_enabled().await.expect("pragma journal_mode");
    assert!(wal, "WAL mode should be enabled on file-based DB");
}

#[tokio::test]
async fn p0_chapter_uniqueness_enforced_by_schema() {
    let (_temp, _path, db) = file_database("unique.db").await;

    sqlx::query(
        "INSERT INTO download_queue (manga_id, chapter_id, added_at) VALUES (1, 10, 0)",
    )
    .execute(db.pool())
    .await
    .expect("first insert");
    let second = sqlx::query(
        "INSERT INTO download_queue (manga_id, chapter_id, added_at) VALUES (1, 10, 0)",
    )
    .execute(db.pool())
    .await;

    assert!(second.is_err(), "raw duplicate insert must violate the unique index");
}
