// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::*;

fn ddls() -> Vec<SqliteQuery<'static>> {
    vec![sqlx::query(
        "CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL)",
    )]
}

async fn version(db: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT max(version) FROM _meta")
        .fetch_one(db)
        .await
        .unwrap()
}

#[tokio::test]
async fn init_db_stamps_new_databases() {
    let db = open_memory().await.unwrap();
    init_db(&db, "test", 3, ddls()).await.unwrap();
    assert_eq!(version(&db).await, 3);
    sqlx::query("INSERT INTO notes (body) VALUES ('hello')")
        .execute(&db)
        .await
        .unwrap();
}

#[tokio::test]
async fn init_db_is_idempotent() {
    let db = open_memory().await.unwrap();
    init_db(&db, "test", 1, ddls()).await.unwrap();
    sqlx::query("INSERT INTO notes (body) VALUES ('kept')")
        .execute(&db)
        .await
        .unwrap();
    init_db(&db, "test", 1, ddls()).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM notes")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(count, 1);
    let stamps: i64 = sqlx::query_scalar("SELECT count(*) FROM _meta")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(stamps, 1);
}

#[tokio::test]
async fn init_db_rejects_other_versions() {
    let db = open_memory().await.unwrap();
    init_db(&db, "test", 2, ddls()).await.unwrap();
    let newer = init_db(&db, "test", 1, ddls()).await.unwrap_err();
    assert!(newer.to_string().contains("schema version 2"), "{newer}");
    assert!(init_db(&db, "test", 3, ddls()).await.is_err());
    assert_eq!(version(&db).await, 2);
}

#[tokio::test]
async fn open_file_creates_parent_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("catalog.db");
    let db = open_file(&path).await.unwrap();
    init_db(&db, "test", 1, ddls()).await.unwrap();
    assert!(path.exists());
}
