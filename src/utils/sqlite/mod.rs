// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! `SQLite` pools for the catalog, and a single-version `_meta` table that
//! refuses databases written by another schema.

#[cfg(test)]
mod tests;

use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use sqlx::{
    SqlitePool,
    query::Query,
    sqlite::{SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous},
};
use tracing::info;

pub type SqliteQuery<'q> = Query<'q, sqlx::Sqlite, SqliteArguments<'q>>;

pub async fn open_file(file: &Path) -> anyhow::Result<SqlitePool> {
    if let Some(dir) = file.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let options = SqliteConnectOptions::new()
        .filename(file)
        .create_if_missing(true);
    Ok(open(options).await?)
}

/// A fresh in-memory database, private to the returned pool.
pub async fn open_memory() -> sqlx::Result<SqlitePool> {
    // sqlx names every parsed `:memory:` database uniquely and shares it
    // between the pool's connections.
    open(":memory:".parse()?).await
}

pub async fn open(options: SqliteConnectOptions) -> sqlx::Result<SqlitePool> {
    // The reconciler and the HTTP server write while `inspect` reads.
    let options = options
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);
    SqlitePool::connect_with(options).await
}

/// Creates the tables of an empty database and stamps it with
/// `schema_version`. A database stamped with any other version is an error,
/// there are no migrations.
pub async fn init_db<'q>(
    db: &SqlitePool,
    name: &str,
    schema_version: i64,
    ddls: impl IntoIterator<Item = SqliteQuery<'q>>,
) -> anyhow::Result<()> {
    let mut tx = db.begin().await?;
    sqlx::query("CREATE TABLE IF NOT EXISTS _meta (version INTEGER NOT NULL)")
        .execute(tx.as_mut())
        .await?;
    let found: Option<i64> = sqlx::query_scalar("SELECT max(version) FROM _meta")
        .fetch_one(tx.as_mut())
        .await
        .with_context(|| format!("failed to read the {name} database version"))?;
    match found {
        None => {
            for ddl in ddls {
                ddl.execute(tx.as_mut()).await?;
            }
            sqlx::query("INSERT INTO _meta (version) VALUES (?)")
                .bind(schema_version)
                .execute(tx.as_mut())
                .await?;
            info!("created {name} database at schema version {schema_version}");
        }
        Some(version) => anyhow::ensure!(
            version == schema_version,
            "{name} database has schema version {version}, this build reads version {schema_version}"
        ),
    }
    tx.commit().await?;
    Ok(())
}
