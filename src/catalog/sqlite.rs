// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cid::Cid;
use sqlx::{Row as _, SqlitePool, sqlite::SqliteRow};

use super::Catalog;
use crate::model::{JobId, JobStatus, Tree, TreeEntry};
use crate::utils::sqlite::{self, SqliteQuery};

const DB_NAME: &str = "catalog";
const SCHEMA_VERSION: i64 = 1;

fn ddls() -> [SqliteQuery<'static>; 4] {
    [
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS files (
                path TEXT PRIMARY KEY NOT NULL,
                cid TEXT NOT NULL,
                size INTEGER NOT NULL,
                is_dir INTEGER NOT NULL,
                bucket_id TEXT
            )"#,
        ),
        sqlx::query("CREATE INDEX IF NOT EXISTS files_bucket_id ON files (bucket_id)"),
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS trees (
                root_cid TEXT PRIMARY KEY NOT NULL,
                buckets TEXT NOT NULL,
                complete INTEGER NOT NULL DEFAULT 1
            )"#,
        ),
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS jobs (
                job_id TEXT PRIMARY KEY NOT NULL,
                root_cid TEXT NOT NULL REFERENCES trees (root_cid) ON DELETE CASCADE,
                bucket_cid TEXT NOT NULL,
                status TEXT NOT NULL,
                cause TEXT,
                last_updated TEXT NOT NULL
            )"#,
        ),
    ]
}

/// [`Catalog`] stored in a single `SQLite` database file.
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    db: SqlitePool,
}

impl SqliteCatalog {
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        let db = sqlite::open_file(path)
            .await
            .with_context(|| format!("failed to open catalog at {}", path.display()))?;
        Self::with_pool(db).await
    }

    pub async fn open_memory() -> anyhow::Result<Self> {
        Self::with_pool(sqlite::open_memory().await?).await
    }

    async fn with_pool(db: SqlitePool) -> anyhow::Result<Self> {
        sqlite::init_db(&db, DB_NAME, SCHEMA_VERSION, ddls()).await?;
        Ok(Self { db })
    }
}

fn parse_cid(s: &str) -> anyhow::Result<Cid> {
    Cid::try_from(s).with_context(|| format!("corrupt catalog: invalid cid {s}"))
}

fn entry_from_row(row: &SqliteRow) -> anyhow::Result<TreeEntry> {
    let bucket_id: Option<String> = row.try_get("bucket_id")?;
    Ok(TreeEntry {
        cid: parse_cid(row.try_get("cid")?)?,
        path: row.try_get("path")?,
        size: u64::try_from(row.try_get::<i64, _>("size")?)?,
        is_dir: row.try_get("is_dir")?,
        bucket_id: bucket_id.as_deref().map(parse_cid).transpose()?,
    })
}

fn job_from_row(row: &SqliteRow) -> anyhow::Result<JobStatus> {
    let status: &str = row.try_get("status")?;
    let last_updated: &str = row.try_get("last_updated")?;
    Ok(JobStatus {
        id: JobId(row.try_get("job_id")?),
        cid: parse_cid(row.try_get("bucket_cid")?)?,
        status: status
            .parse()
            .with_context(|| format!("corrupt catalog: unknown job state {status}"))?,
        cause: row.try_get("cause")?,
        last_updated: DateTime::parse_from_rfc3339(last_updated)?.with_timezone(&Utc),
    })
}

fn upsert_job<'q>(root: &Cid, job: &'q JobStatus) -> SqliteQuery<'q> {
    sqlx::query(
        r#"INSERT INTO jobs (job_id, root_cid, bucket_cid, status, cause, last_updated)
           VALUES (?, ?, ?, ?, ?, ?)
           ON CONFLICT (job_id) DO UPDATE SET
               root_cid = excluded.root_cid,
               bucket_cid = excluded.bucket_cid,
               status = excluded.status,
               cause = excluded.cause,
               last_updated = excluded.last_updated"#,
    )
    .bind(job.id.0.as_str())
    .bind(root.to_string())
    .bind(job.cid.to_string())
    .bind(job.status.to_string())
    .bind(job.cause.as_deref())
    .bind(job.last_updated.to_rfc3339())
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn put_entry(&self, entry: &TreeEntry) -> anyhow::Result<()> {
        sqlx::query(
            r#"INSERT INTO files (path, cid, size, is_dir, bucket_id) VALUES (?, ?, ?, ?, ?)
               ON CONFLICT (path) DO UPDATE SET
                   cid = excluded.cid,
                   size = excluded.size,
                   is_dir = excluded.is_dir,
                   bucket_id = excluded.bucket_id"#,
        )
        .bind(entry.path.as_str())
        .bind(entry.cid.to_string())
        .bind(i64::try_from(entry.size)?)
        .bind(entry.is_dir)
        .bind(entry.bucket_id.map(|cid| cid.to_string()))
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_entry(&self, path: &str) -> anyhow::Result<Option<TreeEntry>> {
        sqlx::query("SELECT * FROM files WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.db)
            .await?
            .as_ref()
            .map(entry_from_row)
            .transpose()
    }

    async fn entries_in_bucket(&self, bucket: &Cid) -> anyhow::Result<Vec<TreeEntry>> {
        sqlx::query("SELECT * FROM files WHERE bucket_id = ? ORDER BY path")
            .bind(bucket.to_string())
            .fetch_all(&self.db)
            .await?
            .iter()
            .map(entry_from_row)
            .collect()
    }

    async fn put_tree(&self, tree: &Tree) -> anyhow::Result<()> {
        let root = tree.root_cid.to_string();
        let buckets = serde_json::to_string(
            &tree
                .buckets
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
        )?;
        let mut tx = self.db.begin().await?;
        sqlx::query(
            r#"INSERT INTO trees (root_cid, buckets, complete) VALUES (?, ?, ?)
               ON CONFLICT (root_cid) DO UPDATE SET
                   buckets = excluded.buckets,
                   complete = excluded.complete"#,
        )
        .bind(root.as_str())
        .bind(buckets)
        .bind(tree.complete)
        .execute(tx.as_mut())
        .await?;
        sqlx::query("DELETE FROM jobs WHERE root_cid = ?")
            .bind(root.as_str())
            .execute(tx.as_mut())
            .await?;
        for job in tree.jobs.values() {
            upsert_job(&tree.root_cid, job).execute(tx.as_mut()).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find_tree(&self, root: &Cid) -> anyhow::Result<Option<Tree>> {
        let root_str = root.to_string();
        let Some((buckets, complete)) = sqlx::query_as::<_, (String, bool)>(
            "SELECT buckets, complete FROM trees WHERE root_cid = ?",
        )
        .bind(root_str.as_str())
        .fetch_optional(&self.db)
        .await?
        else {
            return Ok(None);
        };
        let buckets = serde_json::from_str::<Vec<String>>(&buckets)?
            .iter()
            .map(|s| parse_cid(s))
            .collect::<anyhow::Result<_>>()?;
        let jobs = sqlx::query("SELECT * FROM jobs WHERE root_cid = ?")
            .bind(root_str.as_str())
            .fetch_all(&self.db)
            .await?
            .iter()
            .map(|row| job_from_row(row).map(|job| (job.id.clone(), job)))
            .collect::<anyhow::Result<BTreeMap<_, _>>>()?;
        Ok(Some(Tree {
            root_cid: *root,
            buckets,
            jobs,
            complete,
        }))
    }

    async fn put_job(&self, root: &Cid, job: &JobStatus) -> anyhow::Result<()> {
        let known = sqlx::query("SELECT 1 FROM trees WHERE root_cid = ?")
            .bind(root.to_string())
            .fetch_optional(&self.db)
            .await?
            .is_some();
        anyhow::ensure!(known, "tree {root} is not in the catalog");
        upsert_job(root, job).execute(&self.db).await?;
        Ok(())
    }
}
