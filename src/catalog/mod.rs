// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Persistent record of staged trees: one entry per file or directory keyed by
//! logical path, and one [`Tree`] per staging run with its storage jobs.

#[cfg(test)]
pub mod memory;
mod sqlite;

pub use sqlite::SqliteCatalog;

use async_trait::async_trait;
use cid::Cid;

use crate::model::{JobStatus, Tree, TreeEntry};

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Inserts or replaces the entry stored under `entry.path`.
    async fn put_entry(&self, entry: &TreeEntry) -> anyhow::Result<()>;

    async fn find_entry(&self, path: &str) -> anyhow::Result<Option<TreeEntry>>;

    /// Every entry recorded as a member of `bucket`, in path order.
    async fn entries_in_bucket(&self, bucket: &Cid) -> anyhow::Result<Vec<TreeEntry>>;

    /// Inserts or replaces a tree, jobs included.
    async fn put_tree(&self, tree: &Tree) -> anyhow::Result<()>;

    async fn find_tree(&self, root: &Cid) -> anyhow::Result<Option<Tree>>;

    /// Inserts or replaces one job of an existing tree.
    async fn put_job(&self, root: &Cid, job: &JobStatus) -> anyhow::Result<()>;
}
