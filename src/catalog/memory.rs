// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::HashMap;
use async_trait::async_trait;
use cid::Cid;
use parking_lot::RwLock;

use super::Catalog;
use crate::model::{JobStatus, Tree, TreeEntry};

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    entries: RwLock<BTreeMap<String, TreeEntry>>,
    trees: RwLock<HashMap<Cid, Tree>>,
    unavailable: AtomicBool,
}

impl MemoryCatalog {
    /// Makes every subsequent call fail, as if the database went away.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.unavailable.load(Ordering::SeqCst),
            "catalog is unavailable"
        );
        Ok(())
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn put_entry(&self, entry: &TreeEntry) -> anyhow::Result<()> {
        self.check()?;
        self.entries
            .write()
            .insert(entry.path.clone(), entry.clone());
        Ok(())
    }

    async fn find_entry(&self, path: &str) -> anyhow::Result<Option<TreeEntry>> {
        self.check()?;
        Ok(self.entries.read().get(path).cloned())
    }

    async fn entries_in_bucket(&self, bucket: &Cid) -> anyhow::Result<Vec<TreeEntry>> {
        self.check()?;
        Ok(self
            .entries
            .read()
            .values()
            .filter(|entry| entry.bucket_id.as_ref() == Some(bucket))
            .cloned()
            .collect())
    }

    async fn put_tree(&self, tree: &Tree) -> anyhow::Result<()> {
        self.check()?;
        self.trees.write().insert(tree.root_cid, tree.clone());
        Ok(())
    }

    async fn find_tree(&self, root: &Cid) -> anyhow::Result<Option<Tree>> {
        self.check()?;
        Ok(self.trees.read().get(root).cloned())
    }

    async fn put_job(&self, root: &Cid, job: &JobStatus) -> anyhow::Result<()> {
        self.check()?;
        let mut trees = self.trees.write();
        let tree = trees
            .get_mut(root)
            .ok_or_else(|| anyhow::anyhow!("tree {root} is not in the catalog"))?;
        tree.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }
}
