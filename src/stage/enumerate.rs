// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use anyhow::Context as _;
use cid::Cid;
use futures::FutureExt as _;
use futures::future::BoxFuture;
use indexmap::IndexMap;

use crate::content_store::ContentStore;
use crate::model::{TreeEntry, child_path};

/// Every node of an enumerated tree, in post-order. Keyed by `(path, cid)`, so
/// the same content reachable at two paths is listed twice.
#[derive(Debug, Clone, Default)]
pub struct TreeEntries {
    entries: IndexMap<(String, Cid), TreeEntry>,
}

impl TreeEntries {
    fn insert(&mut self, entry: TreeEntry) {
        self.entries
            .entry((entry.path.clone(), entry.cid))
            .or_insert(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str, cid: &Cid) -> Option<&TreeEntry> {
        self.entries.get(&(path.to_owned(), *cid))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.values()
    }

    /// Sum of all file sizes.
    pub fn total_file_bytes(&self) -> u64 {
        self.iter()
            .filter(|entry| !entry.is_dir)
            .map(|entry| entry.size)
            .sum()
    }
}

impl IntoIterator for TreeEntries {
    type Item = TreeEntry;
    type IntoIter = indexmap::map::IntoValues<(String, Cid), TreeEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_values()
    }
}

impl FromIterator<TreeEntry> for TreeEntries {
    fn from_iter<T: IntoIterator<Item = TreeEntry>>(iter: T) -> Self {
        let mut entries = Self::default();
        for entry in iter {
            entries.insert(entry);
        }
        entries
    }
}

/// Walks the tree rooted at `root` depth-first and records every directory and
/// file under its logical path `<root>/...`.
pub async fn enumerate_tree(store: &dyn ContentStore, root: &Cid) -> anyhow::Result<TreeEntries> {
    let mut entries = TreeEntries::default();
    visit(store, *root, root.to_string(), true, &mut entries).await?;
    Ok(entries)
}

fn visit<'a>(
    store: &'a dyn ContentStore,
    cid: Cid,
    path: String,
    is_dir: bool,
    out: &'a mut TreeEntries,
) -> BoxFuture<'a, anyhow::Result<u64>> {
    async move {
        let size = if is_dir {
            let children = store
                .list_children(&cid)
                .await
                .with_context(|| format!("failed to list {path}"))?;
            let mut size = 0u64;
            for child in children {
                let child_size =
                    visit(store, child.cid, child_path(&path, &child.name), child.is_dir, out)
                        .await?;
                size = size.saturating_add(child_size);
            }
            size
        } else {
            file_size(store, cid)
                .await
                .with_context(|| format!("failed to size {path}"))?
        };
        out.insert(TreeEntry::new(cid, path, size, is_dir));
        Ok(size)
    }
    .boxed()
}

/// Own payload plus every chunk reachable through unnamed links.
fn file_size(store: &dyn ContentStore, cid: Cid) -> BoxFuture<'_, anyhow::Result<u64>> {
    async move {
        let object = store.object_links(&cid).await?;
        let mut size = object.data_size;
        for link in object.links.iter().filter(|link| !link.is_named()) {
            size = size.saturating_add(file_size(store, link.cid).await?);
        }
        Ok(size)
    }
    .boxed()
}
