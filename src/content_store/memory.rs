// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use ahash::{HashMap, HashSet};
use anyhow::Context as _;
use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use parking_lot::RwLock;

use super::{Child, ContentStore, Link, ObjectLinks};
use crate::utils::cid::{dag_pb_cid, raw_cid};

#[derive(Debug, Clone)]
struct Node {
    /// Block bytes. For a file this is the full content.
    data: Bytes,
    data_size: u64,
    links: Vec<Link>,
    children: Vec<Child>,
    is_dir: bool,
}

/// Content store that imports local directories into memory. Files larger than
/// `chunk_size` are split into unnamed chunk nodes like `UnixFS` does.
///
/// The DAG structure is always known, but content can be evicted to simulate
/// data that only lives in the archive.
#[derive(Debug)]
pub struct MemoryContentStore {
    chunk_size: usize,
    nodes: RwLock<HashMap<Cid, Node>>,
    available: RwLock<HashSet<Cid>>,
    cat_calls: AtomicUsize,
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new(256 * 1024)
    }
}

impl MemoryContentStore {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            nodes: Default::default(),
            available: Default::default(),
            cat_calls: AtomicUsize::new(0),
        }
    }

    /// Forgets the content of every node; the DAG structure stays known.
    pub fn evict_all(&self) {
        self.available.write().clear();
    }

    pub fn make_all_available(&self) {
        let cids = self.nodes.read().keys().copied().collect::<Vec<_>>();
        self.available.write().extend(cids);
    }

    /// Forgets the content of one node and of its chunks.
    pub fn evict(&self, cid: &Cid) {
        let chunks = self
            .nodes
            .read()
            .get(cid)
            .map(|node| node.links.iter().filter(|l| !l.is_named()).map(|l| l.cid).collect())
            .unwrap_or_else(Vec::new);
        let mut available = self.available.write();
        available.remove(cid);
        for chunk in chunks {
            available.remove(&chunk);
        }
    }

    pub fn is_available(&self, cid: &Cid) -> bool {
        self.available.read().contains(cid)
    }

    pub fn cat_calls(&self) -> usize {
        self.cat_calls.load(Ordering::SeqCst)
    }

    fn insert(&self, cid: Cid, node: Node) {
        self.nodes.write().insert(cid, node);
        self.available.write().insert(cid);
    }

    fn import_file(&self, path: &Path) -> anyhow::Result<Cid> {
        let data = Bytes::from(std::fs::read(path)?);
        if data.len() <= self.chunk_size {
            let cid = raw_cid(&data);
            self.insert(
                cid,
                Node {
                    data_size: data.len() as u64,
                    data,
                    links: vec![],
                    children: vec![],
                    is_dir: false,
                },
            );
            return Ok(cid);
        }

        let mut links = vec![];
        let mut root_block = vec![];
        for chunk in data.chunks(self.chunk_size) {
            let chunk = Bytes::copy_from_slice(chunk);
            let cid = raw_cid(&chunk);
            root_block.extend_from_slice(&cid.to_bytes());
            self.insert(
                cid,
                Node {
                    data_size: chunk.len() as u64,
                    data: chunk,
                    links: vec![],
                    children: vec![],
                    is_dir: false,
                },
            );
            links.push(Link {
                name: String::new(),
                cid,
            });
        }
        let cid = dag_pb_cid(&root_block);
        self.insert(
            cid,
            Node {
                data,
                data_size: 0,
                links,
                children: vec![],
                is_dir: false,
            },
        );
        Ok(cid)
    }

    fn import_dir(&self, path: &Path) -> anyhow::Result<Cid> {
        let mut entries = std::fs::read_dir(path)?.collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        let mut children = vec![];
        for entry in entries {
            let name = entry
                .file_name()
                .into_string()
                .map_err(|name| anyhow::anyhow!("non UTF-8 name {name:?}"))?;
            let is_dir = entry.file_type()?.is_dir();
            let cid = if is_dir {
                self.import_dir(&entry.path())?
            } else {
                self.import_file(&entry.path())?
            };
            children.push(Child { name, cid, is_dir });
        }

        let listing = children
            .iter()
            .map(|child| (child.name.as_str(), child.cid.to_string(), child.is_dir))
            .collect::<Vec<_>>();
        let block = Bytes::from(serde_json::to_vec(&listing)?);
        let cid = dag_pb_cid(&block);
        self.insert(
            cid,
            Node {
                data_size: block.len() as u64,
                data: block,
                links: children
                    .iter()
                    .map(|child| Link {
                        name: child.name.clone(),
                        cid: child.cid,
                    })
                    .collect(),
                children,
                is_dir: true,
            },
        );
        Ok(cid)
    }

    fn node(&self, cid: &Cid) -> anyhow::Result<Node> {
        self.nodes
            .read()
            .get(cid)
            .cloned()
            .with_context(|| format!("unknown object {cid}"))
    }

    fn available_node(&self, cid: &Cid) -> anyhow::Result<Node> {
        anyhow::ensure!(self.is_available(cid), "{cid} is not available locally");
        self.node(cid)
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn add_directory(&self, path: &Path) -> anyhow::Result<Cid> {
        self.import_dir(path)
    }

    async fn object_links(&self, cid: &Cid) -> anyhow::Result<ObjectLinks> {
        let node = self.node(cid)?;
        Ok(ObjectLinks {
            data_size: node.data_size,
            links: node.links,
        })
    }

    async fn list_children(&self, cid: &Cid) -> anyhow::Result<Vec<Child>> {
        let node = self.node(cid)?;
        anyhow::ensure!(node.is_dir, "{cid} is not a directory");
        Ok(node.children)
    }

    async fn get_block(&self, cid: &Cid) -> anyhow::Result<Bytes> {
        Ok(self.available_node(cid)?.data)
    }

    async fn has_block(&self, cid: &Cid) -> anyhow::Result<bool> {
        Ok(self.is_available(cid))
    }

    async fn cat(&self, path: &str) -> anyhow::Result<Bytes> {
        self.cat_calls.fetch_add(1, Ordering::SeqCst);
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let root = segments.next().context("empty path")?;
        let mut node = self.available_node(&Cid::try_from(root)?)?;
        for segment in segments {
            let child = node
                .children
                .iter()
                .find(|child| child.name == segment)
                .with_context(|| format!("no link named {segment}"))?;
            node = self.available_node(&child.cid)?;
        }
        anyhow::ensure!(!node.is_dir, "{path} is a directory");
        Ok(node.data)
    }

    async fn restore(&self, cid: &Cid, data: Bytes) -> anyhow::Result<()> {
        let node = self.node(cid)?;
        anyhow::ensure!(node.data == data, "restored content does not match {cid}");
        let mut available = self.available.write();
        available.insert(*cid);
        available.extend(node.links.iter().filter(|l| !l.is_named()).map(|l| l.cid));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TreeFixture;

    #[tokio::test]
    async fn chunked_files_have_unnamed_links() {
        let fixture = TreeFixture::new(&[("big.bin", 10)]);
        let store = MemoryContentStore::new(4);
        let root = store.add_directory(fixture.path()).await.unwrap();
        let children = store.list_children(&root).await.unwrap();
        let file = store.object_links(&children[0].cid).await.unwrap();
        assert_eq!(file.data_size, 0);
        assert_eq!(file.links.len(), 3);
        assert!(file.links.iter().all(|link| !link.is_named()));
    }

    #[tokio::test]
    async fn cat_fails_after_eviction_and_recovers_on_restore() {
        let fixture = TreeFixture::new(&[("docs/a.txt", 5)]);
        let store = MemoryContentStore::default();
        let root = store.add_directory(fixture.path()).await.unwrap();
        let path = format!("{root}/docs/a.txt");
        let content = store.cat(&path).await.unwrap();
        assert_eq!(content.len(), 5);

        store.evict_all();
        assert!(store.cat(&path).await.is_err());

        let docs = store.list_children(&root).await.unwrap()[0].clone();
        let file = store.list_children(&docs.cid).await.unwrap()[0].clone();
        for cid in [root, docs.cid] {
            let block = store.node(&cid).unwrap().data;
            store.restore(&cid, block).await.unwrap();
        }
        store.restore(&file.cid, content.clone()).await.unwrap();
        assert_eq!(store.cat(&path).await.unwrap(), content);
    }

    #[tokio::test]
    async fn restore_rejects_foreign_content() {
        let fixture = TreeFixture::new(&[("a.txt", 5)]);
        let store = MemoryContentStore::default();
        let root = store.add_directory(fixture.path()).await.unwrap();
        assert!(store.restore(&root, Bytes::from_static(b"junk")).await.is_err());
    }
}
