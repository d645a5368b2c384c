// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The content-addressed store (an IPFS node) that holds the hot copy of every
//! staged tree.

mod kubo;
#[cfg(test)]
pub mod memory;

pub use kubo::KuboClient;

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;

/// A raw link of a DAG node. Links with an empty name are internal structure,
/// for instance the chunks of a large file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub name: String,
    pub cid: Cid,
}

impl Link {
    pub fn is_named(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Object-level view of a DAG node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectLinks {
    /// Size of the node's own payload, excluding linked nodes.
    pub data_size: u64,
    pub links: Vec<Link>,
}

/// A named entry of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    pub name: String,
    pub cid: Cid,
    pub is_dir: bool,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Imports a local directory recursively and returns the root content id.
    async fn add_directory(&self, path: &Path) -> anyhow::Result<Cid>;

    /// Returns the payload size and every link, named or not, of a node.
    async fn object_links(&self, cid: &Cid) -> anyhow::Result<ObjectLinks>;

    /// Returns the named children of a directory node.
    async fn list_children(&self, cid: &Cid) -> anyhow::Result<Vec<Child>>;

    /// Returns the raw bytes of a single block.
    async fn get_block(&self, cid: &Cid) -> anyhow::Result<Bytes>;

    /// Whether the block is held locally, without asking the network for it.
    async fn has_block(&self, cid: &Cid) -> anyhow::Result<bool>;

    /// Resolves a logical path (`<root>/a/b.txt`) and returns the file content.
    /// Fails when any node along the path is not locally available.
    async fn cat(&self, path: &str) -> anyhow::Result<Bytes>;

    /// Makes `data` locally resolvable under `cid` again. `data` is either a
    /// raw block or the full content of a file.
    async fn restore(&self, cid: &Cid, data: Bytes) -> anyhow::Result<()>;
}
