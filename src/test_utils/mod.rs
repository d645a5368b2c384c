// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use crate::archive::memory::MemoryArchive;
use crate::catalog::memory::MemoryCatalog;
use crate::content_store::memory::MemoryContentStore;

/// A local directory tree on disk. Directories are created from the file paths.
pub struct TreeFixture {
    // Keeps the tree under a fixed name so that the root is stable.
    _dir: TempDir,
    root: std::path::PathBuf,
}

impl TreeFixture {
    /// `files` are `(relative path, size)` pairs. Contents are derived from the
    /// path so that distinct files get distinct content ids.
    pub fn new(files: &[(&str, usize)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tree");
        std::fs::create_dir_all(&root).unwrap();
        for (path, size) in files {
            let path = root.join(path);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, content_for(&path, *size)).unwrap();
        }
        Self { _dir: dir, root }
    }

    pub fn with_file(self, relative: &str, content: &[u8]) -> Self {
        let path = self.root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
        self
    }

    pub fn with_empty_dir(self, relative: &str) -> Self {
        std::fs::create_dir_all(self.root.join(relative)).unwrap();
        self
    }

    pub fn path(&self) -> &Path {
        &self.root
    }
}

fn content_for(path: &Path, size: usize) -> Vec<u8> {
    path.to_string_lossy()
        .bytes()
        .rev()
        .cycle()
        .take(size)
        .collect()
}

/// In-memory backends wired together the way the binary wires the real ones.
pub struct Backends {
    pub content: Arc<MemoryContentStore>,
    pub archive: Arc<MemoryArchive>,
    pub catalog: Arc<MemoryCatalog>,
}

impl Default for Backends {
    fn default() -> Self {
        Self::with_chunk_size(256 * 1024)
    }
}

impl Backends {
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            content: Arc::new(MemoryContentStore::new(chunk_size)),
            archive: Arc::new(MemoryArchive::default()),
            catalog: Arc::new(MemoryCatalog::default()),
        }
    }
}
