// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use cid::Cid;
use human_repr::HumanCount as _;
use tracing::{debug, info};

use super::enumerate::enumerate_tree;
use super::packer::{Bucket, pack};
use crate::archive::ArchiveService;
use crate::catalog::Catalog;
use crate::content_store::ContentStore;
use crate::model::Tree;
use crate::utils::io::scratch_dir;

/// Outcome of one staging run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSummary {
    pub root: Cid,
    /// Bucket ids in packing order.
    pub buckets: Vec<Cid>,
    /// Buckets already recorded by an earlier run and not staged again.
    pub reused: usize,
    pub entries: usize,
    pub file_bytes: u64,
}

pub struct StagingPipeline {
    content: Arc<dyn ContentStore>,
    archive: Arc<dyn ArchiveService>,
    catalog: Arc<dyn Catalog>,
    max_bucket_size: NonZeroU64,
    scratch_root: Option<PathBuf>,
}

impl StagingPipeline {
    pub fn new(
        content: Arc<dyn ContentStore>,
        archive: Arc<dyn ArchiveService>,
        catalog: Arc<dyn Catalog>,
        max_bucket_size: NonZeroU64,
    ) -> Self {
        Self {
            content,
            archive,
            catalog,
            max_bucket_size,
            scratch_root: None,
        }
    }

    /// Materializes buckets under `root` instead of the system temporary
    /// directory.
    pub fn with_scratch_root(mut self, root: Option<PathBuf>) -> Self {
        self.scratch_root = root;
        self
    }

    /// Adds `local_dir` to the content store, packs it into buckets, hands each
    /// bucket to the archive service and records the result in the catalog.
    pub async fn stage(&self, local_dir: &Path) -> anyhow::Result<StageSummary> {
        anyhow::ensure!(
            local_dir.is_dir(),
            "{} is not a directory",
            local_dir.display()
        );
        let root = self
            .content
            .add_directory(local_dir)
            .await
            .with_context(|| format!("failed to add {}", local_dir.display()))?;
        info!("added {} as {root}", local_dir.display());

        let entries = enumerate_tree(self.content.as_ref(), &root).await?;
        anyhow::ensure!(
            entries.get(&root.to_string(), &root).is_some(),
            "enumeration of {root} did not yield its root"
        );
        let (entry_count, file_bytes) = (entries.len(), entries.total_file_bytes());
        info!(
            "enumerated {entry_count} entries holding {}",
            file_bytes.human_count_bytes()
        );

        let buckets = pack(entries, self.max_bucket_size);
        let total = buckets.len();
        // Jobs of an earlier run stay attached until the run completes, so a
        // failure part way does not lose them.
        let previous_jobs = self
            .catalog
            .find_tree(&root)
            .await?
            .map(|previous| previous.jobs)
            .unwrap_or_default();
        let mut tree = Tree::incomplete(root, Vec::with_capacity(total));
        tree.jobs = previous_jobs;
        self.catalog.put_tree(&tree).await?;

        let mut reused = 0;
        for bucket in buckets {
            if bucket.is_empty() {
                continue;
            }
            if let Some(id) = self.recorded_bucket(&bucket).await? {
                debug!("bucket {}/{total} already staged as {id}", bucket.index);
                reused += 1;
                tree.buckets.push(id);
            } else {
                tree.buckets.push(self.seal(local_dir, bucket, total).await?);
            }
            self.catalog.put_tree(&tree).await?;
        }

        let bucket_ids = tree.buckets.clone();
        tree.jobs.retain(|_, job| bucket_ids.contains(&job.cid));
        tree.complete = true;
        self.catalog.put_tree(&tree).await?;
        info!(
            "staged {root} in {} buckets ({reused} reused)",
            bucket_ids.len()
        );

        Ok(StageSummary {
            root,
            buckets: bucket_ids,
            reused,
            entries: entry_count,
            file_bytes,
        })
    }

    /// Returns the bucket id shared by every member of `bucket` when an earlier
    /// run recorded all of them, with the same content, in one bucket.
    async fn recorded_bucket(&self, bucket: &Bucket) -> anyhow::Result<Option<Cid>> {
        let mut recorded = None;
        for entry in &bucket.entries {
            let Some(found) = self.catalog.find_entry(&entry.path).await? else {
                return Ok(None);
            };
            match (found.bucket_id, recorded) {
                (Some(id), None) if found.cid == entry.cid => recorded = Some(id),
                (Some(id), Some(common)) if found.cid == entry.cid && id == common => {}
                _ => return Ok(None),
            }
        }
        Ok(recorded)
    }

    async fn seal(&self, local_dir: &Path, bucket: Bucket, total: usize) -> anyhow::Result<Cid> {
        let scratch = scratch_dir("filstash-bucket", self.scratch_root.as_deref())?;
        for entry in &bucket.entries {
            let dest = scratch.path().join(entry.cid.to_string());
            if entry.is_dir {
                let block = self
                    .content
                    .get_block(&entry.cid)
                    .await
                    .with_context(|| format!("failed to fetch directory block {}", entry.path))?;
                tokio::fs::write(&dest, &block)
                    .await
                    .with_context(|| format!("failed to write directory block {}", entry.path))?;
            } else {
                let source = local_dir.join(entry.relative_path());
                tokio::fs::copy(&source, &dest)
                    .await
                    .with_context(|| format!("failed to copy {}", source.display()))?;
            }
        }

        let bucket_id = self
            .archive
            .stage_folder(scratch.path())
            .await
            .with_context(|| format!("failed to stage bucket {}", bucket.index))?;
        scratch.close()?;
        info!(
            "bucket {}/{total}: {} entries, {} staged as {bucket_id}",
            bucket.index,
            bucket.entries.len(),
            bucket.file_bytes().human_count_bytes()
        );

        for mut entry in bucket.entries {
            entry.bucket_id = Some(bucket_id);
            self.catalog.put_entry(&entry).await?;
        }
        Ok(bucket_id)
    }
}
