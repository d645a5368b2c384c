// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use bytes::Bytes;
use cid::Cid;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::in_flight::InFlightSet;
use crate::archive::ArchiveService;
use crate::catalog::Catalog;
use crate::content_store::ContentStore;
use crate::metrics::{BUCKET_FETCH_TIME, BUCKET_FETCHES, HistogramTimerExt as _, values};
use crate::utils::io::scratch_dir;

#[derive(Debug)]
pub enum Resolution {
    Content(Bytes),
    /// The path is known but its content has to come back from the archive.
    /// `buckets` lists what the path needs, `fetches` the retrievals this call
    /// started.
    Pending {
        buckets: Vec<Cid>,
        fetches: Vec<JoinHandle<()>>,
    },
    NotFound,
}

/// Serves content-store misses by retrieving the owning bucket, at most once
/// at a time per bucket.
pub struct RetrievalCoalescer {
    content: Arc<dyn ContentStore>,
    archive: Arc<dyn ArchiveService>,
    catalog: Arc<dyn Catalog>,
    in_flight: Arc<dyn InFlightSet>,
    scratch_root: Option<PathBuf>,
}

impl RetrievalCoalescer {
    pub fn new(
        content: Arc<dyn ContentStore>,
        archive: Arc<dyn ArchiveService>,
        catalog: Arc<dyn Catalog>,
        in_flight: Arc<dyn InFlightSet>,
    ) -> Self {
        Self {
            content,
            archive,
            catalog,
            in_flight,
            scratch_root: None,
        }
    }

    pub fn with_scratch_root(mut self, root: Option<PathBuf>) -> Self {
        self.scratch_root = root;
        self
    }

    /// Fails only when the catalog cannot be queried.
    pub async fn resolve(&self, path: &str) -> anyhow::Result<Resolution> {
        match self.content.cat(path).await {
            Ok(content) => return Ok(Resolution::Content(content)),
            Err(e) => debug!("{path} is not in the content store: {e:#}"),
        }

        let Some(entry) = self.catalog.find_entry(path).await? else {
            return Ok(Resolution::NotFound);
        };
        let Some(bucket) = entry.bucket_id else {
            debug!("{path} is known but its bucket was never sealed");
            return Ok(Resolution::Pending {
                buckets: vec![],
                fetches: vec![],
            });
        };

        // Directories along the path may have been evicted with the file, and
        // they live in their own bucket.
        let mut buckets = vec![];
        for ancestor in ancestor_paths(&entry.path) {
            let Some(dir) = self.catalog.find_entry(ancestor).await? else {
                continue;
            };
            let Some(dir_bucket) = dir.bucket_id else {
                continue;
            };
            if buckets.contains(&dir_bucket) {
                continue;
            }
            match self.content.has_block(&dir.cid).await {
                Ok(true) => {}
                Ok(false) => buckets.push(dir_bucket),
                Err(e) => {
                    debug!("cannot tell whether {ancestor} is local: {e:#}");
                    buckets.push(dir_bucket);
                }
            }
        }
        if !buckets.contains(&bucket) {
            buckets.push(bucket);
        }

        let fetches = buckets
            .iter()
            .filter(|bucket| self.in_flight.try_insert(**bucket))
            .map(|bucket| self.spawn_fetch(*bucket))
            .collect();
        Ok(Resolution::Pending { buckets, fetches })
    }

    fn spawn_fetch(&self, bucket: Cid) -> JoinHandle<()> {
        let content = self.content.clone();
        let archive = self.archive.clone();
        let in_flight = self.in_flight.clone();
        let scratch_root = self.scratch_root.clone();
        info!("retrieving bucket {bucket}");
        BUCKET_FETCHES.get_or_create(&values::STARTED).inc();
        tokio::spawn(async move {
            let _in_flight = scopeguard::guard(in_flight, move |set| set.remove(&bucket));
            let fetched = fetch_and_restore(
                content.as_ref(),
                archive.as_ref(),
                &bucket,
                scratch_root.as_deref(),
            )
            .await;
            match fetched {
                Ok(restored) => {
                    BUCKET_FETCHES.get_or_create(&values::SUCCEEDED).inc();
                    info!("bucket {bucket} restored {restored} objects");
                }
                Err(e) => {
                    BUCKET_FETCHES.get_or_create(&values::FAILED).inc();
                    error!("retrieval of bucket {bucket} failed: {e:#}");
                }
            }
        })
    }
}

/// Proper ancestors of a logical path, root first: `r/a/b` yields `r`, `r/a`.
fn ancestor_paths(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/').map(move |(i, _)| &path[..i])
}

/// Pulls a bucket into a scratch directory and puts every object back into the
/// content store under the content id it is named by.
async fn fetch_and_restore(
    content: &dyn ContentStore,
    archive: &dyn ArchiveService,
    bucket: &Cid,
    scratch_root: Option<&Path>,
) -> anyhow::Result<usize> {
    let _timer = BUCKET_FETCH_TIME.start_timer();
    let scratch = scratch_dir("filstash-fetch", scratch_root)?;
    archive.fetch_bucket(bucket, scratch.path()).await?;

    let mut restored = 0;
    let mut files = tokio::fs::read_dir(scratch.path()).await?;
    while let Some(file) = files.next_entry().await? {
        let name = file.file_name();
        let name = name
            .to_str()
            .with_context(|| format!("unexpected file {name:?} in bucket {bucket}"))?;
        let cid = Cid::try_from(name)
            .with_context(|| format!("unexpected file {name} in bucket {bucket}"))?;
        let data = tokio::fs::read(file.path()).await?;
        content
            .restore(&cid, data.into())
            .await
            .with_context(|| format!("failed to restore {cid}"))?;
        restored += 1;
    }
    scratch.close()?;
    Ok(restored)
}
