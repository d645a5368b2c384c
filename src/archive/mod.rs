// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The long-term archival backend (Filecoin, driven through Powergate).

#[cfg(test)]
pub mod memory;
mod powergate;

pub use powergate::PowergateClient;

use std::path::Path;

use async_trait::async_trait;
use cid::Cid;
use futures::stream::BoxStream;

use crate::model::{JobEvent, JobId};

/// Job status updates, in the order the service reports them. The stream ends
/// only when the connection to the service is lost.
pub type JobEventStream = BoxStream<'static, anyhow::Result<JobEvent>>;

#[async_trait]
pub trait ArchiveService: Send + Sync {
    /// Uploads a flat folder to the service's hot storage and returns the
    /// bucket id.
    async fn stage_folder(&self, path: &Path) -> anyhow::Result<Cid>;

    /// Requests long-term storage of a staged bucket.
    async fn push_storage_config(&self, bucket: &Cid) -> anyhow::Result<JobId>;

    /// Subscribes to status updates of the given jobs.
    async fn watch_jobs(&self, jobs: &[JobId]) -> anyhow::Result<JobEventStream>;

    /// Retrieves a stored bucket and writes its files into `dest`.
    async fn fetch_bucket(&self, bucket: &Cid, dest: &Path) -> anyhow::Result<()>;
}
