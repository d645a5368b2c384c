// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Drives the storage jobs of a staged tree to completion. Every bucket gets
//! exactly one job; job status updates are persisted as they arrive so that an
//! interrupted run can pick up where it stopped.

use std::sync::Arc;

use anyhow::Context as _;
use chrono::Utc;
use cid::Cid;
use futures::StreamExt as _;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::archive::ArchiveService;
use crate::catalog::Catalog;
use crate::metrics::{JOB_TRANSITIONS, values};
use crate::model::{JobEvent, JobId, JobState, JobStatus, Tree};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("tree {0} is not in the catalog")]
    TreeNotFound(Cid),
    #[error("tree {0} has no buckets")]
    NoBuckets(Cid),
    #[error("staging of tree {0} did not finish, stage it again first")]
    IncompleteStaging(Cid),
    #[error("job watch stream ended before the run finished")]
    StreamClosed,
    #[error("update for job {job} which tree {root} does not own")]
    UnknownJob { job: JobId, root: Cid },
    #[error("job {job} reports bucket {reported} but was submitted for {expected}")]
    BucketMismatch {
        job: JobId,
        expected: Cid,
        reported: Cid,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Return once every job is terminal instead of waiting for cancellation.
    pub exit_when_settled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// The tree as persisted when the run ended.
    pub tree: Tree,
    /// Jobs created by this run.
    pub submitted: usize,
    /// Status updates that changed a job.
    pub applied: usize,
    pub cancelled: bool,
}

impl ReconcileReport {
    pub fn jobs_in(&self, state: JobState) -> impl Iterator<Item = &JobStatus> {
        self.tree.jobs.values().filter(move |job| job.status == state)
    }
}

pub struct JobReconciler {
    archive: Arc<dyn ArchiveService>,
    catalog: Arc<dyn Catalog>,
}

impl JobReconciler {
    pub fn new(archive: Arc<dyn ArchiveService>, catalog: Arc<dyn Catalog>) -> Self {
        Self { archive, catalog }
    }

    pub async fn run(
        &self,
        root: &Cid,
        cancel: CancellationToken,
        options: ReconcileOptions,
    ) -> anyhow::Result<ReconcileReport> {
        let mut tree = self
            .catalog
            .find_tree(root)
            .await?
            .ok_or(ReconcileError::TreeNotFound(*root))?;
        if !tree.complete {
            return Err(ReconcileError::IncompleteStaging(*root).into());
        }
        if tree.buckets.is_empty() {
            return Err(ReconcileError::NoBuckets(*root).into());
        }

        let submitted = self.submit_missing(&mut tree).await?;
        let mut report = ReconcileReport {
            tree,
            submitted,
            applied: 0,
            cancelled: false,
        };

        let pending = report
            .tree
            .pending_jobs()
            .map(|job| job.id.clone())
            .collect::<Vec<_>>();
        if pending.is_empty() {
            info!("every storage job of {root} is settled");
            return Ok(report);
        }
        info!("watching {} storage jobs of {root}", pending.len());
        let mut events = self
            .archive
            .watch_jobs(&pending)
            .await
            .context("failed to watch storage jobs")?;

        loop {
            if options.exit_when_settled && report.tree.pending_jobs().next().is_none() {
                info!("every storage job of {root} is settled");
                break;
            }
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                event = events.next() => event,
            };
            let Some(event) = event else {
                if report.tree.pending_jobs().next().is_none() {
                    info!("job watch stream of {root} ended after every job settled");
                    break;
                }
                return Err(ReconcileError::StreamClosed.into());
            };
            let event = event.context("job watch stream failed")?;
            if self.apply(&mut report.tree, event).await? {
                report.applied += 1;
            }
        }
        Ok(report)
    }

    async fn submit_missing(&self, tree: &mut Tree) -> anyhow::Result<usize> {
        let mut submitted = 0;
        for bucket in tree.buckets.clone() {
            if tree.job_for_bucket(&bucket).is_some() {
                continue;
            }
            let id = self
                .archive
                .push_storage_config(&bucket)
                .await
                .with_context(|| format!("failed to submit bucket {bucket}"))?;
            let job = JobStatus::submitted(id, bucket);
            self.catalog.put_job(&tree.root_cid, &job).await?;
            JOB_TRANSITIONS
                .get_or_create(&values::job_state(job.status))
                .inc();
            info!("submitted bucket {bucket} as job {}", job.id);
            tree.jobs.insert(job.id.clone(), job);
            submitted += 1;
        }
        Ok(submitted)
    }

    /// Applies one update, persisting it when it moves the job forward.
    async fn apply(&self, tree: &mut Tree, event: JobEvent) -> anyhow::Result<bool> {
        let root = tree.root_cid;
        let job = tree
            .jobs
            .get_mut(&event.job_id)
            .ok_or_else(|| ReconcileError::UnknownJob {
                job: event.job_id.clone(),
                root,
            })?;
        if job.cid != event.cid {
            return Err(ReconcileError::BucketMismatch {
                job: event.job_id,
                expected: job.cid,
                reported: event.cid,
            }
            .into());
        }

        let previous = job.status;
        if !job.advance(event.status, event.cause, Utc::now()) {
            debug!(
                "ignoring {} update for job {} in state {previous}",
                event.status, event.job_id
            );
            return Ok(false);
        }
        let job = job.clone();
        self.catalog.put_job(&root, &job).await?;
        JOB_TRANSITIONS
            .get_or_create(&values::job_state(job.status))
            .inc();

        if job.status == JobState::Failed {
            error!(
                "storage job {} for bucket {} failed: {}",
                job.id,
                job.cid,
                job.cause.as_deref().unwrap_or("no cause reported")
            );
        } else {
            info!(
                "storage job {} for bucket {}: {previous} -> {}",
                job.id, job.cid, job.status
            );
        }
        Ok(true)
    }
}
