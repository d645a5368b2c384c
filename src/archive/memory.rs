// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ahash::HashMap;
use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use futures::StreamExt as _;
use parking_lot::Mutex;
use tokio::sync::{Semaphore, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{ArchiveService, JobEventStream};
use crate::model::{JobEvent, JobId, JobState};
use crate::utils::cid::dag_pb_cid;

type EventSender = mpsc::UnboundedSender<anyhow::Result<JobEvent>>;

/// Events emitted while nobody watches are queued for the next watcher.
#[derive(Debug, Default)]
struct Watch {
    backlog: Vec<anyhow::Result<JobEvent>>,
    subscriber: Option<EventSender>,
    closed: bool,
}

/// Archive service that keeps staged buckets in memory. Job events are emitted
/// by the test through [`MemoryArchive::emit`].
#[derive(Debug)]
pub struct MemoryArchive {
    buckets: Mutex<HashMap<Cid, BTreeMap<String, Bytes>>>,
    jobs: Mutex<Vec<(JobId, Cid)>>,
    watched: Mutex<Vec<JobId>>,
    watch: Mutex<Watch>,
    stage_calls: AtomicUsize,
    stage_limit: AtomicUsize,
    fetch_calls: AtomicUsize,
    fetch_gate: Mutex<Option<Arc<Semaphore>>>,
    fail_fetches: AtomicBool,
}

impl Default for MemoryArchive {
    fn default() -> Self {
        Self {
            buckets: Default::default(),
            jobs: Default::default(),
            watched: Default::default(),
            watch: Default::default(),
            stage_calls: AtomicUsize::new(0),
            stage_limit: AtomicUsize::new(usize::MAX),
            fetch_calls: AtomicUsize::new(0),
            fetch_gate: Default::default(),
            fail_fetches: AtomicBool::new(false),
        }
    }
}

impl MemoryArchive {
    /// Lets `n` more folders be staged, then fails every further attempt.
    pub fn fail_staging_after(&self, n: usize) {
        let staged = self.stage_calls.load(Ordering::SeqCst);
        self.stage_limit.store(staged + n, Ordering::SeqCst);
    }

    pub fn stage_calls(&self) -> usize {
        self.stage_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Blocks every fetch until the returned semaphore hands out a permit.
    pub fn hold_fetches(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.fetch_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn bucket_files(&self, bucket: &Cid) -> Option<BTreeMap<String, Bytes>> {
        self.buckets.lock().get(bucket).cloned()
    }

    /// Job ids handed out so far, with their buckets, in submission order.
    pub fn pushed_jobs(&self) -> Vec<(JobId, Cid)> {
        self.jobs.lock().clone()
    }

    pub fn watched_jobs(&self) -> Vec<JobId> {
        self.watched.lock().clone()
    }

    /// Emits a status update for a job handed out by this archive.
    pub fn emit(&self, job: &JobId, status: JobState, cause: Option<&str>) {
        let cid = self
            .jobs
            .lock()
            .iter()
            .find(|(id, _)| id == job)
            .map(|(_, cid)| *cid)
            .unwrap_or_else(|| dag_pb_cid(job.0.as_bytes()));
        self.emit_raw(Ok(JobEvent {
            job_id: job.clone(),
            cid,
            status,
            cause: cause.map(str::to_owned),
        }));
    }

    pub fn emit_raw(&self, event: anyhow::Result<JobEvent>) {
        let mut watch = self.watch.lock();
        let event = match watch.subscriber.as_ref() {
            Some(tx) => match tx.send(event) {
                Ok(()) => return,
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };
        watch.subscriber = None;
        watch.backlog.push(event);
    }

    /// Ends the current watch stream, as a dropped connection would. Later
    /// watches deliver the queued events and end right after them.
    pub fn close_events(&self) {
        let mut watch = self.watch.lock();
        watch.subscriber = None;
        watch.closed = true;
    }
}

#[async_trait]
impl ArchiveService for MemoryArchive {
    async fn stage_folder(&self, path: &Path) -> anyhow::Result<Cid> {
        let call = self.stage_calls.fetch_add(1, Ordering::SeqCst);
        anyhow::ensure!(
            call < self.stage_limit.load(Ordering::SeqCst),
            "archive rejected the folder"
        );
        let mut files = BTreeMap::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            anyhow::ensure!(entry.file_type()?.is_file(), "buckets are flat folders");
            let name = entry.file_name().to_string_lossy().into_owned();
            files.insert(name, Bytes::from(std::fs::read(entry.path())?));
        }
        let mut block = vec![];
        for (name, data) in &files {
            block.extend_from_slice(name.as_bytes());
            block.push(0);
            block.extend_from_slice(data);
        }
        let bucket = dag_pb_cid(&block);
        self.buckets.lock().insert(bucket, files);
        Ok(bucket)
    }

    async fn push_storage_config(&self, bucket: &Cid) -> anyhow::Result<JobId> {
        anyhow::ensure!(
            self.buckets.lock().contains_key(bucket),
            "bucket {bucket} was never staged"
        );
        let mut jobs = self.jobs.lock();
        let id = JobId(format!("job-{}", jobs.len() + 1));
        jobs.push((id.clone(), *bucket));
        Ok(id)
    }

    async fn watch_jobs(&self, jobs: &[JobId]) -> anyhow::Result<JobEventStream> {
        self.watched.lock().extend_from_slice(jobs);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watch = self.watch.lock();
        for event in watch.backlog.drain(..) {
            let _ = tx.send(event);
        }
        if !watch.closed {
            watch.subscriber = Some(tx);
        }
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn fetch_bucket(&self, bucket: &Cid, dest: &Path) -> anyhow::Result<()> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.fetch_gate.lock().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await?;
        }
        anyhow::ensure!(
            !self.fail_fetches.load(Ordering::SeqCst),
            "retrieval of {bucket} failed"
        );
        let files = self
            .bucket_files(bucket)
            .ok_or_else(|| anyhow::anyhow!("unknown bucket {bucket}"))?;
        for (name, data) in files {
            tokio::fs::write(dest.join(name), data).await?;
        }
        Ok(())
    }
}
