// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Records shared by the staging, storing and serving flows. These are also the
//! documents persisted in the [`crate::catalog::Catalog`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use cid::Cid;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

/// One file or directory of a staged tree.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeEntry {
    #[serde_as(as = "DisplayFromStr")]
    pub cid: Cid,
    /// Logical path rooted at the tree's content id, e.g. `<root>/docs/a.txt`.
    pub path: String,
    /// File size, or the sum of all descendant file sizes for a directory.
    pub size: u64,
    pub is_dir: bool,
    /// Archive bucket holding this entry. `None` until its bucket is sealed.
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub bucket_id: Option<Cid>,
}

impl TreeEntry {
    pub fn new(cid: Cid, path: impl Into<String>, size: u64, is_dir: bool) -> Self {
        Self {
            cid,
            path: path.into(),
            size,
            is_dir,
            bucket_id: None,
        }
    }

    /// Path relative to the tree root, empty for the root itself.
    pub fn relative_path(&self) -> &str {
        self.path
            .split_once('/')
            .map(|(_, rest)| rest)
            .unwrap_or_default()
    }
}

/// Joins a child name onto a logical path.
pub fn child_path(parent: &str, name: &str) -> String {
    format!("{parent}/{name}")
}

/// Job identifier handed out by the archive service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Lifecycle of one storage job. Variants are declared in progress order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobState {
    Submitted,
    Queued,
    Executing,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Latest known state of the storage job for one bucket.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub id: JobId,
    /// Content id of the bucket being stored.
    #[serde_as(as = "DisplayFromStr")]
    pub cid: Cid,
    pub status: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl JobStatus {
    pub fn submitted(id: JobId, cid: Cid) -> Self {
        Self {
            id,
            cid,
            status: JobState::Submitted,
            cause: None,
            last_updated: Utc::now(),
        }
    }

    /// Moves the job forward to `status`. Returns `false`, leaving the record
    /// untouched, when the job is already terminal or `status` does not advance
    /// it.
    pub fn advance(&mut self, status: JobState, cause: Option<String>, at: DateTime<Utc>) -> bool {
        if self.status.is_terminal() || status <= self.status {
            return false;
        }
        self.status = status;
        self.cause = cause;
        self.last_updated = at;
        true
    }
}

/// A status update delivered by the archive service's job watch stream.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: JobId,
    #[serde_as(as = "DisplayFromStr")]
    pub cid: Cid,
    pub status: JobState,
    #[serde(default)]
    pub cause: Option<String>,
}

/// Root record of one staging operation.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tree {
    #[serde_as(as = "DisplayFromStr")]
    pub root_cid: Cid,
    /// Bucket ids in packing order.
    #[serde_as(as = "Vec<DisplayFromStr>")]
    pub buckets: Vec<Cid>,
    #[serde(default)]
    pub jobs: BTreeMap<JobId, JobStatus>,
    /// `false` while staging is still sealing buckets, or after it failed
    /// part way. `buckets` then lists only the buckets sealed so far.
    #[serde(default = "complete_by_default")]
    pub complete: bool,
}

fn complete_by_default() -> bool {
    true
}

impl Tree {
    pub fn new(root_cid: Cid, buckets: Vec<Cid>) -> Self {
        Self {
            root_cid,
            buckets,
            jobs: BTreeMap::new(),
            complete: true,
        }
    }

    /// A tree whose staging has not finished yet.
    pub fn incomplete(root_cid: Cid, buckets: Vec<Cid>) -> Self {
        Self {
            complete: false,
            ..Self::new(root_cid, buckets)
        }
    }

    pub fn job_for_bucket(&self, bucket: &Cid) -> Option<&JobStatus> {
        self.jobs.values().find(|job| &job.cid == bucket)
    }

    /// Jobs that still expect status updates.
    pub fn pending_jobs(&self) -> impl Iterator<Item = &JobStatus> {
        self.jobs.values().filter(|job| !job.status.is_terminal())
    }

    /// `true` once staging finished, every bucket has a job and every job is
    /// terminal.
    pub fn is_settled(&self) -> bool {
        self.complete
            && self
                .buckets
                .iter()
                .all(|bucket| self.job_for_bucket(bucket).is_some())
            && self.pending_jobs().next().is_none()
    }
}
