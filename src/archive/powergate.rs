// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::path::Path;

use anyhow::Context as _;
use async_trait::async_trait;
use cid::Cid;
use futures::{StreamExt as _, TryStreamExt as _};
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{ArchiveService, JobEventStream};
use crate::content_store::{ContentStore as _, KuboClient};
use crate::model::{JobEvent, JobId, JobState};
use crate::utils::net::{global_http_client, ndjson_stream};

/// Client of the Powergate HTTP gateway. Folders move in and out of
/// Powergate's hot storage through its IPFS reverse proxy.
#[derive(Debug, Clone)]
pub struct PowergateClient {
    api: Url,
    token: Option<String>,
    ipfs: KuboClient,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplyRequest<'a> {
    cid: &'a str,
    has_override_config: bool,
    override_config: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyResponse {
    job_id: String,
}

#[derive(Serialize)]
struct RetrieveRequest<'a> {
    cid: &'a str,
}

/// One frame of a server-streaming gateway response.
#[derive(Debug, Deserialize)]
struct WatchFrame {
    #[serde(default)]
    result: Option<WatchResult>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WatchResult {
    storage_job: StorageJob,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageJob {
    id: String,
    cid: String,
    status: String,
    #[serde(default)]
    error_cause: String,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}

fn job_state(status: &str) -> anyhow::Result<JobState> {
    Ok(match status {
        "JOB_STATUS_UNSPECIFIED" => JobState::Submitted,
        "JOB_STATUS_QUEUED" => JobState::Queued,
        "JOB_STATUS_EXECUTING" => JobState::Executing,
        "JOB_STATUS_SUCCESS" => JobState::Succeeded,
        "JOB_STATUS_FAILED" | "JOB_STATUS_CANCELED" => JobState::Failed,
        other => anyhow::bail!("unknown job status {other}"),
    })
}

impl WatchFrame {
    fn into_event(self) -> anyhow::Result<JobEvent> {
        if let Some(error) = self.error {
            anyhow::bail!("job watch failed: {}", error.message);
        }
        let job = self.result.context("empty job watch frame")?.storage_job;
        let status = job_state(&job.status)?;
        let cause = match job.error_cause {
            cause if !cause.is_empty() => Some(cause),
            _ if job.status == "JOB_STATUS_CANCELED" => Some("canceled".into()),
            _ => None,
        };
        Ok(JobEvent {
            job_id: JobId(job.id),
            cid: Cid::try_from(job.cid.as_str())?,
            status,
            cause,
        })
    }
}

impl PowergateClient {
    pub fn new(api: Url, token: Option<String>, ipfs: KuboClient) -> Self {
        Self {
            api,
            token,
            ipfs,
            client: global_http_client(),
        }
    }

    fn request(&self, method: Method, path: &str) -> anyhow::Result<RequestBuilder> {
        let request = self.client.request(method, self.api.join(path)?);
        Ok(match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn send(request: RequestBuilder, what: &str) -> anyhow::Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("powergate {what} request failed"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("powergate {what} failed with {status}: {body}");
        }
        Ok(response)
    }
}

#[async_trait]
impl ArchiveService for PowergateClient {
    async fn stage_folder(&self, path: &Path) -> anyhow::Result<Cid> {
        self.ipfs.add_directory(path).await
    }

    async fn push_storage_config(&self, bucket: &Cid) -> anyhow::Result<JobId> {
        let cid = bucket.to_string();
        let request = self
            .request(Method::POST, "v1/storage-config/apply")?
            .json(&ApplyRequest {
                cid: &cid,
                has_override_config: true,
                override_config: true,
            });
        let ApplyResponse { job_id } = Self::send(request, "apply storage config")
            .await?
            .json()
            .await?;
        Ok(JobId(job_id))
    }

    async fn watch_jobs(&self, jobs: &[JobId]) -> anyhow::Result<JobEventStream> {
        let query = jobs
            .iter()
            .map(|job| ("jobIds", job.0.as_str()))
            .collect::<Vec<_>>();
        let request = self
            .request(Method::GET, "v1/storage-jobs/watch")?
            .query(&query);
        let response = Self::send(request, "watch storage jobs").await?;
        Ok(ndjson_stream::<WatchFrame>(response)
            .and_then(|frame| futures::future::ready(frame.into_event()))
            .boxed())
    }

    async fn fetch_bucket(&self, bucket: &Cid, dest: &Path) -> anyhow::Result<()> {
        let cid = bucket.to_string();
        let request = self
            .request(Method::POST, "v1/data/retrieve")?
            .json(&RetrieveRequest { cid: &cid });
        Self::send(request, "retrieve").await?;
        debug!("bucket {bucket} is back in hot storage");
        self.ipfs
            .get_folder(bucket, dest)
            .await
            .with_context(|| format!("failed to copy bucket {bucket} out of hot storage"))
    }
}
