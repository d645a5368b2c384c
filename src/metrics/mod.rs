// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use axum::{http::StatusCode, response::IntoResponse};
use parking_lot::{RwLock, RwLockWriteGuard};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{
        counter::Counter,
        family::Family,
        histogram::{Histogram, exponential_buckets},
    },
};
use std::sync::LazyLock;
use std::time::Instant;
use tracing::warn;

static DEFAULT_REGISTRY: LazyLock<RwLock<prometheus_client::registry::Registry>> =
    LazyLock::new(Default::default);

pub fn default_registry<'a>() -> RwLockWriteGuard<'a, prometheus_client::registry::Registry> {
    DEFAULT_REGISTRY.write()
}

pub static CONTENT_REQUESTS: LazyLock<Family<KindLabel, Counter>> = LazyLock::new(|| {
    let metric = Family::default();
    default_registry().register(
        "content_requests",
        "Content requests by outcome",
        metric.clone(),
    );
    metric
});

pub static BUCKET_FETCHES: LazyLock<Family<KindLabel, Counter>> = LazyLock::new(|| {
    let metric = Family::default();
    default_registry().register(
        "bucket_fetches",
        "Bucket retrievals from the archive by outcome",
        metric.clone(),
    );
    metric
});

pub static BUCKET_FETCH_TIME: LazyLock<Histogram> = LazyLock::new(|| {
    // Retrievals go through Filecoin and take from seconds to hours.
    let metric = Histogram::new(exponential_buckets(1.0, 2.0, 16));
    default_registry().register(
        "bucket_fetch_time",
        "Duration of a bucket retrieval in seconds",
        metric.clone(),
    );
    metric
});

pub static JOB_TRANSITIONS: LazyLock<Family<KindLabel, Counter>> = LazyLock::new(|| {
    let metric = Family::default();
    default_registry().register(
        "job_transitions",
        "Storage job state changes by target state",
        metric.clone(),
    );
    metric
});

pub async fn collect_prometheus_metrics() -> impl IntoResponse {
    let mut metrics = String::new();
    if let Err(e) =
        prometheus_client::encoding::text::encode_registry(&mut metrics, &DEFAULT_REGISTRY.read())
    {
        warn!("failed to encode the default metrics registry: {e}");
    };
    if let Err(e) = prometheus_client::encoding::text::encode_eof(&mut metrics) {
        warn!("failed to encode metrics eof {e}");
    };
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        metrics,
    )
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet, derive_more::Constructor)]
pub struct KindLabel {
    kind: &'static str,
}

pub mod values {
    use super::KindLabel;

    /// Served straight from the content store.
    pub const HIT: KindLabel = KindLabel::new("hit");
    /// Missing locally, a bucket fetch is running.
    pub const PENDING: KindLabel = KindLabel::new("pending");
    pub const NOT_FOUND: KindLabel = KindLabel::new("not_found");
    /// The catalog could not be queried.
    pub const ERROR: KindLabel = KindLabel::new("error");

    pub const STARTED: KindLabel = KindLabel::new("started");
    pub const SUCCEEDED: KindLabel = KindLabel::new("succeeded");
    pub const FAILED: KindLabel = KindLabel::new("failed");

    pub fn job_state(state: crate::model::JobState) -> KindLabel {
        use crate::model::JobState;
        KindLabel::new(match state {
            JobState::Submitted => "submitted",
            JobState::Queued => "queued",
            JobState::Executing => "executing",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        })
    }
}

pub struct HistogramTimer<'a> {
    histogram: &'a Histogram,
    start: Instant,
}

impl Drop for HistogramTimer<'_> {
    fn drop(&mut self) {
        let duration = Instant::now() - self.start;
        self.histogram.observe(duration.as_secs_f64());
    }
}

pub trait HistogramTimerExt {
    fn start_timer(&self) -> HistogramTimer<'_>;
}

impl HistogramTimerExt for Histogram {
    fn start_timer(&self) -> HistogramTimer<'_> {
        HistogramTimer {
            histogram: self,
            start: Instant::now(),
        }
    }
}
