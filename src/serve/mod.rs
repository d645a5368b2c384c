// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The read path: an HTTP front for the content store that falls back to the
//! archive for content that was evicted from it.

mod coalescer;
mod in_flight;

pub use coalescer::{Resolution, RetrievalCoalescer};
pub use in_flight::{InFlightBuckets, InFlightSet};

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tracing::{info, warn};

use crate::metrics::{CONTENT_REQUESTS, collect_prometheus_metrics, values};

const FETCHING_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><meta http-equiv="refresh" content="30"><title>Fetching</title></head>
<body><h1>Fetching from archive</h1><p>This content is being retrieved from long-term storage. Please retry in a few minutes.</p></body>
</html>
"#;

const NOT_FOUND_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Not found</title></head>
<body><h1>Not found</h1><p>No staged tree contains this path.</p></body>
</html>
"#;

const UNAVAILABLE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Unavailable</title></head>
<body><h1>Try again later</h1><p>The catalog is temporarily unavailable.</p></body>
</html>
"#;

pub fn router(coalescer: Arc<RetrievalCoalescer>) -> Router {
    Router::new()
        .route("/content/{*path}", get(content))
        .route("/ipfs/{*path}", get(content))
        .route("/metrics", get(collect_prometheus_metrics))
        .layer(CompressionLayer::new())
        .with_state(coalescer)
}

async fn content(
    State(coalescer): State<Arc<RetrievalCoalescer>>,
    Path(path): Path<String>,
) -> Response {
    match coalescer.resolve(&path).await {
        Ok(Resolution::Content(bytes)) => {
            CONTENT_REQUESTS.get_or_create(&values::HIT).inc();
            (StatusCode::OK, bytes).into_response()
        }
        Ok(Resolution::Pending { .. }) => {
            CONTENT_REQUESTS.get_or_create(&values::PENDING).inc();
            (StatusCode::ACCEPTED, Html(FETCHING_PAGE)).into_response()
        }
        Ok(Resolution::NotFound) => {
            CONTENT_REQUESTS.get_or_create(&values::NOT_FOUND).inc();
            (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)).into_response()
        }
        Err(e) => {
            CONTENT_REQUESTS.get_or_create(&values::ERROR).inc();
            warn!("failed to resolve {path}: {e:#}");
            (StatusCode::SERVICE_UNAVAILABLE, Html(UNAVAILABLE_PAGE)).into_response()
        }
    }
}

/// Serves until `shutdown` is cancelled, then lets open requests finish.
pub async fn serve(
    listener: TcpListener,
    coalescer: Arc<RetrievalCoalescer>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!("serving content on {}", listener.local_addr()?);
    axum::serve(listener, router(coalescer).into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("content server stopped");
    Ok(())
}
