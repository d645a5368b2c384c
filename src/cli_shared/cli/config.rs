// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::net::SocketAddr;
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::time::Duration;

use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, DurationSeconds, serde_as};
use smart_default::SmartDefault;
use tracing::level_filters::LevelFilter;
use url::Url;

fn url(s: &str) -> Url {
    // Only called with the literal defaults below.
    Url::parse(s).expect("default URLs are valid")
}

/// Kubo node that holds the working copy of every staged tree.
#[serde_as]
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, SmartDefault)]
#[serde(default)]
pub struct ContentStoreConfig {
    /// RPC endpoint, `/api/v0` is appended to it.
    #[default(url("http://127.0.0.1:5001/"))]
    pub api_url: Url,
    #[default(url("http://127.0.0.1:8080/"))]
    pub gateway_url: Url,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[default(Duration::from_secs(30))]
    pub request_timeout: Duration,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, SmartDefault)]
#[serde(default)]
pub struct ArchiveConfig {
    #[default(url("http://127.0.0.1:6002/"))]
    pub api_url: Url,
    /// Reverse proxy to the IPFS node that backs the archive.
    #[default(url("http://127.0.0.1:6001/"))]
    pub ipfs_proxy_url: Url,
    /// Storage profile token, sent as a bearer token.
    pub token: Option<String>,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, SmartDefault)]
#[serde(default)]
pub struct CatalogConfig {
    #[default(PathBuf::from("filstash.db"))]
    pub path: PathBuf,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, SmartDefault)]
#[serde(default)]
pub struct StagingConfig {
    /// Upper bound on the summed file bytes of one bucket.
    #[default(nonzero!(1_000_000_000u64))]
    pub max_bucket_size: NonZeroU64,
    /// Where bucket folders are assembled. The system temporary directory is
    /// used when unset.
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, SmartDefault)]
#[serde(default)]
pub struct ServeConfig {
    #[default(SocketAddr::from(([0, 0, 0, 0], 8000)))]
    pub listen_address: SocketAddr,
}

#[serde_as]
#[derive(Serialize, Deserialize, PartialEq, Eq, Hash, Debug, Clone)]
pub struct LogValue {
    pub module: String,
    #[serde_as(as = "DisplayFromStr")]
    pub level: LevelFilter,
}

impl LogValue {
    pub fn new(module: &str, level: LevelFilter) -> Self {
        Self {
            module: module.to_string(),
            level,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, SmartDefault)]
#[serde(default)]
pub struct LogConfig {
    #[default(vec![
        LogValue::new("axum", LevelFilter::WARN),
        LogValue::new("hyper_util", LevelFilter::WARN),
        LogValue::new("reqwest", LevelFilter::WARN),
        LogValue::new("sqlx", LevelFilter::WARN),
    ])]
    pub filters: Vec<LogValue>,
}

impl LogConfig {
    pub(in crate::cli_shared) fn to_filter_string(&self) -> String {
        self.filters
            .iter()
            .map(|f| format!("{}={}", f.module, f.level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Default, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub content_store: ContentStoreConfig,
    pub archive: ArchiveConfig,
    pub catalog: CatalogConfig,
    pub staging: StagingConfig,
    pub serve: ServeConfig,
    pub log: LogConfig,
}
