// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::LazyLock;

use anyhow::Context as _;
use futures::{Stream, TryStreamExt as _};
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;

pub fn global_http_client() -> reqwest::Client {
    static CLIENT: LazyLock<reqwest::Client> = LazyLock::new(reqwest::Client::new);
    CLIENT.clone()
}

/// Splits a streaming response body into newline-delimited JSON values.
/// Blank lines (keep-alives) are skipped.
pub fn ndjson_stream<T>(
    response: reqwest::Response,
) -> impl Stream<Item = anyhow::Result<T>> + Send + 'static
where
    T: serde::de::DeserializeOwned + Send + 'static,
{
    let body = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));
    FramedRead::new(body, LinesCodec::new())
        .map_err(anyhow::Error::from)
        .try_filter(|line| futures::future::ready(!line.trim().is_empty()))
        .and_then(|line| async move {
            serde_json::from_str(&line).with_context(|| format!("malformed stream item: {line}"))
        })
}

/// Parses a complete newline-delimited JSON body.
pub fn parse_ndjson<T: serde::de::DeserializeOwned>(body: &str) -> anyhow::Result<Vec<T>> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).with_context(|| format!("malformed line: {line}")))
        .collect()
}
