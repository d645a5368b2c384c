// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! [`ContentStore`] backed by a Kubo node: the RPC API for everything but path
//! resolution, which goes through the HTTP gateway.
//! See <https://docs.ipfs.tech/reference/kubo/rpc/>

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use futures::TryStreamExt as _;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use url::{Url, form_urlencoded};
use walkdir::WalkDir;

use super::{Child, ContentStore, Link, ObjectLinks};
use crate::utils::cid::{codec_name, multihash_name};
use crate::utils::net::{global_http_client, parse_ndjson};

/// `UnixFS` node types reported by `ls`.
const UNIXFS_DIRECTORY: i32 = 1;
const UNIXFS_HAMT_SHARD: i32 = 5;

#[derive(Debug, Clone)]
pub struct KuboClient {
    api: Url,
    gateway: Url,
    gateway_timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AddedEntry {
    name: String,
    hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ObjectStat {
    data_size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawLink {
    name: String,
    hash: String,
    #[serde(default, rename = "Type")]
    kind: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ObjectLinksResponse {
    #[serde(default)]
    links: Option<Vec<RawLink>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsObject {
    #[serde(default)]
    links: Option<Vec<RawLink>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsResponse {
    objects: Vec<LsObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BlockPutResponse {
    key: String,
}

impl KuboClient {
    pub fn new(api: Url, gateway: Url, gateway_timeout: Duration) -> Self {
        Self {
            api,
            gateway,
            gateway_timeout,
            client: global_http_client(),
        }
    }

    fn rpc_url(&self, command: &str) -> anyhow::Result<Url> {
        Ok(self.api.join(&format!("api/v0/{command}"))?)
    }

    async fn rpc(
        &self,
        command: &str,
        args: &[(&str, &str)],
        form: Option<Form>,
    ) -> anyhow::Result<reqwest::Response> {
        let mut request = self.client.post(self.rpc_url(command)?).query(args);
        if let Some(form) = form {
            request = request.multipart(form);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("kubo {command} request failed"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("kubo {command} failed with {status}: {body}");
        }
        Ok(response)
    }

    async fn rpc_json<T: serde::de::DeserializeOwned>(
        &self,
        command: &str,
        args: &[(&str, &str)],
    ) -> anyhow::Result<T> {
        self.rpc(command, args, None)
            .await?
            .json()
            .await
            .with_context(|| format!("malformed kubo {command} response"))
    }

    async fn add(&self, form: Form, args: &[(&str, &str)]) -> anyhow::Result<Vec<AddedEntry>> {
        let body = self.rpc("add", args, Some(form)).await?.text().await?;
        parse_ndjson(&body)
    }

    /// Fetches a whole file through the RPC API, bypassing the gateway.
    pub async fn cat_cid(&self, cid: &Cid) -> anyhow::Result<Bytes> {
        let cid = cid.to_string();
        Ok(self.rpc("cat", &[("arg", &cid)], None).await?.bytes().await?)
    }

    /// Copies every file of a flat directory into `dest`, keeping file names.
    pub async fn get_folder(&self, cid: &Cid, dest: &Path) -> anyhow::Result<()> {
        for child in self.list_children(cid).await? {
            anyhow::ensure!(
                !child.is_dir,
                "unexpected nested directory {} in {cid}",
                child.name
            );
            let data = self.cat_cid(&child.cid).await?;
            tokio::fs::write(dest.join(&child.name), &data)
                .await
                .with_context(|| format!("failed to write {}", child.name))?;
        }
        Ok(())
    }
}

fn parse_cid(s: &str) -> anyhow::Result<Cid> {
    Cid::try_from(s).with_context(|| format!("invalid cid {s}"))
}

fn file_part(path: &Path, len: u64) -> Part {
    // Opened lazily so that a large tree does not hold one descriptor per file.
    let body = futures::stream::once(tokio::fs::File::open(path.to_owned()))
        .map_ok(ReaderStream::new)
        .try_flatten();
    Part::stream_with_length(reqwest::Body::wrap_stream(body), len)
}

#[async_trait]
impl ContentStore for KuboClient {
    async fn add_directory(&self, path: &Path) -> anyhow::Result<Cid> {
        let root_name = path
            .file_name()
            .and_then(OsStr::to_str)
            .with_context(|| format!("{} has no usable directory name", path.display()))?
            .to_owned();

        let mut form = Form::new();
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry?;
            let relative = entry.path().strip_prefix(path)?;
            let name = match relative.to_str() {
                Some("") => root_name.clone(),
                Some(relative) => format!("{root_name}/{relative}"),
                None => anyhow::bail!("non UTF-8 path {}", entry.path().display()),
            };
            let file_name: String = form_urlencoded::byte_serialize(name.as_bytes()).collect();
            let part = if entry.file_type().is_dir() {
                Part::bytes(Vec::new()).mime_str("application/x-directory")?
            } else if entry.file_type().is_file() {
                file_part(entry.path(), entry.metadata()?.len())
                    .mime_str("application/octet-stream")?
            } else {
                warn!("skipping special file {}", entry.path().display());
                continue;
            };
            form = form.part("file", part.file_name(file_name));
        }

        let added = self
            .add(form, &[("pin", "true"), ("progress", "false")])
            .await?;
        let root = added
            .iter()
            .find(|entry| entry.name == root_name)
            .with_context(|| format!("kubo did not report a root for {root_name}"))?;
        debug!("added {} objects under {}", added.len(), root.hash);
        parse_cid(&root.hash)
    }

    async fn object_links(&self, cid: &Cid) -> anyhow::Result<ObjectLinks> {
        let arg = cid.to_string();
        let stat: ObjectStat = self.rpc_json("object/stat", &[("arg", &arg)]).await?;
        let links: ObjectLinksResponse = self.rpc_json("object/links", &[("arg", &arg)]).await?;
        Ok(ObjectLinks {
            data_size: stat.data_size,
            links: links
                .links
                .unwrap_or_default()
                .into_iter()
                .map(|link| {
                    Ok(Link {
                        cid: parse_cid(&link.hash)?,
                        name: link.name,
                    })
                })
                .collect::<anyhow::Result<_>>()?,
        })
    }

    async fn list_children(&self, cid: &Cid) -> anyhow::Result<Vec<Child>> {
        let arg = cid.to_string();
        let response: LsResponse = self
            .rpc_json(
                "ls",
                &[("arg", &arg), ("resolve-type", "true"), ("size", "false")],
            )
            .await?;
        response
            .objects
            .into_iter()
            .flat_map(|object| object.links.unwrap_or_default())
            .filter(|link| !link.name.is_empty())
            .map(|link| {
                Ok(Child {
                    cid: parse_cid(&link.hash)?,
                    is_dir: matches!(link.kind, UNIXFS_DIRECTORY | UNIXFS_HAMT_SHARD),
                    name: link.name,
                })
            })
            .collect()
    }

    async fn get_block(&self, cid: &Cid) -> anyhow::Result<Bytes> {
        let arg = cid.to_string();
        Ok(self
            .rpc("block/get", &[("arg", &arg)], None)
            .await?
            .bytes()
            .await?)
    }

    async fn has_block(&self, cid: &Cid) -> anyhow::Result<bool> {
        let arg = cid.to_string();
        // `offline` keeps Kubo from searching the network for a missing block.
        let response = self
            .client
            .post(self.rpc_url("block/stat")?)
            .query(&[("arg", arg.as_str()), ("offline", "true")])
            .send()
            .await
            .context("kubo block/stat request failed")?;
        Ok(response.status().is_success())
    }

    async fn cat(&self, path: &str) -> anyhow::Result<Bytes> {
        let url = self.gateway.join(&format!("ipfs/{path}"))?;
        let response = self
            .client
            .get(url)
            .timeout(self.gateway_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?)
    }

    async fn restore(&self, cid: &Cid, data: Bytes) -> anyhow::Result<()> {
        let (Some(codec), Some(mhtype)) = (codec_name(cid), multihash_name(cid)) else {
            anyhow::bail!("cannot restore {cid}: unsupported codec or hash function");
        };

        // Directory nodes and raw leaves come back byte-for-byte as blocks.
        let form = Form::new().part("data", Part::bytes(data.to_vec()));
        let put = self
            .rpc(
                "block/put",
                &[("cid-codec", codec), ("mhtype", mhtype), ("pin", "false")],
                Some(form),
            )
            .await;
        match put {
            Ok(response) => {
                let BlockPutResponse { key } = response.json().await?;
                if parse_cid(&key)?.hash() == cid.hash() {
                    return Ok(());
                }
            }
            Err(e) => debug!("{cid} is not a single block: {e:#}"),
        }

        // Whole files are re-imported with the default chunker, which yields
        // the original DAG when the tree was added with default settings.
        let version = if cid.version() == cid::Version::V0 {
            "0"
        } else {
            "1"
        };
        let form = Form::new().part("file", Part::bytes(data.to_vec()).file_name(cid.to_string()));
        let added = self
            .add(form, &[("pin", "true"), ("cid-version", version)])
            .await?;
        let restored = added
            .last()
            .with_context(|| format!("kubo did not report an object for {cid}"))?;
        let restored = parse_cid(&restored.hash)?;
        anyhow::ensure!(
            restored.hash() == cid.hash(),
            "content fetched for {cid} was imported as {restored}"
        );
        Ok(())
    }
}
