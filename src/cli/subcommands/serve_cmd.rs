// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use tokio::net::TcpListener;

use super::{Backends, shutdown_token};
use crate::cli_shared::cli::Config;
use crate::serve::{InFlightBuckets, RetrievalCoalescer, serve};

#[derive(Debug, clap::Args)]
pub struct ServeCommand {
    /// Address to listen on, overrides `serve.listen_address`
    #[arg(long)]
    listen: Option<SocketAddr>,
}

impl ServeCommand {
    pub async fn run(self, config: &Config) -> anyhow::Result<()> {
        let backends = Backends::connect(config).await?;
        let address = self.listen.unwrap_or(config.serve.listen_address);
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("failed to listen on {address}"))?;
        let coalescer = RetrievalCoalescer::new(
            backends.content,
            backends.archive,
            backends.catalog,
            Arc::new(InFlightBuckets::default()),
        )
        .with_scratch_root(config.staging.scratch_dir.clone());
        serve(listener, Arc::new(coalescer), shutdown_token()?).await
    }
}
