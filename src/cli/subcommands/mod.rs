// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod config_cmd;
mod inspect_cmd;
mod serve_cmd;
mod stage_cmd;
mod store_cmd;

pub(super) use self::{
    config_cmd::ConfigCommands, inspect_cmd::InspectCommand, serve_cmd::ServeCommand,
    stage_cmd::StageCommand, store_cmd::StoreCommand,
};

use std::sync::Arc;

use anyhow::Context as _;
use tokio::signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::archive::PowergateClient;
use crate::catalog::SqliteCatalog;
use crate::cli_shared::cli::{CliOpts, CompletionCommand, Config, HELP_MESSAGE};
use crate::content_store::KuboClient;

/// Stage directory trees into Filecoin storage and serve them back
#[derive(clap::Parser)]
#[command(name = env!("CARGO_PKG_NAME"), bin_name = "filstash", author = env!("CARGO_PKG_AUTHORS"), version = env!("CARGO_PKG_VERSION"), about = env!("CARGO_PKG_DESCRIPTION"))]
#[command(help_template(HELP_MESSAGE))]
pub struct Cli {
    #[command(flatten)]
    pub opts: CliOpts,
    #[command(subcommand)]
    pub cmd: Subcommand,
}

#[derive(clap::Subcommand, Debug)]
pub enum Subcommand {
    /// Split a local directory into buckets and hand them to the archive
    Stage(StageCommand),

    /// Create and follow the storage jobs of a staged tree
    Store(StoreCommand),

    /// Serve staged content over HTTP, fetching evicted buckets on demand
    Serve(ServeCommand),

    /// Print the buckets and storage jobs of a staged tree
    Inspect(InspectCommand),

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Print a shell completion script
    Completion(CompletionCommand),
}

impl Subcommand {
    pub async fn run(self, config: &Config) -> anyhow::Result<()> {
        match self {
            Self::Stage(cmd) => cmd.run(config).await,
            Self::Store(cmd) => cmd.run(config).await,
            Self::Serve(cmd) => cmd.run(config).await,
            Self::Inspect(cmd) => cmd.run(config).await,
            Self::Config(cmd) => cmd.run(config, &mut std::io::stdout()),
            Self::Completion(cmd) => {
                cmd.run(&mut <Cli as clap::CommandFactory>::command(), &mut std::io::stdout())
            }
        }
    }
}

/// Clients of the external services, built from the configuration.
pub(super) struct Backends {
    pub content: Arc<KuboClient>,
    pub archive: Arc<PowergateClient>,
    pub catalog: Arc<SqliteCatalog>,
}

impl Backends {
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let content = KuboClient::new(
            config.content_store.api_url.clone(),
            config.content_store.gateway_url.clone(),
            config.content_store.request_timeout,
        );
        let proxy = KuboClient::new(
            config.archive.ipfs_proxy_url.clone(),
            config.archive.ipfs_proxy_url.clone(),
            config.content_store.request_timeout,
        );
        let archive = PowergateClient::new(
            config.archive.api_url.clone(),
            config.archive.token.clone(),
            proxy,
        );
        let catalog = SqliteCatalog::open(&config.catalog.path)
            .await
            .with_context(|| format!("failed to open catalog {}", config.catalog.path.display()))?;
        Ok(Self {
            content: Arc::new(content),
            archive: Arc::new(archive),
            catalog: Arc::new(catalog),
        })
    }
}

/// Returns a token that is cancelled on Ctrl-C or SIGTERM.
pub(super) fn shutdown_token() -> anyhow::Result<CancellationToken> {
    let token = CancellationToken::new();
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::spawn({
        let token = token.clone();
        async move {
            tokio::select! {
                _ = ctrl_c() => info!("Keyboard interrupt."),
                _ = terminate.recv() => info!("Received SIGTERM."),
            }
            token.cancel();
        }
    });
    Ok(token)
}
