// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::ffi::OsString;

use anyhow::Context as _;
use clap::Parser as _;
use tracing::info;

use super::subcommands::{Cli, Subcommand};
use crate::cli_shared::cli::{ConfigPath, check_for_unknown_keys};
use crate::cli_shared::logger;

pub fn main<ArgT>(args: impl IntoIterator<Item = ArgT>) -> anyhow::Result<()>
where
    ArgT: Into<OsString> + Clone,
{
    // Capture Cli inputs
    let Cli { opts, cmd } = Cli::parse_from(args);

    let (config, path) = opts.to_config().context("Error parsing config")?;

    // These only print to stdout, keep it free of log lines.
    if !matches!(cmd, Subcommand::Config(_) | Subcommand::Completion(_)) {
        logger::setup_logger(&opts, &config.log);
        match &path {
            Some(path) => {
                match path {
                    ConfigPath::Env(path) => info!("FILSTASH_CONFIG_PATH loaded: {}", path.display()),
                    ConfigPath::Project(path) => info!("Project config loaded: {}", path.display()),
                    ConfigPath::Cli(_) => (),
                }
                check_for_unknown_keys(path.to_path_buf());
            }
            None => info!("Using default config"),
        }
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?
        .block_on(cmd.run(&config))
}
