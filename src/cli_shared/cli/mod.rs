// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod completion_cmd;
mod config;

pub use self::{completion_cmd::CompletionCommand, config::*};

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use directories::ProjectDirs;
use tracing::warn;

use crate::utils::misc::LoggingColor;

pub const CONFIG_PATH_ENV: &str = "FILSTASH_CONFIG_PATH";

pub static HELP_MESSAGE: &str = "\
{name} {version}
{author}
{about}

{usage}

SUBCOMMANDS:
{subcommands}

OPTIONS:
{options}
";

/// Options shared by every subcommand.
#[derive(Default, Debug, clap::Args)]
pub struct CliOpts {
    /// A TOML file containing relevant configurations
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Directory for hourly rotated log files
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
    /// Enable or disable colored logging in `stdout`
    #[arg(long, global = true, default_value = "auto")]
    pub color: LoggingColor,
}

impl CliOpts {
    pub fn to_config(&self) -> anyhow::Result<(Config, Option<ConfigPath>)> {
        let (path, config) = super::read_config(self.config.as_ref())?;
        Ok((config, path))
    }
}

/// Where the configuration file was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigPath {
    Cli(PathBuf),
    Env(PathBuf),
    Project(PathBuf),
}

impl ConfigPath {
    pub fn to_path_buf(&self) -> &PathBuf {
        match self {
            ConfigPath::Cli(path) | ConfigPath::Env(path) | ConfigPath::Project(path) => path,
        }
    }
}

pub fn find_config_path(config: Option<&PathBuf>) -> Option<ConfigPath> {
    if let Some(s) = config {
        return Some(ConfigPath::Cli(s.to_owned()));
    }
    if let Ok(s) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(s);
        if path.exists() {
            return Some(ConfigPath::Env(path));
        }
        warn!("{CONFIG_PATH_ENV} points at a missing file: {}", path.display());
    }
    if let Some(dir) = ProjectDirs::from("com", "ChainSafe", "Filstash") {
        let path = dir.config_dir().join("config.toml");
        if path.exists() {
            return Some(ConfigPath::Project(path));
        }
    }
    None
}

/// Lists the dotted keys of `path` that do not correspond to any
/// configuration field.
pub fn unknown_keys(path: &Path) -> anyhow::Result<Vec<String>> {
    let file = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file: toml::Table = toml::from_str(&file)?;
    let known: toml::Table = toml::from_str(&toml::to_string(&Config::default())?)?;
    let mut unknown = vec![];
    collect_unknown(&file, &known, "", &mut unknown);
    Ok(unknown)
}

fn collect_unknown(file: &toml::Table, known: &toml::Table, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in file {
        let dotted = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match (value, known.get(key)) {
            (toml::Value::Table(file), Some(toml::Value::Table(known))) => {
                collect_unknown(file, known, &dotted, out)
            }
            (_, Some(_)) => {}
            // Optional fields are absent from the serialized defaults.
            (_, None) if is_optional_key(&dotted) => {}
            (_, None) => out.push(dotted),
        }
    }
}

fn is_optional_key(dotted: &str) -> bool {
    matches!(dotted, "archive.token" | "staging.scratch_dir")
}

pub fn check_for_unknown_keys(path: &Path) {
    match unknown_keys(path) {
        Ok(keys) => {
            for key in keys {
                warn!("unknown configuration key `{key}` in {}", path.display());
            }
        }
        Err(e) => warn!("failed to check {} for unknown keys: {e:#}", path.display()),
    }
}
