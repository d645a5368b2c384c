// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use tracing_subscriber::{EnvFilter, Registry, prelude::*};

use crate::cli_shared::cli::{CliOpts, LogConfig};

/// Installs the console logger and, with `--log-dir`, an hourly rotated file
/// logger. `RUST_LOG` takes precedence over the configured filters.
pub fn setup_logger(opts: &CliOpts, log: &LogConfig) {
    let mut layers: Vec<Box<dyn tracing_subscriber::layer::Layer<Registry> + Send + Sync>> =
        // console logger
        vec![Box::new(
            tracing_subscriber::fmt::Layer::new()
                .with_ansi(opts.color.coloring_enabled())
                .with_writer(std::io::stderr)
                .with_filter(get_env_filter(default_env_filter(log))),
        )];

    // file logger
    if let Some(log_dir) = &opts.log_dir {
        let file_appender = tracing_appender::rolling::hourly(log_dir, "filstash.log");
        layers.push(Box::new(
            tracing_subscriber::fmt::Layer::new()
                .with_ansi(false)
                .with_writer(file_appender)
                .with_filter(get_env_filter(default_env_filter(log))),
        ));
    }

    tracing_subscriber::registry().with(layers).init();
}

/// Returns an [`EnvFilter`] according to the `RUST_LOG` environment variable, or `def`.
fn get_env_filter(def: EnvFilter) -> EnvFilter {
    use std::env::{
        self,
        VarError::{NotPresent, NotUnicode},
    };
    match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(s) => EnvFilter::new(s),
        Err(NotPresent) => def,
        Err(NotUnicode(_)) => EnvFilter::default(),
    }
}

fn default_directives(log: &LogConfig) -> String {
    let configured = log.to_filter_string();
    if configured.is_empty() {
        "info".into()
    } else {
        format!("info,{configured}")
    }
}

fn default_env_filter(log: &LogConfig) -> EnvFilter {
    let directives = default_directives(log);
    EnvFilter::try_new(&directives).unwrap_or_else(|e| {
        // The subscriber is not installed yet.
        eprintln!("ignoring invalid log filters `{directives}`: {e}");
        EnvFilter::new("info")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli_shared::cli::LogValue;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_default_env_filter() {
        let _did_not_panic = default_env_filter(&LogConfig::default());
    }

    #[test]
    fn configured_filters_follow_the_default_level() {
        let log = LogConfig {
            filters: vec![LogValue::new("filstash::reconcile", LevelFilter::DEBUG)],
        };
        assert_eq!(
            default_directives(&log).to_lowercase(),
            "info,filstash::reconcile=debug"
        );
        assert_eq!(default_directives(&LogConfig { filters: vec![] }), "info");
    }
}
