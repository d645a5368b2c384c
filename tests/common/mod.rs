// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::path::PathBuf;

use assert_cmd::{Command, cargo::cargo_bin_cmd};
use tempfile::TempDir;

pub fn filstash() -> Command {
    let mut cmd = cargo_bin_cmd!("filstash");
    // Keep the user's configuration out of the tests.
    cmd.env_remove("FILSTASH_CONFIG_PATH").env_remove("RUST_LOG");
    cmd
}

/// Writes a configuration whose catalog lives in a fresh temporary directory.
pub fn create_tmp_config(extra: &str) -> (PathBuf, TempDir) {
    let temp_dir = tempfile::tempdir().expect("couldn't create temp dir");
    let config = format!(
        r#"
[catalog]
path = "{}"

{extra}
"#,
        temp_dir.path().join("catalog.db").display()
    );
    let config_file = temp_dir.path().join("config.toml");
    std::fs::write(&config_file, config).expect("couldn't write config");
    (config_file, temp_dir)
}
