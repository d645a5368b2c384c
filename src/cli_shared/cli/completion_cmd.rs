// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::io::Write;

use clap::Command;
use clap_complete::aot::{Shell, generate};

/// Prints a shell completion script for `filstash`
#[derive(Debug, clap::Args)]
pub struct CompletionCommand {
    /// The shell to generate completions for
    #[arg(long, default_value = "bash")]
    shell: Shell,
}

impl CompletionCommand {
    pub fn run(self, cmd: &mut Command, sink: &mut impl Write) -> anyhow::Result<()> {
        let bin_name = cmd
            .get_bin_name()
            .unwrap_or_else(|| cmd.get_name())
            .to_string();
        generate(self.shell, cmd, bin_name, sink);
        Ok(())
    }
}
