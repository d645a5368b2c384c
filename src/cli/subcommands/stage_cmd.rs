// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::num::NonZeroU64;
use std::path::PathBuf;

use human_repr::HumanCount as _;

use super::Backends;
use crate::cli_shared::cli::Config;
use crate::stage::StagingPipeline;

#[derive(Debug, clap::Args)]
pub struct StageCommand {
    /// Directory to stage
    dir: PathBuf,
    /// Upper bound in bytes on the files packed into one bucket
    #[arg(long)]
    max_bucket_size: Option<NonZeroU64>,
}

impl StageCommand {
    pub async fn run(self, config: &Config) -> anyhow::Result<()> {
        let backends = Backends::connect(config).await?;
        let max_bucket_size = self
            .max_bucket_size
            .unwrap_or(config.staging.max_bucket_size);
        let summary = StagingPipeline::new(
            backends.content,
            backends.archive,
            backends.catalog,
            max_bucket_size,
        )
        .with_scratch_root(config.staging.scratch_dir.clone())
        .stage(&self.dir)
        .await?;

        println!("root: {}", summary.root);
        println!(
            "{} entries, {} in {} buckets ({} reused)",
            summary.entries,
            summary.file_bytes.human_count_bytes(),
            summary.buckets.len(),
            summary.reused
        );
        for bucket in &summary.buckets {
            println!("bucket: {bucket}");
        }
        Ok(())
    }
}
