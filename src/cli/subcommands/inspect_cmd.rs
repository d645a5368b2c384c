// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::io::Write;

use cid::Cid;
use human_repr::HumanCount as _;

use crate::catalog::{Catalog, SqliteCatalog};
use crate::cli_shared::cli::Config;

#[derive(Debug, clap::Args)]
pub struct InspectCommand {
    /// Root content id printed by `filstash stage`
    root: Cid,
}

impl InspectCommand {
    pub async fn run(self, config: &Config) -> anyhow::Result<()> {
        let catalog = SqliteCatalog::open(&config.catalog.path).await?;
        inspect(&catalog, &self.root, &mut std::io::stdout()).await
    }
}

/// Writes one line per bucket with its member count and job state, then a
/// verdict on how far the tree got.
async fn inspect(catalog: &dyn Catalog, root: &Cid, sink: &mut impl Write) -> anyhow::Result<()> {
    let Some(tree) = catalog.find_tree(root).await? else {
        writeln!(sink, "{root} has not been staged")?;
        return Ok(());
    };

    let mut unsealed = 0;
    let mut unsubmitted = 0;
    for (index, bucket) in tree.buckets.iter().enumerate() {
        let members = catalog.entries_in_bucket(bucket).await?;
        let bytes = members
            .iter()
            .filter(|entry| !entry.is_dir)
            .map(|entry| entry.size)
            .sum::<u64>();
        if members.is_empty() {
            unsealed += 1;
        }
        let job = match tree.job_for_bucket(bucket) {
            Some(job) => match &job.cause {
                Some(cause) => format!("{} {} ({cause})", job.id, job.status),
                None => format!("{} {}", job.id, job.status),
            },
            None => {
                unsubmitted += 1;
                "no job".to_string()
            }
        };
        writeln!(
            sink,
            "bucket {index} {bucket}: {} entries, {}, {job}",
            members.len(),
            bytes.human_count_bytes()
        )?;
    }

    let verdict = if !tree.complete || unsealed > 0 {
        "partially staged"
    } else if unsubmitted > 0 || tree.buckets.is_empty() {
        "staged, not fully submitted"
    } else if tree.is_settled() {
        "settled"
    } else {
        "storing"
    };
    writeln!(sink, "{root}: {verdict}")?;
    Ok(())
}
