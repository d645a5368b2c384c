// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use strum::IntoEnumIterator as _;

use super::{Backends, shutdown_token};
use crate::cli_shared::cli::Config;
use crate::model::JobState;
use crate::reconcile::{JobReconciler, ReconcileOptions};

#[derive(Debug, clap::Args)]
pub struct StoreCommand {
    /// Root content id printed by `filstash stage`
    root: Cid,
    /// Stop once every storage job has succeeded or failed
    #[arg(long)]
    exit_when_settled: bool,
}

impl StoreCommand {
    pub async fn run(self, config: &Config) -> anyhow::Result<()> {
        let backends = Backends::connect(config).await?;
        let report = JobReconciler::new(backends.archive, backends.catalog)
            .run(
                &self.root,
                shutdown_token()?,
                ReconcileOptions {
                    exit_when_settled: self.exit_when_settled,
                },
            )
            .await?;

        println!(
            "{} jobs submitted, {} updates applied{}",
            report.submitted,
            report.applied,
            if report.cancelled { " (interrupted)" } else { "" }
        );
        for state in JobState::iter() {
            let count = report.jobs_in(state).count();
            if count > 0 {
                println!("{state}: {count}");
            }
        }
        for job in report.jobs_in(JobState::Failed) {
            println!(
                "failed: {} ({}) {}",
                job.id,
                job.cid,
                job.cause.as_deref().unwrap_or("no cause reported")
            );
        }
        Ok(())
    }
}
