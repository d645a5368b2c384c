// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod archive;
mod catalog;
mod cli;
mod cli_shared;
mod content_store;
mod metrics;
mod model;
mod reconcile;
mod serve;
mod stage;
#[cfg(test)]
mod test_utils;
mod utils;

pub use cli::main::main as filstash_main;
pub use cli_shared::cli::Config;
