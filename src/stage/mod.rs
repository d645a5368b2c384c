// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The write path: enumerate a tree that was added to the content store, pack
//! its entries into size-bounded buckets and hand each bucket to the archive.

mod enumerate;
mod packer;
mod pipeline;

pub use enumerate::{TreeEntries, enumerate_tree};
pub use packer::{Bucket, pack};
pub use pipeline::{StageSummary, StagingPipeline};
