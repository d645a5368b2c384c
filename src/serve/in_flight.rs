// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use ahash::HashSet;
use cid::Cid;
use parking_lot::Mutex;

/// Buckets with a retrieval in progress.
pub trait InFlightSet: Send + Sync {
    /// Atomically checks for and records `bucket`. Returns `false` when it was
    /// already recorded.
    fn try_insert(&self, bucket: Cid) -> bool;

    fn remove(&self, bucket: &Cid);

    fn contains(&self, bucket: &Cid) -> bool;
}

#[derive(Debug, Default)]
pub struct InFlightBuckets {
    buckets: Mutex<HashSet<Cid>>,
}

impl InFlightSet for InFlightBuckets {
    fn try_insert(&self, bucket: Cid) -> bool {
        self.buckets.lock().insert(bucket)
    }

    fn remove(&self, bucket: &Cid) {
        self.buckets.lock().remove(bucket);
    }

    fn contains(&self, bucket: &Cid) -> bool {
        self.buckets.lock().contains(bucket)
    }
}
