// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::num::NonZeroU64;

use crate::model::TreeEntry;

/// A group of entries archived together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub index: usize,
    pub entries: Vec<TreeEntry>,
}

impl Bucket {
    fn new(index: usize) -> Self {
        Self {
            index,
            entries: vec![],
        }
    }

    /// Bytes counted against the size bound. Directories are free.
    pub fn file_bytes(&self) -> u64 {
        self.entries
            .iter()
            .filter(|entry| !entry.is_dir)
            .map(|entry| entry.size)
            .fold(0, u64::saturating_add)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Groups entries into buckets of at most `max_size` file bytes.
///
/// Bucket 0 holds every directory. Files are taken in order and appended to
/// the open bucket while they fit; a file that does not fit seals it and opens
/// the next one. A file larger than `max_size` gets a bucket of its own. The
/// result is always non-empty and only bucket 0 can be empty.
pub fn pack(entries: impl IntoIterator<Item = TreeEntry>, max_size: NonZeroU64) -> Vec<Bucket> {
    let max_size = max_size.get();
    let mut directories = Bucket::new(0);
    let mut sealed: Vec<Bucket> = vec![];
    let mut open: Option<(Bucket, u64)> = None;

    for entry in entries {
        if entry.is_dir {
            directories.entries.push(entry);
            continue;
        }
        let size = entry.size;
        match open.as_mut() {
            Some((bucket, bytes)) if bytes.saturating_add(size) <= max_size => {
                *bytes += size;
                bucket.entries.push(entry);
            }
            _ => {
                if let Some((bucket, _)) = open.take() {
                    sealed.push(bucket);
                }
                let mut bucket = Bucket::new(sealed.len() + 1);
                bucket.entries.push(entry);
                open = Some((bucket, size));
            }
        }
    }
    sealed.extend(open.map(|(bucket, _)| bucket));

    std::iter::once(directories).chain(sealed).collect()
}
