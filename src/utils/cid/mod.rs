// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use multihash_codetable::{Code, MultihashDigest as _};

/// `dag-pb` multicodec, used by `UnixFS` directories and chunked files.
pub const DAG_PB: u64 = 0x70;
/// `raw` multicodec, used by `UnixFS` leaves.
pub const RAW: u64 = 0x55;

const SHA2_256: u64 = 0x12;
const BLAKE2B_256: u64 = 0xb220;

/// `CIDv1` of `data` with the `raw` codec and a SHA-256 multihash.
pub fn raw_cid(data: &[u8]) -> Cid {
    Cid::new_v1(RAW, Code::Sha2_256.digest(data))
}

/// `CIDv1` of `data` with the `dag-pb` codec and a SHA-256 multihash.
pub fn dag_pb_cid(data: &[u8]) -> Cid {
    Cid::new_v1(DAG_PB, Code::Sha2_256.digest(data))
}

/// Name of the codec as understood by the Kubo RPC API.
pub fn codec_name(cid: &Cid) -> Option<&'static str> {
    match cid.codec() {
        DAG_PB => Some("dag-pb"),
        RAW => Some("raw"),
        0x71 => Some("dag-cbor"),
        _ => None,
    }
}

/// Name of the multihash function as understood by the Kubo RPC API.
pub fn multihash_name(cid: &Cid) -> Option<&'static str> {
    match cid.hash().code() {
        SHA2_256 => Some("sha2-256"),
        BLAKE2B_256 => Some("blake2b-256"),
        _ => None,
    }
}
