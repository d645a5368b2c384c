// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod cid;
pub mod io;
pub mod misc;
pub mod net;
pub mod sqlite;
