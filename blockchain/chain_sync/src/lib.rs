// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod bad_tipset_cache;
mod consensus;
mod errors;
mod fetcher;
mod state;
mod sync;

pub use self::bad_tipset_cache::BadTipsetCache;
pub use self::consensus::Consensus;
pub use self::errors::Error;
pub use self::fetcher::SyncFetcher;
pub use self::state::{StateTree, StateTreeStore};
pub use self::sync::{ChainSyncer, SyncMode, FINALITY_LIMIT, LOOKBACK_PARAMETER};
