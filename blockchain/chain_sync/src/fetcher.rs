// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use async_trait::async_trait;
use blocks::BlockHeader;
use cid::Cid;

/// The networked block fetching service. In production this wraps an
/// exchange session over the node's shared blockstore, so blocks available
/// locally resolve without going to the network.
#[async_trait]
pub trait SyncFetcher: Send + Sync {
    /// Resolves the given cids to blocks. All or nothing: failure to resolve
    /// any one block fails the whole request. Honors cancellation by drop.
    async fn get_blocks(&self, cids: &[Cid]) -> Result<Vec<BlockHeader>, String>;
}
