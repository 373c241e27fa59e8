// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// The chain traversed to the candidate head crossed a cached bad tipset.
    #[error("input chain contains a cached bad tipset")]
    ChainHasBadTipset,
    /// While caught up, the candidate diverged from the local head by more
    /// than the finality limit.
    #[error("input chain forked from best chain too far in the past")]
    NewChainTooLong,
    /// A chain store invariant was violated.
    #[error("the chain store is in an unexpected state: {0}")]
    UnexpectedStoreState(String),
    /// Error fetching blocks over the network, surfaced from the fetcher.
    #[error("failed to fetch blocks: {0}")]
    Fetch(String),
    /// The consensus protocol reported an invalid tipset.
    #[error("invalid tipset: {0}")]
    Validation(String),
    /// Error originating from the state-tree engine.
    #[error("state error: {0}")]
    State(String),
    /// Error originating constructing blockchain structures
    #[error("{0}")]
    Blockchain(#[from] blocks::Error),
    /// Error indicating a chain store error
    #[error("{0}")]
    Store(#[from] chain::Error),
}
