// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::StateTree;
use async_trait::async_trait;
use blocks::{BlockHeader, ChainEpoch, Tipset};
use std::fmt::{Debug, Display};
use std::sync::Arc;

/// The `Consensus` trait encapsulates the consensus-specific rules the
/// synchronizer defers to: grouping fetched blocks into valid tipsets,
/// running the state transition that decides tipset validity, and comparing
/// chain weights. The synchronizer drives the control flow; everything that
/// distinguishes one consensus protocol from another lives behind this
/// trait.
#[async_trait]
pub trait Consensus: Send + Sync {
    type Error: Debug + Display + Send + Sync;
    type Tree: StateTree + Send;

    /// Rounds of ancestor context the state transition needs, not counting
    /// the lookback used for randomness sampling.
    const ANCESTOR_ROUNDS_NEEDED: ChainEpoch;

    /// Groups fetched blocks into a tipset and surface-validates it. The
    /// returned tipset satisfies the protocol's grouping rule; full
    /// validation is deferred to `run_state_transition`.
    fn new_valid_tipset(&self, headers: Vec<BlockHeader>) -> Result<Tipset, Self::Error>;

    /// Runs the state transition for `next` on top of `parent_state`,
    /// consuming the ancestor window gathered by the caller. This is the
    /// sole validity gate: an error means `next` is invalid.
    async fn run_state_transition(
        &self,
        next: &Tipset,
        ancestors: &[Arc<Tipset>],
        parent_state: Self::Tree,
    ) -> Result<Self::Tree, Self::Error>;

    /// Returns true iff tipset `a` represents a strictly heavier chain than
    /// tipset `b`. `b_parent_state` is `None` only when `b` is the genesis
    /// tipset, whose parent state is the empty state tree.
    fn is_heavier(
        &self,
        a: &Tipset,
        b: &Tipset,
        a_parent_state: &Self::Tree,
        b_parent_state: Option<&Self::Tree>,
    ) -> Result<bool, Self::Error>;
}
