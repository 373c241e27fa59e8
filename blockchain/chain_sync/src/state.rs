// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::Error;
use cid::Cid;

/// Narrow interface to a materialized state tree. The synchronizer only ever
/// threads state trees between the store and the consensus protocol; it
/// never inspects them.
pub trait StateTree {
    /// Writes the tree to its backing store and returns the new root cid.
    fn flush(&mut self) -> Result<Cid, Error>;
}

/// Interface to the engine that resolves state roots to state trees.
pub trait StateTreeStore: Send + Sync {
    type Tree: StateTree + Send;

    /// Loads the state tree with the given root. Fails if the root is not
    /// resolvable.
    fn load_state_tree(&self, root: &Cid) -> Result<Self::Tree, Error>;
}
