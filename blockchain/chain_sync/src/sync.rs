// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::bad_tipset_cache::BadTipsetCache;
use crate::{Consensus, Error, StateTree, StateTreeStore, SyncFetcher};
use async_std::future::timeout;
use async_std::sync::Mutex;
use blocks::{BlockHeader, ChainEpoch, Tipset, TipsetKeys};
use chain::{ChainStore, TipsetMetadata};
use cid::Cid;
use log::{debug, info};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// The amount of time the syncer will wait while fetching the blocks of a
/// tipset over the network.
const BLOCK_WAIT_TIME: Duration = Duration::from_secs(30);

/// The maximum number of tipsets of divergence from the current chain
/// accepted once in caught up mode.
pub const FINALITY_LIMIT: usize = 600;

/// The number of rounds in the past the protocol samples randomness from.
pub const LOOKBACK_PARAMETER: ChainEpoch = 3;

/// Whether the node is still fetching a chain significantly behind the
/// current consensus head, or restricts accepted chains to mitigate
/// consensus attacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    /// The node was started recently and the chain is still significantly
    /// behind the current consensus head. Backward traversal is unbounded.
    Syncing,
    /// The node has caught up with the consensus head. Backward traversal is
    /// bounded by the finality limit.
    CaughtUp,
}

/// `ChainSyncer` updates its chain store according to the rules of its
/// consensus protocol. It uses a bad tipset cache and a limit on new tipsets
/// to traverse during chain collection. The `ChainSyncer` can query the
/// network for blocks. The `ChainSyncer` maintains the following invariant
/// on its store: all tipsets that pass the syncer's validity checks are
/// added to the chain store along with their computed state.
///
/// The widen function, the fact that widen is called on only one tipset in
/// the incoming chain, and the assumption that grandparent state exists in
/// the store couple the syncer to heaviest-tipset consensus protocols.
pub struct ChainSyncer<ST, C, S, F> {
    /// Ensures at most one call to `handle_new_tipset` executes at any time.
    /// `sync_one` assumes the head does not change between its weight
    /// comparison and the store update, and `widen` assumes no concurrent
    /// widening, so all chain ingestion is serialized here.
    lock: Mutex<()>,

    /// Engine resolving state roots to state trees.
    state_store: ST,

    /// The consensus rules driving tipset validation and weighing.
    consensus: C,

    /// Access and store tipsets and their computed states.
    chain_store: Arc<S>,

    /// The networked block fetching service.
    fetcher: F,

    /// Filters out chains containing known-invalid tipsets.
    bad_tipsets: BadTipsetCache,

    /// Presently always `Syncing` pending a transition rule from the
    /// consensus protocol.
    sync_mode: RwLock<SyncMode>,
}

impl<ST, C, S, F> ChainSyncer<ST, C, S, F>
where
    ST: StateTreeStore,
    C: Consensus<Tree = ST::Tree>,
    S: ChainStore,
    F: SyncFetcher,
{
    /// Constructs a `ChainSyncer` ready for use.
    pub fn new(state_store: ST, consensus: C, chain_store: Arc<S>, fetcher: F) -> Self {
        Self {
            lock: Mutex::new(()),
            state_store,
            consensus,
            chain_store,
            fetcher,
            bad_tipsets: BadTipsetCache::default(),
            sync_mode: RwLock::new(SyncMode::Syncing),
        }
    }

    /// Returns the current sync mode.
    pub fn sync_mode(&self) -> SyncMode {
        *self.sync_mode.read()
    }

    /// Transitions the syncer into caught up mode. The transition is one-way
    /// for the life of the syncer.
    pub fn set_caught_up(&self) {
        *self.sync_mode.write() = SyncMode::CaughtUp;
    }

    /// Returns the cache of tipsets known to be invalid.
    pub fn bad_tipsets(&self) -> &BadTipsetCache {
        &self.bad_tipsets
    }

    /// Extends the syncer's chain store with the chain ending in the given
    /// tipset key, if it represents a valid extension. Limits the length of
    /// new chains it will attempt to validate and caches invalid tipsets it
    /// has encountered.
    pub async fn handle_new_tipset(&self, tipset_keys: &TipsetKeys) -> Result<(), Error> {
        debug!("begin fetch and sync of chain with head {:?}", tipset_keys);

        // This lock can be held for a long time as the blocks of the new
        // chain are fetched. The node is of little use until it is synced,
        // so callers wait here rather than fetching chains independently.
        let _lock = self.lock.lock().await;

        // If the store already has all these blocks the syncer is finished.
        if self.chain_store.has_all_blocks(tipset_keys.cids()) {
            return Ok(());
        }

        // Walk the chain given by the input key back to a known tipset in
        // the store. This is the only code that may go to the network to
        // resolve cids to blocks.
        let chain = self.collect_chain(tipset_keys).await?;
        let first = match chain.first() {
            Some(ts) => Arc::clone(ts),
            None => return Ok(()),
        };
        let mut parent = self.chain_store.get_tipset(first.parents())?;

        // Try adding the tipsets of the chain to the store, checking for new
        // heaviest tipsets.
        for (i, ts) in chain.iter().enumerate() {
            // Only the first tipset of the chain can have unobserved siblings
            // in the store; the rest were discovered by parent links and are
            // fixed.
            if i == 0 {
                if let Some(wts) = self.widen(ts)? {
                    debug!("attempt to sync after widen");
                    self.sync_one(&parent, &wts).await?;
                }
            }
            if let Err(e) = self.sync_one(&parent, ts).await {
                // `sync_one` can fail for reasons other than consensus, but
                // the tipset and its descendants are marked bad regardless.
                self.bad_tipsets.add_chain(&chain[i..]);
                return Err(e);
            }
            if i % 500 == 0 {
                info!(
                    "processing tipset {} of {} for chain with head at {:?}",
                    i,
                    chain.len(),
                    tipset_keys
                );
            }
            parent = Arc::clone(ts);
        }
        Ok(())
    }

    /// Resolves cids of blocks through the fetcher, bounded by the fetch
    /// deadline. All or nothing: errors if any of the blocks cannot be
    /// resolved.
    async fn get_blocks_maybe_from_net(&self, cids: &[Cid]) -> Result<Vec<BlockHeader>, Error> {
        match timeout(BLOCK_WAIT_TIME, self.fetcher.get_blocks(cids)).await {
            Ok(blocks) => blocks.map_err(Error::Fetch),
            Err(_) => Err(Error::Fetch(format!(
                "timed out after {:?} resolving {} blocks",
                BLOCK_WAIT_TIME,
                cids.len()
            ))),
        }
    }

    /// Resolves the cids of the candidate head and its ancestors to blocks
    /// until it resolves a tipset already tracked in the store, returning
    /// the chain of new incompletely validated tipsets, oldest first. Errors
    /// if any set of cids resolves to blocks that do not form a tipset, or
    /// if any tipset has already been recorded as part of an invalid chain.
    /// Does not add tipsets to the store.
    async fn collect_chain(&self, head_key: &TipsetKeys) -> Result<Vec<Arc<Tipset>>, Error> {
        let mut chain: Vec<Arc<Tipset>> = Vec::new();
        let mut cursor = head_key.clone();
        let mut count: u64 = 0;

        // Keep collecting while not yet caught up or within the finality
        // limit, otherwise reject the input as a likely invalid chain or
        // denial of service attempt.
        while self.sync_mode() == SyncMode::Syncing || chain.len() < FINALITY_LIMIT {
            // Finish traversal if the tipset is tracked in the store.
            if self.chain_store.has_tipset_and_state(&cursor) {
                info!("chain fetch from network complete {:?}", head_key);
                return Ok(chain);
            }

            debug!("collect_chain next link: {:?}", cursor);

            if self.bad_tipsets.has(&cursor) {
                return Err(Error::ChainHasBadTipset);
            }

            let blocks = self.get_blocks_maybe_from_net(cursor.cids()).await?;

            let ts = match self.consensus.new_valid_tipset(blocks) {
                Ok(ts) => Arc::new(ts),
                Err(e) => {
                    // The collected tipsets descend from the invalid one.
                    self.bad_tipsets.add(cursor);
                    self.bad_tipsets.add_chain(&chain);
                    return Err(Error::Validation(e.to_string()));
                }
            };

            count += 1;
            if count % 500 == 0 {
                info!("fetching the chain, {} tipsets fetched", count);
            }

            cursor = ts.parents().clone();
            chain.insert(0, ts);
        }

        Err(Error::NewChainTooLong)
    }

    /// Returns the state resulting from applying the given tipset to the
    /// chain. Precondition: the tipset must be tracked in the store.
    fn tipset_state(&self, key: &TipsetKeys) -> Result<ST::Tree, Error> {
        if !self.chain_store.has_tipset_and_state(key) {
            return Err(Error::UnexpectedStoreState(
                "parent tipset must be in the store".to_string(),
            ));
        }
        let state_root = self.chain_store.get_tipset_state_root(key)?;
        self.state_store.load_state_tree(&state_root)
    }

    /// Syncs a single tipset with the chain store. Computes the parent state
    /// of the tipset and calls into consensus to run a state transition in
    /// order to validate it. If the tipset is valid, asks consensus to check
    /// its weight, and updates the head of the store if it is the heaviest.
    ///
    /// Precondition: the caller holds the syncer's lock so the head is not
    /// modified concurrently.
    async fn sync_one(&self, parent: &Arc<Tipset>, next: &Arc<Tipset>) -> Result<(), Error> {
        let head = self.chain_store.get_head();

        // if the tipset is already head, we've been here before. do nothing.
        if next.key() == &head {
            return Ok(());
        }

        // Look up the parent state. The syncer guarantees it is in the
        // chain store.
        let state = self.tipset_state(parent.key())?;

        // Gather the ancestor chain needed to process the state transition.
        let ancestors = chain::get_recent_ancestors(
            self.chain_store.as_ref(),
            Arc::clone(parent),
            next.epoch(),
            C::ANCESTOR_ROUNDS_NEEDED + LOOKBACK_PARAMETER,
        )?;

        // Run a state transition to validate the tipset and compute a new
        // state to add to the store.
        let mut state = self
            .consensus
            .run_state_transition(next, &ancestors, state)
            .await
            .map_err(|e| Error::Validation(e.to_string()))?;
        let state_root = state.flush()?;
        self.chain_store.put_tipset_and_state(TipsetMetadata {
            tipset_state_root: state_root,
            tipset: Arc::clone(next),
        })?;
        debug!("successfully updated store with {:?}", next.key());

        // The tipset is validated and in the store; check whether it is the
        // heaviest and if so update the head.
        let next_parent_state = self.tipset_state(parent.key())?;
        let head_ts = self.chain_store.get_tipset(&head)?;
        let head_parent_state = if head_ts.is_genesis() {
            // the genesis parent state is the empty state tree
            None
        } else {
            Some(self.tipset_state(head_ts.parents())?)
        };

        let heavier = self
            .consensus
            .is_heavier(next, &head_ts, &next_parent_state, head_parent_state.as_ref())
            .map_err(|e| Error::Validation(e.to_string()))?;

        if heavier {
            // Gather the entire new chain for reorg classification.
            let iterator = chain::iter_ancestors(self.chain_store.as_ref(), Arc::clone(parent));
            let mut new_chain = chain::collect_tipsets_of_height_at_least(iterator, 0)?;
            new_chain.push(Arc::clone(next));
            if chain::is_reorg(&head_ts, &new_chain) {
                info!(
                    "reorg occurring while switching from {:?} to {:?}",
                    head_ts.key(),
                    next.key()
                );
            }
            self.chain_store.set_head(next)?;
        }

        Ok(())
    }

    /// Computes a tipset implied by the input tipset and the store that
    /// could potentially be the heaviest tipset: the union of the input
    /// tipset and the biggest tipset in the store with the same parents and
    /// epoch. Returns `None` when the union adds nothing new.
    fn widen(&self, ts: &Arc<Tipset>) -> Result<Option<Arc<Tipset>>, Error> {
        let parents = ts.parents();
        let epoch = ts.epoch();

        if !self
            .chain_store
            .has_tipsets_with_parents_and_epoch(parents, epoch)
        {
            return Ok(None);
        }
        let candidates = self
            .chain_store
            .get_tipsets_by_parents_and_epoch(parents, epoch)?;
        if candidates.is_empty() {
            return Ok(None);
        }

        // Only take the tipset with the most blocks. Ties keep the first
        // candidate in index order.
        let mut max = &candidates[0];
        for candidate in &candidates {
            if candidate.tipset.len() > max.tipset.len() {
                max = candidate;
            }
        }

        // Add the blocks of the biggest tipset in the store to a copy of
        // the input tipset.
        let mut headers = ts.blocks().to_vec();
        for block in max.tipset.blocks() {
            if !headers.iter().any(|h| h.cid() == block.cid()) {
                headers.push(block.clone());
            }
        }
        let wts = Tipset::new(headers)?;

        // The union is only useful if distinct from the input tipset and
        // from the stored one.
        if wts.key() == ts.key() || wts.key() == max.tipset.key() {
            return Ok(None);
        }

        Ok(Some(Arc::new(wts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_std::task;
    use async_trait::async_trait;
    use chain::DefaultStore;
    use db::MemoryDB;
    use test_utils::{construct_tipset, template_key};

    #[derive(Debug)]
    struct TestTree(Cid);

    impl StateTree for TestTree {
        fn flush(&mut self) -> Result<Cid, Error> {
            Ok(self.0)
        }
    }

    struct TestStateStore;

    impl StateTreeStore for TestStateStore {
        type Tree = TestTree;

        fn load_state_tree(&self, root: &Cid) -> Result<TestTree, Error> {
            Ok(TestTree(*root))
        }
    }

    struct TestConsensus;

    #[async_trait]
    impl Consensus for TestConsensus {
        type Error = String;
        type Tree = TestTree;

        const ANCESTOR_ROUNDS_NEEDED: ChainEpoch = 5;

        fn new_valid_tipset(&self, headers: Vec<BlockHeader>) -> Result<Tipset, String> {
            Tipset::new(headers).map_err(|e| e.to_string())
        }

        async fn run_state_transition(
            &self,
            _next: &Tipset,
            _ancestors: &[Arc<Tipset>],
            parent_state: TestTree,
        ) -> Result<TestTree, String> {
            Ok(parent_state)
        }

        fn is_heavier(
            &self,
            _a: &Tipset,
            _b: &Tipset,
            _a_parent_state: &TestTree,
            _b_parent_state: Option<&TestTree>,
        ) -> Result<bool, String> {
            Ok(false)
        }
    }

    struct NoFetcher;

    #[async_trait]
    impl SyncFetcher for NoFetcher {
        async fn get_blocks(&self, cids: &[Cid]) -> Result<Vec<BlockHeader>, String> {
            Err(format!("no fetcher configured for {} blocks", cids.len()))
        }
    }

    #[test]
    fn tipset_state_requires_tracked_parent() {
        let store = Arc::new(DefaultStore::new(Arc::new(MemoryDB::default())));
        let syncer = ChainSyncer::new(TestStateStore, TestConsensus, store, NoFetcher);

        let ts = construct_tipset(1, 10);
        let err = syncer.tipset_state(ts.key()).map(|_| ()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedStoreState(_)));
    }

    #[test]
    fn fetch_failure_surfaces_verbatim() {
        let store = Arc::new(DefaultStore::new(Arc::new(MemoryDB::default())));
        let syncer = ChainSyncer::new(TestStateStore, TestConsensus, store, NoFetcher);

        let err = task::block_on(
            syncer.get_blocks_maybe_from_net(&[template_key(b"some block")]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
    }

    #[test]
    fn sync_mode_transition_is_one_way() {
        let store = Arc::new(DefaultStore::new(Arc::new(MemoryDB::default())));
        let syncer = ChainSyncer::new(TestStateStore, TestConsensus, store, NoFetcher);

        assert_eq!(syncer.sync_mode(), SyncMode::Syncing);
        syncer.set_caught_up();
        assert_eq!(syncer.sync_mode(), SyncMode::CaughtUp);
    }
}
