// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use blocks::{ChainEpoch, Tipset, TipsetKeys};
use cid::Cid;
use std::collections::HashMap;
use std::sync::Arc;

/// `TipsetMetadata` is the type stored as the value in the `TipIndex`. It
/// pairs a tipset with the root cid of the chain's state after applying that
/// tipset to its parent state. The two are only ever recorded together.
#[derive(Clone, Debug, PartialEq)]
pub struct TipsetMetadata {
    /// Root of the aggregate state after applying the tipset
    pub tipset_state_root: Cid,

    /// The set of blocks that forms the tipset
    pub tipset: Arc<Tipset>,
}

/// Tracks tipsets and their states by tipset key, with a secondary index by
/// parent key and epoch for widening lookups.
#[derive(Debug, Default)]
pub struct TipIndex {
    /// Metadata for every recorded tipset, keyed by the tipset's own key
    metadata_by_key: HashMap<TipsetKeys, TipsetMetadata>,
    /// Keys of recorded tipsets grouped by their parent key and epoch
    keys_by_parents_and_epoch: HashMap<(TipsetKeys, ChainEpoch), Vec<TipsetKeys>>,
}

impl TipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry to the index. After this call the metadata can be looked
    /// up by the tipset's key, and the key by the tipset's parents and epoch.
    pub fn put(&mut self, meta: TipsetMetadata) {
        let key = meta.tipset.key().clone();
        let parent_key = meta.tipset.parents().clone();
        let epoch = meta.tipset.epoch();

        let siblings = self
            .keys_by_parents_and_epoch
            .entry((parent_key, epoch))
            .or_default();
        if !siblings.contains(&key) {
            siblings.push(key.clone());
        }
        self.metadata_by_key.insert(key, meta);
    }

    /// Returns the metadata recorded for the given tipset key.
    pub fn get(&self, key: &TipsetKeys) -> Option<&TipsetMetadata> {
        self.metadata_by_key.get(key)
    }

    /// Returns true if the given tipset key has been recorded.
    pub fn contains(&self, key: &TipsetKeys) -> bool {
        self.metadata_by_key.contains_key(key)
    }

    /// Returns true if any tipset with the given parents and epoch has been
    /// recorded.
    pub fn has_by_parents_and_epoch(&self, parents: &TipsetKeys, epoch: ChainEpoch) -> bool {
        self.keys_by_parents_and_epoch
            .contains_key(&(parents.clone(), epoch))
    }

    /// Returns the metadata of every recorded tipset with the given parents
    /// and epoch, in insertion order.
    pub fn get_by_parents_and_epoch(
        &self,
        parents: &TipsetKeys,
        epoch: ChainEpoch,
    ) -> Vec<TipsetMetadata> {
        self.keys_by_parents_and_epoch
            .get(&(parents.clone(), epoch))
            .map(|keys| {
                keys.iter()
                    .filter_map(|key| self.metadata_by_key.get(key))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{construct_tipset, template_key};

    fn meta_setup(epoch: ChainEpoch, weight: u64) -> TipsetMetadata {
        TipsetMetadata {
            tipset_state_root: template_key(b"state root"),
            tipset: Arc::new(construct_tipset(epoch, weight)),
        }
    }

    #[test]
    fn put_and_get_test() {
        let meta = meta_setup(1, 10);
        let mut index = TipIndex::new();
        index.put(meta.clone());

        let result = index.get(meta.tipset.key()).unwrap();
        assert_eq!(result, &meta);
        assert!(index.contains(meta.tipset.key()));
    }

    #[test]
    fn get_missing_test() {
        let index = TipIndex::new();
        let meta = meta_setup(1, 10);
        assert!(index.get(meta.tipset.key()).is_none());
        assert!(!index.contains(meta.tipset.key()));
    }

    #[test]
    fn get_by_parents_and_epoch_test() {
        let meta = meta_setup(1, 10);
        let mut index = TipIndex::new();
        index.put(meta.clone());

        let parents = meta.tipset.parents();
        assert!(index.has_by_parents_and_epoch(parents, 1));
        let found = index.get_by_parents_and_epoch(parents, 1);
        assert_eq!(found, vec![meta.clone()]);

        // wrong epoch misses the secondary index
        assert!(!index.has_by_parents_and_epoch(parents, 2));
        assert!(index.get_by_parents_and_epoch(parents, 2).is_empty());
    }

    #[test]
    fn put_is_idempotent() {
        let meta = meta_setup(1, 10);
        let mut index = TipIndex::new();
        index.put(meta.clone());
        index.put(meta.clone());

        let found = index.get_by_parents_and_epoch(meta.tipset.parents(), 1);
        assert_eq!(found.len(), 1);
    }
}
