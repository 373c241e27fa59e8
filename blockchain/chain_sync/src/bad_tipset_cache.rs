// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use blocks::{Tipset, TipsetKeys};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Thread-safe cache of tipset keys known to be invalid, or to descend from
/// an invalid tipset. Checked during chain collection to short-circuit
/// traversals over chains that have already failed validation. Membership is
/// monotone for the life of the cache; absence does not imply validity.
#[derive(Debug, Default)]
pub struct BadTipsetCache {
    cache: Mutex<HashSet<TipsetKeys>>,
}

impl BadTipsetCache {
    /// Returns true if the tipset key has been marked bad.
    pub fn has(&self, key: &TipsetKeys) -> bool {
        self.cache.lock().contains(key)
    }

    /// Marks a tipset key as bad.
    pub fn add(&self, key: TipsetKeys) {
        self.cache.lock().insert(key);
    }

    /// Marks the key of every tipset in the chain as bad.
    pub fn add_chain(&self, tipsets: &[Arc<Tipset>]) {
        let mut cache = self.cache.lock();
        for ts in tipsets {
            cache.insert(ts.key().clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::construct_tipset;

    #[test]
    fn membership_is_monotone() {
        let cache = BadTipsetCache::default();
        let ts = Arc::new(construct_tipset(1, 10));

        assert!(!cache.has(ts.key()));
        cache.add(ts.key().clone());
        assert!(cache.has(ts.key()));

        // re-adding and chain additions never revoke membership
        cache.add_chain(&[Arc::clone(&ts)]);
        cache.add(ts.key().clone());
        assert!(cache.has(ts.key()));
    }

    #[test]
    fn add_chain_marks_every_tipset() {
        let cache = BadTipsetCache::default();
        let chain: Vec<_> = (1..4)
            .map(|epoch| Arc::new(construct_tipset(epoch, 10)))
            .collect();
        cache.add_chain(&chain);
        for ts in &chain {
            assert!(cache.has(ts.key()));
        }
    }
}
