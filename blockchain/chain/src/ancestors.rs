// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::{ChainStore, Error};
use blocks::{ChainEpoch, Tipset};
use std::sync::Arc;

/// Lazy iterator over a tipset and its ancestors, oldest last. Walks the
/// parent links through the store until the genesis tipset (empty parent
/// set) is reached. Restart by constructing a new iterator with the same
/// start.
pub struct AncestorIterator<'a, S> {
    store: &'a S,
    next: Option<Arc<Tipset>>,
}

impl<'a, S> Iterator for AncestorIterator<'a, S>
where
    S: ChainStore,
{
    type Item = Result<Arc<Tipset>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let ts = self.next.take()?;
        if !ts.is_genesis() {
            match self.store.get_tipset(ts.parents()) {
                Ok(parent) => self.next = Some(parent),
                Err(e) => return Some(Err(e)),
            }
        }
        Some(Ok(ts))
    }
}

/// Returns an iterator over `start` and all of its ancestors.
pub fn iter_ancestors<S>(store: &S, start: Arc<Tipset>) -> AncestorIterator<'_, S>
where
    S: ChainStore,
{
    AncestorIterator {
        store,
        next: Some(start),
    }
}

/// Drains the iterator into a list, stopping at the first tipset with an
/// epoch below `min_height`.
pub fn collect_tipsets_of_height_at_least<I>(
    iter: I,
    min_height: ChainEpoch,
) -> Result<Vec<Arc<Tipset>>, Error>
where
    I: Iterator<Item = Result<Arc<Tipset>, Error>>,
{
    let mut collected = Vec::new();
    for item in iter {
        let ts = item?;
        if ts.epoch() < min_height {
            break;
        }
        collected.push(ts);
    }
    Ok(collected)
}

/// Returns the ancestors of `parent` (inclusive) covering the `rounds`
/// epochs below `child_height`, newest first. The window is clamped at the
/// genesis tipset.
pub fn get_recent_ancestors<S>(
    store: &S,
    parent: Arc<Tipset>,
    child_height: ChainEpoch,
    rounds: ChainEpoch,
) -> Result<Vec<Arc<Tipset>>, Error>
where
    S: ChainStore,
{
    let min_height = (child_height - rounds).max(0);
    collect_tipsets_of_height_at_least(iter_ancestors(store, parent), min_height)
}

/// Classifies a head transition. Given the previous head and the ordered
/// ancestor list of the proposed new head (newest last), the transition is a
/// linear extension iff the previous head appears in the list; otherwise it
/// is a reorg.
pub fn is_reorg(old_head: &Tipset, new_chain: &[Arc<Tipset>]) -> bool {
    !new_chain.iter().any(|ts| ts.key() == old_head.key())
}
