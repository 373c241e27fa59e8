// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{Error, TipIndex, TipsetMetadata};
use blocks::{BlockHeader, ChainEpoch, Tipset, TipsetKeys};
use cid::Cid;
use db::Store;
use fvm_ipld_encoding::{from_slice, to_vec};
use log::debug;
use parking_lot::RwLock;
use std::sync::Arc;

/// The key under which the current head tipset keys are written.
const HEAD_KEY: &[u8] = b"head";
/// Prefix of the keys under which tipset state roots are written.
const TIPSET_STATE_PREFIX: &[u8] = b"tsas/";

/// Interface to the chain store consumed by the chain syncer. Every operation
/// is individually linearizable; `put_tipset_and_state` and `set_head` are
/// each atomic with respect to concurrent readers.
pub trait ChainStore: Send + Sync {
    /// Resolves a single block from local storage. Fails if absent.
    fn get_block(&self, cid: &Cid) -> Result<BlockHeader, Error>;

    /// Reads the current head pointer. The returned key is empty only before
    /// the genesis tipset has been installed.
    fn get_head(&self) -> TipsetKeys;

    /// Returns a stored tipset by key. Fails if absent.
    fn get_tipset(&self, key: &TipsetKeys) -> Result<Arc<Tipset>, Error>;

    /// Returns the state root cid recorded for a stored tipset.
    fn get_tipset_state_root(&self, key: &TipsetKeys) -> Result<Cid, Error>;

    /// Returns true if the tipset and its state have been recorded.
    fn has_tipset_and_state(&self, key: &TipsetKeys) -> bool;

    /// Returns true iff every given cid is locally resolvable.
    fn has_all_blocks(&self, cids: &[Cid]) -> bool;

    /// Atomically records a tipset together with its state root, indexing it
    /// by its own key and by its parents and epoch.
    fn put_tipset_and_state(&self, meta: TipsetMetadata) -> Result<(), Error>;

    /// Atomically updates the head pointer. Callers must have recorded the
    /// tipset with `put_tipset_and_state` first.
    fn set_head(&self, ts: &Arc<Tipset>) -> Result<(), Error>;

    /// Returns true if any recorded tipset has the given parents and epoch.
    fn has_tipsets_with_parents_and_epoch(&self, parents: &TipsetKeys, epoch: ChainEpoch) -> bool;

    /// Returns every recorded tipset with the given parents and epoch.
    fn get_tipsets_by_parents_and_epoch(
        &self,
        parents: &TipsetKeys,
        epoch: ChainEpoch,
    ) -> Result<Vec<TipsetMetadata>, Error>;
}

/// Default chain store backed by a key-value store. Tipsets and their state
/// roots are indexed in memory and persisted as raw header and state-root
/// records, so reads fall back to the persisted records when the index is
/// cold.
pub struct DefaultStore<DB> {
    /// key-value datastore
    db: Arc<DB>,

    /// Tracks tipsets and their states by tipset key and by parents and epoch
    tip_index: RwLock<TipIndex>,

    /// Tipset at the head of the best-known chain
    head: RwLock<Option<Arc<Tipset>>>,
}

impl<DB> DefaultStore<DB>
where
    DB: Store + Send + Sync,
{
    pub fn new(db: Arc<DB>) -> Self {
        Self {
            db,
            tip_index: RwLock::new(TipIndex::new()),
            head: RwLock::new(None),
        }
    }

    /// Installs the genesis tipset and its state root, and points the head at
    /// it. The genesis tipset is the only tipset with an empty parent set.
    pub fn set_genesis(&self, tipset: Arc<Tipset>, state_root: Cid) -> Result<(), Error> {
        self.put_tipset_and_state(TipsetMetadata {
            tipset_state_root: state_root,
            tipset: Arc::clone(&tipset),
        })?;
        self.set_head(&tipset)
    }

    /// Returns the key-value store instance.
    pub fn blockstore(&self) -> &DB {
        &self.db
    }

    /// Writes encoded block header data to the blockstore.
    fn persist_headers(&self, tipset: &Tipset) -> Result<(), Error> {
        let mut raw_header_data = Vec::new();
        let mut keys = Vec::new();
        for block in tipset.blocks() {
            if !self.db.exists(block.cid().to_bytes())? {
                raw_header_data.push(to_vec(block)?);
                keys.push(block.cid().to_bytes());
            }
        }
        Ok(self.db.bulk_write(&keys, &raw_header_data)?)
    }

    fn tipset_state_key(key: &TipsetKeys) -> Result<Vec<u8>, Error> {
        let mut bytes = TIPSET_STATE_PREFIX.to_vec();
        bytes.extend(to_vec(key)?);
        Ok(bytes)
    }

    /// Rebuilds a tipset from its persisted records and warms the index with
    /// it. Only tipsets previously recorded with `put_tipset_and_state` are
    /// rebuilt; sibling blocks in the blockstore never form new tipsets here.
    fn load_tipset_metadata(&self, key: &TipsetKeys) -> Result<TipsetMetadata, Error> {
        let state_key = Self::tipset_state_key(key)?;
        let state_root = match self.db.read(&state_key)? {
            Some(bz) => from_slice(&bz)?,
            None => {
                return Err(Error::UndefinedKey(format!(
                    "tipset {:?} is not tracked in the store",
                    key
                )))
            }
        };

        let headers = key
            .cids()
            .iter()
            .map(|cid| self.get_block(cid))
            .collect::<Result<Vec<_>, _>>()?;
        let meta = TipsetMetadata {
            tipset_state_root: state_root,
            tipset: Arc::new(Tipset::new(headers)?),
        };
        self.tip_index.write().put(meta.clone());
        Ok(meta)
    }
}

impl<DB> ChainStore for DefaultStore<DB>
where
    DB: Store + Send + Sync,
{
    fn get_block(&self, cid: &Cid) -> Result<BlockHeader, Error> {
        match self.db.read(cid.to_bytes())? {
            Some(bz) => Ok(from_slice(&bz)?),
            None => Err(Error::UndefinedKey(format!("block {} not found", cid))),
        }
    }

    fn get_head(&self) -> TipsetKeys {
        self.head
            .read()
            .as_ref()
            .map(|ts| ts.key().clone())
            .unwrap_or_default()
    }

    fn get_tipset(&self, key: &TipsetKeys) -> Result<Arc<Tipset>, Error> {
        if let Some(meta) = self.tip_index.read().get(key) {
            return Ok(Arc::clone(&meta.tipset));
        }
        Ok(self.load_tipset_metadata(key)?.tipset)
    }

    fn get_tipset_state_root(&self, key: &TipsetKeys) -> Result<Cid, Error> {
        if let Some(meta) = self.tip_index.read().get(key) {
            return Ok(meta.tipset_state_root);
        }
        Ok(self.load_tipset_metadata(key)?.tipset_state_root)
    }

    fn has_tipset_and_state(&self, key: &TipsetKeys) -> bool {
        if self.tip_index.read().contains(key) {
            return true;
        }
        Self::tipset_state_key(key)
            .and_then(|state_key| Ok(self.db.exists(state_key)?))
            .unwrap_or(false)
    }

    fn has_all_blocks(&self, cids: &[Cid]) -> bool {
        cids.iter()
            .all(|cid| self.db.exists(cid.to_bytes()).unwrap_or(false))
    }

    fn put_tipset_and_state(&self, meta: TipsetMetadata) -> Result<(), Error> {
        self.persist_headers(&meta.tipset)?;
        let state_key = Self::tipset_state_key(meta.tipset.key())?;
        self.db.write(state_key, to_vec(&meta.tipset_state_root)?)?;
        self.tip_index.write().put(meta);
        Ok(())
    }

    fn set_head(&self, ts: &Arc<Tipset>) -> Result<(), Error> {
        self.db.write(HEAD_KEY, to_vec(ts.key())?)?;
        *self.head.write() = Some(Arc::clone(ts));
        debug!("head updated to {:?}", ts.key());
        Ok(())
    }

    fn has_tipsets_with_parents_and_epoch(&self, parents: &TipsetKeys, epoch: ChainEpoch) -> bool {
        self.tip_index
            .read()
            .has_by_parents_and_epoch(parents, epoch)
    }

    fn get_tipsets_by_parents_and_epoch(
        &self,
        parents: &TipsetKeys,
        epoch: ChainEpoch,
    ) -> Result<Vec<TipsetMetadata>, Error> {
        Ok(self
            .tip_index
            .read()
            .get_by_parents_and_epoch(parents, epoch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::MemoryDB;
    use test_utils::{construct_genesis, construct_tipset, template_key};

    fn store_setup() -> (DefaultStore<MemoryDB>, Arc<Tipset>) {
        let store = DefaultStore::new(Arc::new(MemoryDB::default()));
        let genesis = Arc::new(construct_genesis());
        store
            .set_genesis(Arc::clone(&genesis), template_key(b"genesis state"))
            .unwrap();
        (store, genesis)
    }

    #[test]
    fn genesis_installs_head() {
        let (store, genesis) = store_setup();
        assert_eq!(&store.get_head(), genesis.key());
        assert!(store.has_tipset_and_state(genesis.key()));
        assert!(store.has_all_blocks(genesis.cids()));
        assert_eq!(store.get_tipset(genesis.key()).unwrap(), genesis);
        assert_eq!(
            store.get_tipset_state_root(genesis.key()).unwrap(),
            template_key(b"genesis state")
        );
    }

    #[test]
    fn put_indexes_by_parents_and_epoch() {
        let (store, _) = store_setup();
        let ts = Arc::new(construct_tipset(1, 10));
        store
            .put_tipset_and_state(TipsetMetadata {
                tipset_state_root: template_key(b"state"),
                tipset: Arc::clone(&ts),
            })
            .unwrap();

        assert!(store.has_tipsets_with_parents_and_epoch(ts.parents(), ts.epoch()));
        let found = store
            .get_tipsets_by_parents_and_epoch(ts.parents(), ts.epoch())
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tipset, ts);
    }

    #[test]
    fn missing_tipset_errors() {
        let (store, _) = store_setup();
        let ts = construct_tipset(1, 10);
        assert!(store.get_tipset(ts.key()).is_err());
        assert!(store.get_tipset_state_root(ts.key()).is_err());
        assert!(!store.has_tipset_and_state(ts.key()));
    }

    #[test]
    fn blocks_present_without_tipset_record() {
        // Sibling blocks in the blockstore must not make an unrecorded tipset
        // key readable.
        let (store, _) = store_setup();
        let ts = Arc::new(construct_tipset(1, 10));
        store
            .put_tipset_and_state(TipsetMetadata {
                tipset_state_root: template_key(b"state"),
                tipset: Arc::clone(&ts),
            })
            .unwrap();

        let subset = Tipset::new(vec![ts.blocks()[0].clone()]).unwrap();
        assert!(store.has_all_blocks(subset.cids()));
        assert!(!store.has_tipset_and_state(subset.key()));
        assert!(store.get_tipset(subset.key()).is_err());
    }

    #[test]
    fn reads_survive_index_loss() {
        let db = Arc::new(MemoryDB::default());
        let genesis = Arc::new(construct_genesis());
        let ts = Arc::new(construct_tipset(1, 10));
        {
            let store = DefaultStore::new(Arc::clone(&db));
            store
                .set_genesis(Arc::clone(&genesis), template_key(b"genesis state"))
                .unwrap();
            store
                .put_tipset_and_state(TipsetMetadata {
                    tipset_state_root: template_key(b"state"),
                    tipset: Arc::clone(&ts),
                })
                .unwrap();
        }

        // A store over the same db with a cold index still resolves recorded
        // tipsets and their state roots.
        let store = DefaultStore::new(db);
        assert!(store.has_tipset_and_state(ts.key()));
        assert_eq!(store.get_tipset(ts.key()).unwrap(), ts);
        assert_eq!(
            store.get_tipset_state_root(ts.key()).unwrap(),
            template_key(b"state")
        );
    }

    #[test]
    fn set_head_replaces_head() {
        let (store, genesis) = store_setup();
        let ts = Arc::new(construct_tipset(1, 10));
        store
            .put_tipset_and_state(TipsetMetadata {
                tipset_state_root: template_key(b"state"),
                tipset: Arc::clone(&ts),
            })
            .unwrap();
        store.set_head(&ts).unwrap();
        assert_eq!(&store.get_head(), ts.key());
        assert_ne!(&store.get_head(), genesis.key());
    }
}
