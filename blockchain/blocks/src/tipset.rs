// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{BlockHeader, ChainEpoch, Error, Ticket};
use cid::Cid;
use num_bigint::BigInt;
use serde::{de, ser, Deserialize, Serialize};

/// A set of CIDs forming a unique key for a tipset.
/// The CIDs are kept in canonical byte-wise sorted order with duplicates
/// removed, so the key is a total, deterministic function of the member
/// blocks regardless of the order they were gathered in.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct TipsetKeys {
    cids: Vec<Cid>,
}

impl TipsetKeys {
    /// Builds the canonical key over the given block cids.
    pub fn new(mut cids: Vec<Cid>) -> Self {
        cids.sort_by_cached_key(|c| c.to_bytes());
        cids.dedup();
        Self { cids }
    }

    /// Returns the block cids of the key.
    pub fn cids(&self) -> &[Cid] {
        &self.cids
    }

    /// Returns the number of blocks referenced by the key.
    pub fn len(&self) -> usize {
        self.cids.len()
    }

    /// Returns true if the key references no blocks. Only the parent key of
    /// the genesis tipset is empty.
    pub fn is_empty(&self) -> bool {
        self.cids.is_empty()
    }
}

impl ser::Serialize for TipsetKeys {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        self.cids.serialize(serializer)
    }
}

impl<'de> de::Deserialize<'de> for TipsetKeys {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let cids: Vec<Cid> = Deserialize::deserialize(deserializer)?;
        Ok(TipsetKeys::new(cids))
    }
}

/// An immutable set of blocks at the same height with the same parent set.
/// Blocks in a tipset are canonically ordered by ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tipset {
    blocks: Vec<BlockHeader>,
    key: TipsetKeys,
}

impl Tipset {
    /// Builds a new tipset from a collection of block headers.
    /// A valid tipset contains a non-empty collection of blocks with distinct
    /// cids that all specify identical parents, epoch and parent weight.
    pub fn new(headers: Vec<BlockHeader>) -> Result<Self, Error> {
        if headers.is_empty() {
            return Err(Error::NoBlocks);
        }

        for header in &headers[1..] {
            if header.parents() != headers[0].parents() {
                return Err(Error::InvalidTipset("parent cids are not equal".to_string()));
            }
            if header.epoch() != headers[0].epoch() {
                return Err(Error::InvalidTipset("epochs are not equal".to_string()));
            }
            if header.weight() != headers[0].weight() {
                return Err(Error::InvalidTipset("weights are not equal".to_string()));
            }
        }

        // sort headers by ticket, breaking ties with the header cids
        let mut sorted_headers = headers;
        sorted_headers.sort_by_cached_key(|h| (h.ticket().clone(), h.cid().to_bytes()));

        let key = TipsetKeys::new(sorted_headers.iter().map(|h| *h.cid()).collect());
        if key.len() != sorted_headers.len() {
            return Err(Error::InvalidTipset("duplicate block cids".to_string()));
        }

        Ok(Self {
            blocks: sorted_headers,
            key,
        })
    }

    /// Returns the epoch of the tipset.
    pub fn epoch(&self) -> ChainEpoch {
        self.blocks[0].epoch()
    }

    /// Returns all blocks in the tipset.
    pub fn blocks(&self) -> &[BlockHeader] {
        &self.blocks
    }

    /// Consumes the tipset, returning its blocks.
    pub fn into_blocks(self) -> Vec<BlockHeader> {
        self.blocks
    }

    /// Returns the smallest ticket of all blocks in the tipset.
    pub fn min_ticket(&self) -> &Ticket {
        self.blocks[0].ticket()
    }

    /// Returns the smallest timestamp of all blocks in the tipset.
    pub fn min_timestamp(&self) -> u64 {
        self.blocks.iter().map(BlockHeader::timestamp).min().unwrap()
    }

    /// Returns the number of blocks in the tipset.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if no blocks are present. Never true for a constructed
    /// tipset.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns the canonical key of the tipset.
    pub fn key(&self) -> &TipsetKeys {
        &self.key
    }

    /// Returns the cids of the blocks in the tipset, in key order.
    pub fn cids(&self) -> &[Cid] {
        self.key.cids()
    }

    /// Returns the key of the parent tipset.
    pub fn parents(&self) -> &TipsetKeys {
        self.blocks[0].parents()
    }

    /// Returns true iff this is the genesis tipset, the only tipset with an
    /// empty parent set.
    pub fn is_genesis(&self) -> bool {
        self.parents().is_empty()
    }

    /// Returns the tipset's parent weight.
    pub fn weight(&self) -> &BigInt {
        self.blocks[0].weight()
    }
}
