// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{ChainEpoch, Ticket, TipsetKeys};
use cid::Cid;
use derive_builder::Builder;
use fvm_ipld_encoding::{to_vec, DAG_CBOR};
use multihash::{Code, MultihashDigest};
use num_bigint::BigInt;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Header of a block
///
/// Usage:
/// ```
/// use blocks::{BlockHeader, Ticket, TipsetKeys};
/// use num_bigint::BigInt;
///
/// BlockHeader::builder()
///     .parents(TipsetKeys::default()) // optional
///     .weight(BigInt::from(0u8)) // optional
///     .epoch(0) // optional
///     .ticket(Ticket::default()) // optional
///     .timestamp(0) // optional
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Debug, Builder)]
#[builder(name = "BlockHeaderBuilder")]
pub struct BlockHeader {
    // CHAIN LINKING
    /// The set of parents this block was based on. Typically one, but can be
    /// several in the case where there were multiple winning ticket-holders
    /// for a round.
    #[builder(default)]
    parents: TipsetKeys,

    /// The aggregate chain weight of the parent set. Blocks sharing a parent
    /// set share this value; the weight a block adds on top of it is the
    /// consensus protocol's business.
    #[builder(default)]
    weight: BigInt,

    /// The period in which a new block is generated. There may be multiple
    /// rounds in an epoch.
    #[builder(default)]
    epoch: ChainEpoch,

    // CONSENSUS
    /// The ticket submitted with this block
    #[builder(default)]
    ticket: Ticket,

    /// The block creation time, in seconds since the Unix epoch
    #[builder(default)]
    timestamp: u64,

    // CACHE
    #[builder(default, setter(skip))]
    cached_cid: OnceCell<Cid>,
}

impl BlockHeader {
    /// Generates a `BlockHeader` builder as a constructor
    pub fn builder() -> BlockHeaderBuilder {
        BlockHeaderBuilder::default()
    }

    /// Returns the content id of this header, computed from its encoding on
    /// first access.
    pub fn cid(&self) -> &Cid {
        self.cached_cid.get_or_init(|| {
            let data = to_vec(&(
                &self.parents,
                &self.weight,
                &self.epoch,
                &self.ticket,
                &self.timestamp,
            ))
            .expect("block header encoding is infallible");
            Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(&data))
        })
    }

    /// Returns the parent tipset key of the header
    pub fn parents(&self) -> &TipsetKeys {
        &self.parents
    }

    /// Returns the aggregate chain weight of the parent set
    pub fn weight(&self) -> &BigInt {
        &self.weight
    }

    /// Returns the epoch (height) of the header
    pub fn epoch(&self) -> ChainEpoch {
        self.epoch
    }

    /// Returns the ticket of the header
    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    /// Returns the timestamp of the header
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

impl PartialEq for BlockHeader {
    fn eq(&self, other: &Self) -> bool {
        self.cid() == other.cid()
    }
}

impl Eq for BlockHeader {}

impl Serialize for BlockHeader {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (
            &self.parents,
            &self.weight,
            &self.epoch,
            &self.ticket,
            &self.timestamp,
        )
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BlockHeader {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (parents, weight, epoch, ticket, timestamp) = Deserialize::deserialize(deserializer)?;
        Ok(BlockHeader {
            parents,
            weight,
            epoch,
            ticket,
            timestamp,
            cached_cid: OnceCell::new(),
        })
    }
}
