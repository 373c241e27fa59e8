// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

#![cfg(feature = "test_constructors")]

use blocks::{BlockHeader, ChainEpoch, Ticket, Tipset, TipsetKeys, VRFProof};
use cid::Cid;
use fvm_ipld_encoding::DAG_CBOR;
use multihash::{Code, MultihashDigest};
use num_bigint::BigInt;

/// Defines a deterministic cid used in testing
pub fn template_key(data: &[u8]) -> Cid {
    Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(data))
}

/// Returns a vec of 4 distinct cids
pub fn construct_keys() -> Vec<Cid> {
    vec![
        template_key(b"test content"),
        template_key(b"awesome test content "),
        template_key(b"even better test content"),
        template_key(b"the best test content out there"),
    ]
}

/// Defines a block header with the given linkage used in testing
pub fn construct_header(
    parents: TipsetKeys,
    epoch: ChainEpoch,
    weight: u64,
    ticket_p: Vec<u8>,
    timestamp: u64,
) -> BlockHeader {
    BlockHeader::builder()
        .parents(parents)
        .epoch(epoch)
        .weight(BigInt::from(weight))
        .ticket(Ticket::new(VRFProof::new(ticket_p)))
        .timestamp(timestamp)
        .build()
        .unwrap()
}

/// Returns a vec of distinct block headers at the same epoch to be used for
/// testing purposes
pub fn construct_headers(epoch: ChainEpoch, weight: u64) -> Vec<BlockHeader> {
    let data0: Vec<u8> = vec![1, 4, 3, 6, 7, 1, 2];
    let data1: Vec<u8> = vec![1, 4, 3, 6, 1, 1, 2, 2, 4, 5, 3, 12, 2, 1];
    let data2: Vec<u8> = vec![1, 4, 3, 6, 1, 1, 2, 2, 4, 5, 3, 12, 2];
    let cids = construct_keys();
    let parents = TipsetKeys::new(vec![cids[0]]);

    vec![
        construct_header(parents.clone(), epoch, weight, data0, 1),
        construct_header(parents.clone(), epoch, weight, data1, 2),
        construct_header(parents, epoch, weight, data2, 3),
    ]
}

/// Returns a tipset used for testing
pub fn construct_tipset(epoch: ChainEpoch, weight: u64) -> Tipset {
    Tipset::new(construct_headers(epoch, weight)).unwrap()
}

/// Returns a genesis tipset with an empty parent set used for testing
pub fn construct_genesis() -> Tipset {
    let header = construct_header(TipsetKeys::default(), 0, 0, vec![0], 0);
    Tipset::new(vec![header]).unwrap()
}
