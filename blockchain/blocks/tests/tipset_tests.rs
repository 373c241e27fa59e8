// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use blocks::{Tipset, TipsetKeys};
use num_bigint::BigInt;
use test_utils::{construct_headers, construct_keys, construct_tipset, template_key};

const WEIGHT: u64 = 10;

#[test]
fn new_test() {
    let headers = construct_headers(1, WEIGHT);
    assert!(Tipset::new(headers).is_ok(), "result is invalid");
}

#[test]
fn new_rejects_empty() {
    assert_eq!(Tipset::new(Vec::new()), Err(blocks::Error::NoBlocks));
}

#[test]
fn new_rejects_mismatched_epochs() {
    let mut headers = construct_headers(1, WEIGHT);
    headers.extend(construct_headers(2, WEIGHT));
    assert!(Tipset::new(headers).is_err());
}

#[test]
fn new_rejects_duplicate_blocks() {
    let headers = construct_headers(1, WEIGHT);
    let mut doubled = headers.clone();
    doubled.extend(headers);
    assert!(Tipset::new(doubled).is_err());
}

#[test]
fn min_ticket_test() {
    let tipset = construct_tipset(1, WEIGHT);
    let expected_value: &[u8] = &[1, 4, 3, 6, 1, 1, 2, 2, 4, 5, 3, 12, 2];
    let min = tipset.min_ticket();
    assert_eq!(min.vrfproof.as_bytes(), expected_value);
}

#[test]
fn min_timestamp_test() {
    let tipset = construct_tipset(1, WEIGHT);
    assert_eq!(tipset.min_timestamp(), 1);
}

#[test]
fn len_test() {
    let tipset = construct_tipset(1, WEIGHT);
    assert_eq!(tipset.len(), 3);
}

#[test]
fn is_empty_test() {
    let tipset = construct_tipset(1, WEIGHT);
    assert!(!tipset.is_empty());
}

#[test]
fn parents_test() {
    let tipset = construct_tipset(1, WEIGHT);
    let expected_value = template_key(b"test content");
    assert_eq!(*tipset.parents(), TipsetKeys::new(vec![expected_value]));
}

#[test]
fn weight_test() {
    let tipset = construct_tipset(1, WEIGHT);
    assert_eq!(tipset.weight(), &BigInt::from(WEIGHT));
}

#[test]
fn key_is_order_independent() {
    let headers = construct_headers(1, WEIGHT);
    let mut reversed = headers.clone();
    reversed.reverse();

    let a = Tipset::new(headers).unwrap();
    let b = Tipset::new(reversed).unwrap();
    assert_eq!(a.key(), b.key());
    assert_eq!(a, b);
}

#[test]
fn keys_are_sorted_and_deduplicated() {
    let cids = construct_keys();
    let mut shuffled = cids.clone();
    shuffled.reverse();
    shuffled.push(cids[0]);

    let key = TipsetKeys::new(shuffled);
    assert_eq!(key.len(), cids.len());
    assert_eq!(key, TipsetKeys::new(cids));

    let mut bytes: Vec<Vec<u8>> = key.cids().iter().map(|c| c.to_bytes()).collect();
    let sorted = {
        let mut s = bytes.clone();
        s.sort();
        s
    };
    assert_eq!(bytes, sorted);
    bytes.dedup();
    assert_eq!(bytes.len(), key.len());
}
