// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

#[cfg(feature = "test_constructors")]
mod chain_structures;

#[cfg(feature = "test_constructors")]
pub use self::chain_structures::*;
