// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use thiserror::Error;

/// Chain store error
#[derive(Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// Key was not found
    #[error("Invalid key: {0}")]
    UndefinedKey(String),
    /// Tipset contains no blocks
    #[error("No blocks for tipset")]
    NoBlocks,
    /// Error originating from the key-value store
    #[error("{0}")]
    Db(#[from] db::Error),
    /// Error originating from encoding a chain structure
    #[error("Encoding error: {0}")]
    Encoding(String),
    /// Error originating from constructing blockchain structures
    #[error("{0}")]
    Blockchain(#[from] blocks::Error),
}

impl From<fvm_ipld_encoding::Error> for Error {
    fn from(e: fvm_ipld_encoding::Error) -> Error {
        Error::Encoding(e.to_string())
    }
}
