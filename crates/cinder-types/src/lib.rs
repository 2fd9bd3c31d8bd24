//! # cinder-types
//!
//! Core domain types for the cinder blockchain index.
//!
//! This crate provides:
//! - `Hash`: 32-byte Blake2b-256 identifiers for blocks and transactions
//! - Block types: `BlockHeader`, `BlockBody`, `Block`
//! - `Transaction`, `TransactionReceipt` and `TransactionLocation`
//! - `ChainHead`: the canonical tip paired with its total difficulty
//! - A hand-rolled big-endian binary codec for all of the above
//!
//! Total difficulty is an arbitrary-precision unsigned integer
//! (`num_bigint::BigUint`), so cumulative sums cannot overflow.

mod block;
mod codec;
mod error;
mod hash;

pub use block::{
    Block, BlockBody, BlockHeader, ChainHead, Transaction, TransactionLocation,
    TransactionReceipt,
};
pub use error::{CodecError, CodecResult};
pub use hash::Hash;

/// Cumulative proof-of-work measure from genesis to a block.
pub type TotalDifficulty = num_bigint::BigUint;
