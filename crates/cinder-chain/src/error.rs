//! Error types for the chain index.

use cinder_storage::StorageError;
use cinder_types::{CodecError, Hash};
use thiserror::Error;

/// Errors raised by the blockchain index.
#[derive(Error, Debug)]
pub enum ChainError {
    /// Storage backend error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A stored value failed to decode.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Supplied receipts do not match the block's transactions.
    #[error("Supplied receipts do not match block transactions: expected {expected}, got {actual}")]
    ReceiptCountMismatch { expected: usize, actual: usize },

    /// The block's parent header is not known.
    #[error("Attempt to append non-connected block: parent {0} is unknown")]
    DisconnectedBlock(Hash),

    /// The supplied genesis block is inconsistent with the stored chain.
    #[error("Invalid genesis block: {0}")]
    InvalidGenesis(String),

    /// A row that must be present is missing; the batch was rolled back.
    #[error("Chain data corruption: {0}")]
    DataCorruption(String),
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;
