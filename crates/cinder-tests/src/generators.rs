//! Deterministic block and transaction builders for tests.

use cinder_types::{
    Block, BlockBody, BlockHeader, Hash, TotalDifficulty, Transaction, TransactionReceipt,
};

/// A transaction with a deterministic payload derived from its nonce.
pub fn tx(nonce: u64) -> Transaction {
    Transaction {
        nonce,
        payload: nonce.to_be_bytes().to_vec(),
    }
}

/// One opaque receipt per transaction in the block.
pub fn receipts_for(block: &Block) -> Vec<TransactionReceipt> {
    block
        .body
        .transactions
        .iter()
        .map(|tx| TransactionReceipt::new(tx.nonce.to_be_bytes().to_vec()))
        .collect()
}

/// A genesis block with the given difficulty and no transactions.
pub fn genesis(difficulty: u64) -> Block {
    Block::new(
        BlockHeader {
            parent_hash: Hash::ZERO,
            number: 0,
            difficulty: TotalDifficulty::from(difficulty),
            timestamp: 0,
            extra: vec![],
        },
        BlockBody::empty(),
    )
}

/// An empty child of `parent`; `tag` lands in the extra field so siblings
/// with equal difficulty still hash differently.
pub fn child(parent: &Block, difficulty: u64, tag: &str) -> Block {
    child_with_txs(parent, difficulty, tag, vec![])
}

/// A child of `parent` carrying the given transactions.
pub fn child_with_txs(
    parent: &Block,
    difficulty: u64,
    tag: &str,
    transactions: Vec<Transaction>,
) -> Block {
    Block::new(
        BlockHeader {
            parent_hash: parent.hash(),
            number: parent.number() + 1,
            difficulty: TotalDifficulty::from(difficulty),
            timestamp: parent.header.timestamp + 12_000,
            extra: tag.as_bytes().to_vec(),
        },
        BlockBody::new(transactions, vec![]),
    )
}
