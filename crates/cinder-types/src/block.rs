//! Block, transaction and receipt types with their binary encoding.

use crate::codec::{write_bytes, write_hash, write_u32, write_u64, Reader};
use crate::error::CodecResult;
use crate::hash::Hash;
use crate::TotalDifficulty;

/// A block header.
///
/// The header hash is the Blake2b-256 digest of the canonical encoding, so
/// any field change produces a different identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Hash of the parent block. `Hash::ZERO` for genesis.
    pub parent_hash: Hash,
    /// Height of this block; genesis is 0.
    pub number: u64,
    /// Proof-of-work difficulty of this single block.
    pub difficulty: TotalDifficulty,
    /// Milliseconds since epoch.
    pub timestamp: u64,
    /// Opaque extra data.
    pub extra: Vec<u8>,
}

impl BlockHeader {
    /// Height of the genesis block.
    pub const GENESIS_NUMBER: u64 = 0;

    /// Identity of this header.
    pub fn hash(&self) -> Hash {
        Hash::of(&self.to_bytes())
    }

    pub fn is_genesis(&self) -> bool {
        self.number == Self::GENESIS_NUMBER
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_hash(&mut out, &self.parent_hash);
        write_u64(&mut out, self.number);
        write_bytes(&mut out, &self.difficulty.to_bytes_be());
        write_u64(&mut out, self.timestamp);
        write_bytes(&mut out, &self.extra);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        let mut reader = Reader::new(bytes);
        let parent_hash = reader.read_hash()?;
        let number = reader.read_u64()?;
        let difficulty = TotalDifficulty::from_bytes_be(&reader.read_bytes()?);
        let timestamp = reader.read_u64()?;
        let extra = reader.read_bytes()?;
        reader.finish()?;
        Ok(Self {
            parent_hash,
            number,
            difficulty,
            timestamp,
            extra,
        })
    }
}

/// A single transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub nonce: u64,
    /// Opaque transaction payload.
    pub payload: Vec<u8>,
}

impl Transaction {
    /// Identity of this transaction.
    pub fn hash(&self) -> Hash {
        Hash::of(&self.to_bytes())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_u64(&mut out, self.nonce);
        write_bytes(&mut out, &self.payload);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        let mut reader = Reader::new(bytes);
        let tx = Self::read_from(&mut reader)?;
        reader.finish()?;
        Ok(tx)
    }

    pub(crate) fn read_from(reader: &mut Reader<'_>) -> CodecResult<Self> {
        let nonce = reader.read_u64()?;
        let payload = reader.read_bytes()?;
        Ok(Self { nonce, payload })
    }
}

/// Ordered transactions plus ancillary data carried through storage untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockBody {
    pub transactions: Vec<Transaction>,
    /// References to uncle blocks; opaque to the index.
    pub ommers: Vec<Hash>,
}

impl BlockBody {
    pub fn new(transactions: Vec<Transaction>, ommers: Vec<Hash>) -> Self {
        Self {
            transactions,
            ommers,
        }
    }

    /// A body with no transactions and no ommers.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_u32(&mut out, self.transactions.len() as u32);
        for tx in &self.transactions {
            write_bytes(&mut out, &tx.to_bytes());
        }
        write_u32(&mut out, self.ommers.len() as u32);
        for ommer in &self.ommers {
            write_hash(&mut out, ommer);
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        let mut reader = Reader::new(bytes);
        let tx_count = reader.read_u32()? as usize;
        let mut transactions = Vec::with_capacity(tx_count.min(1024));
        for _ in 0..tx_count {
            let encoded = reader.read_bytes()?;
            transactions.push(Transaction::from_bytes(&encoded)?);
        }
        let ommer_count = reader.read_u32()? as usize;
        let mut ommers = Vec::with_capacity(ommer_count.min(1024));
        for _ in 0..ommer_count {
            ommers.push(reader.read_hash()?);
        }
        reader.finish()?;
        Ok(Self {
            transactions,
            ommers,
        })
    }
}

/// A full block: header plus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub body: BlockBody,
}

impl Block {
    pub fn new(header: BlockHeader, body: BlockBody) -> Self {
        Self { header, body }
    }

    /// Identity of this block (the header hash).
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn parent_hash(&self) -> Hash {
        self.header.parent_hash
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.body.transactions
    }
}

/// Opaque execution receipt stored alongside a block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionReceipt(pub Vec<u8>);

impl TransactionReceipt {
    pub fn new(payload: Vec<u8>) -> Self {
        Self(payload)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Where a canonical transaction lives: block hash plus index in the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionLocation {
    pub block_hash: Hash,
    pub index: u32,
}

impl TransactionLocation {
    pub fn new(block_hash: Hash, index: u32) -> Self {
        Self { block_hash, index }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Hash::SIZE + 4);
        write_hash(&mut out, &self.block_hash);
        write_u32(&mut out, self.index);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        let mut reader = Reader::new(bytes);
        let block_hash = reader.read_hash()?;
        let index = reader.read_u32()?;
        reader.finish()?;
        Ok(Self { block_hash, index })
    }
}

/// The canonical tip paired with its total difficulty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHead {
    pub hash: Hash,
    pub total_difficulty: TotalDifficulty,
}

impl ChainHead {
    pub fn new(hash: Hash, total_difficulty: TotalDifficulty) -> Self {
        Self {
            hash,
            total_difficulty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(number: u64, difficulty: u64) -> BlockHeader {
        BlockHeader {
            parent_hash: Hash::of(b"parent"),
            number,
            difficulty: TotalDifficulty::from(difficulty),
            timestamp: 1_700_000_000_000,
            extra: b"test".to_vec(),
        }
    }

    #[test]
    fn header_hash_commits_to_every_field() {
        let base = header(7, 1000);
        let mut changed = base.clone();
        changed.timestamp += 1;
        assert_ne!(base.hash(), changed.hash());

        let mut changed = base.clone();
        changed.difficulty = TotalDifficulty::from(1001u64);
        assert_ne!(base.hash(), changed.hash());
    }

    #[test]
    fn header_round_trips_through_encoding() {
        let original = header(42, u64::MAX);
        let decoded = BlockHeader::from_bytes(&original.to_bytes()).unwrap();
        assert_eq!(original, decoded);
        assert_eq!(original.hash(), decoded.hash());
    }

    #[test]
    fn body_round_trips_with_transactions_and_ommers() {
        let body = BlockBody::new(
            vec![
                Transaction {
                    nonce: 1,
                    payload: b"a".to_vec(),
                },
                Transaction {
                    nonce: 2,
                    payload: vec![],
                },
            ],
            vec![Hash::of(b"ommer")],
        );
        let decoded = BlockBody::from_bytes(&body.to_bytes()).unwrap();
        assert_eq!(body, decoded);
    }

    #[test]
    fn body_decoding_rejects_garbage() {
        assert!(BlockBody::from_bytes(&[0xff, 0xff]).is_err());
    }

    #[test]
    fn transaction_location_round_trips() {
        let loc = TransactionLocation::new(Hash::of(b"block"), 9);
        assert_eq!(
            loc,
            TransactionLocation::from_bytes(&loc.to_bytes()).unwrap()
        );
    }
}
