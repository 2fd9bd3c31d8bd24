//! Typed chain storage over the raw key-value backend.
//!
//! `ChainStorage` offers pure reads for every key family; all writes go
//! through an `Updater`, which buffers typed operations into one
//! `WriteBatch` and applies them atomically on `commit`. Reads issued while
//! an updater is open observe the pre-batch state.

use crate::{ChainError, ChainResult};
use cinder_storage::{ColumnFamily, Storage, WriteBatch};
use cinder_types::{
    BlockBody, BlockHeader, CodecError, Hash, TotalDifficulty, TransactionLocation,
    TransactionReceipt,
};
use std::collections::HashSet;
use std::sync::Arc;

const CHAIN_HEAD_KEY: &[u8] = b"chain_head";
const FORK_HEADS_KEY: &[u8] = b"fork_heads";

/// Typed view of the chain's key families.
pub struct ChainStorage {
    storage: Arc<dyn Storage>,
}

impl ChainStorage {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn header(&self, hash: &Hash) -> ChainResult<Option<BlockHeader>> {
        match self.storage.get(ColumnFamily::Headers, hash.as_ref())? {
            Some(bytes) => Ok(Some(BlockHeader::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn body(&self, hash: &Hash) -> ChainResult<Option<BlockBody>> {
        match self.storage.get(ColumnFamily::Bodies, hash.as_ref())? {
            Some(bytes) => Ok(Some(BlockBody::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn receipts(&self, hash: &Hash) -> ChainResult<Option<Vec<TransactionReceipt>>> {
        match self.storage.get(ColumnFamily::Receipts, hash.as_ref())? {
            Some(bytes) => Ok(Some(decode_receipts(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn total_difficulty(&self, hash: &Hash) -> ChainResult<Option<TotalDifficulty>> {
        Ok(self
            .storage
            .get(ColumnFamily::TotalDifficulty, hash.as_ref())?
            .map(|bytes| TotalDifficulty::from_bytes_be(&bytes)))
    }

    /// Canonical hash at the given height.
    pub fn block_hash(&self, number: u64) -> ChainResult<Option<Hash>> {
        match self
            .storage
            .get(ColumnFamily::CanonicalIndex, &number.to_be_bytes())?
        {
            Some(bytes) => Ok(Some(Hash::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn tx_location(&self, tx_hash: &Hash) -> ChainResult<Option<TransactionLocation>> {
        match self.storage.get(ColumnFamily::TxLocations, tx_hash.as_ref())? {
            Some(bytes) => Ok(Some(TransactionLocation::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The persisted canonical tip, if the store is initialized.
    pub fn chain_head(&self) -> ChainResult<Option<Hash>> {
        match self.storage.get(ColumnFamily::Metadata, CHAIN_HEAD_KEY)? {
            Some(bytes) => Ok(Some(Hash::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The set of tracked non-canonical tips.
    pub fn fork_heads(&self) -> ChainResult<HashSet<Hash>> {
        match self.storage.get(ColumnFamily::Metadata, FORK_HEADS_KEY)? {
            Some(bytes) => decode_fork_heads(&bytes),
            None => Ok(HashSet::new()),
        }
    }

    /// Open a fresh updater buffering writes against this store.
    pub fn updater(&self) -> Updater<'_> {
        Updater {
            storage: self.storage.as_ref(),
            batch: WriteBatch::new(),
        }
    }
}

/// Buffers typed writes and applies them atomically.
///
/// Dropping an updater without calling `commit` discards every buffered
/// write, exactly like `rollback`.
pub struct Updater<'a> {
    storage: &'a dyn Storage,
    batch: WriteBatch,
}

impl Updater<'_> {
    pub fn put_header(&mut self, hash: &Hash, header: &BlockHeader) {
        self.batch
            .put(ColumnFamily::Headers, hash.as_ref().to_vec(), header.to_bytes());
    }

    pub fn put_body(&mut self, hash: &Hash, body: &BlockBody) {
        self.batch
            .put(ColumnFamily::Bodies, hash.as_ref().to_vec(), body.to_bytes());
    }

    pub fn put_receipts(&mut self, hash: &Hash, receipts: &[TransactionReceipt]) {
        self.batch.put(
            ColumnFamily::Receipts,
            hash.as_ref().to_vec(),
            encode_receipts(receipts),
        );
    }

    pub fn put_total_difficulty(&mut self, hash: &Hash, td: &TotalDifficulty) {
        self.batch.put(
            ColumnFamily::TotalDifficulty,
            hash.as_ref().to_vec(),
            td.to_bytes_be(),
        );
    }

    pub fn put_block_hash(&mut self, number: u64, hash: &Hash) {
        self.batch.put(
            ColumnFamily::CanonicalIndex,
            number.to_be_bytes().to_vec(),
            hash.as_ref().to_vec(),
        );
    }

    pub fn remove_block_hash(&mut self, number: u64) {
        self.batch
            .delete(ColumnFamily::CanonicalIndex, number.to_be_bytes().to_vec());
    }

    pub fn put_tx_location(&mut self, tx_hash: &Hash, location: &TransactionLocation) {
        self.batch.put(
            ColumnFamily::TxLocations,
            tx_hash.as_ref().to_vec(),
            location.to_bytes(),
        );
    }

    pub fn remove_tx_location(&mut self, tx_hash: &Hash) {
        self.batch
            .delete(ColumnFamily::TxLocations, tx_hash.as_ref().to_vec());
    }

    pub fn set_chain_head(&mut self, hash: &Hash) {
        self.batch.put(
            ColumnFamily::Metadata,
            CHAIN_HEAD_KEY.to_vec(),
            hash.as_ref().to_vec(),
        );
    }

    pub fn set_fork_heads(&mut self, heads: &HashSet<Hash>) {
        self.batch.put(
            ColumnFamily::Metadata,
            FORK_HEADS_KEY.to_vec(),
            encode_fork_heads(heads),
        );
    }

    /// Apply every buffered write atomically.
    pub fn commit(self) -> ChainResult<()> {
        self.storage.write_batch(self.batch)?;
        Ok(())
    }

    /// Discard every buffered write.
    pub fn rollback(self) {
        drop(self.batch);
    }
}

fn encode_receipts(receipts: &[TransactionReceipt]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(receipts.len() as u32).to_be_bytes());
    for receipt in receipts {
        out.extend_from_slice(&(receipt.as_bytes().len() as u32).to_be_bytes());
        out.extend_from_slice(receipt.as_bytes());
    }
    out
}

fn decode_receipts(bytes: &[u8]) -> ChainResult<Vec<TransactionReceipt>> {
    if bytes.len() < 4 {
        return Err(CodecError::UnexpectedEof.into());
    }
    let count = u32::from_be_bytes(bytes[0..4].try_into().expect("4-byte slice")) as usize;
    let mut receipts = Vec::with_capacity(count.min(1024));
    let mut offset = 4;
    for _ in 0..count {
        if offset + 4 > bytes.len() {
            return Err(CodecError::UnexpectedEof.into());
        }
        let len =
            u32::from_be_bytes(bytes[offset..offset + 4].try_into().expect("4-byte slice"))
                as usize;
        offset += 4;
        if offset + len > bytes.len() {
            return Err(ChainError::Codec(CodecError::LengthOverflow {
                declared: len,
                remaining: bytes.len() - offset,
            }));
        }
        receipts.push(TransactionReceipt::new(bytes[offset..offset + len].to_vec()));
        offset += len;
    }
    if offset != bytes.len() {
        return Err(CodecError::TrailingBytes.into());
    }
    Ok(receipts)
}

fn encode_fork_heads(heads: &HashSet<Hash>) -> Vec<u8> {
    // Sorted for a deterministic on-disk encoding.
    let mut sorted: Vec<&Hash> = heads.iter().collect();
    sorted.sort();
    let mut out = Vec::with_capacity(sorted.len() * Hash::SIZE);
    for head in sorted {
        out.extend_from_slice(head.as_ref());
    }
    out
}

fn decode_fork_heads(bytes: &[u8]) -> ChainResult<HashSet<Hash>> {
    if bytes.len() % Hash::SIZE != 0 {
        return Err(CodecError::InvalidHashLength(bytes.len() % Hash::SIZE).into());
    }
    Ok(bytes
        .chunks_exact(Hash::SIZE)
        .map(|chunk| Hash::from_slice(chunk).expect("exact 32-byte chunk"))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_storage::MemoryStorage;
    use cinder_types::Transaction;

    fn storage() -> ChainStorage {
        ChainStorage::new(Arc::new(MemoryStorage::new()))
    }

    fn header(number: u64) -> BlockHeader {
        BlockHeader {
            parent_hash: Hash::ZERO,
            number,
            difficulty: TotalDifficulty::from(5u64),
            timestamp: 0,
            extra: vec![],
        }
    }

    #[test]
    fn committed_updater_is_visible() {
        let store = storage();
        let h = header(1);
        let hash = h.hash();
        let body = BlockBody::new(
            vec![Transaction {
                nonce: 1,
                payload: vec![0xaa],
            }],
            vec![],
        );

        let mut updater = store.updater();
        updater.put_header(&hash, &h);
        updater.put_body(&hash, &body);
        updater.put_receipts(&hash, &[TransactionReceipt::new(vec![1, 2, 3])]);
        updater.put_total_difficulty(&hash, &TotalDifficulty::from(5u64));
        updater.put_block_hash(1, &hash);
        updater.set_chain_head(&hash);
        updater.commit().unwrap();

        assert_eq!(store.header(&hash).unwrap(), Some(h));
        assert_eq!(store.body(&hash).unwrap(), Some(body));
        assert_eq!(
            store.receipts(&hash).unwrap(),
            Some(vec![TransactionReceipt::new(vec![1, 2, 3])])
        );
        assert_eq!(
            store.total_difficulty(&hash).unwrap(),
            Some(TotalDifficulty::from(5u64))
        );
        assert_eq!(store.block_hash(1).unwrap(), Some(hash));
        assert_eq!(store.chain_head().unwrap(), Some(hash));
    }

    #[test]
    fn uncommitted_updater_is_invisible() {
        let store = storage();
        let h = header(1);
        let hash = h.hash();

        let mut updater = store.updater();
        updater.put_header(&hash, &h);
        updater.set_chain_head(&hash);
        // Reads see the pre-batch state while the updater is open.
        assert_eq!(store.header(&hash).unwrap(), None);
        updater.rollback();

        assert_eq!(store.header(&hash).unwrap(), None);
        assert_eq!(store.chain_head().unwrap(), None);
    }

    #[test]
    fn fork_heads_round_trip_as_a_set() {
        let store = storage();
        let heads: HashSet<Hash> = [Hash::of(b"a"), Hash::of(b"b"), Hash::of(b"c")]
            .into_iter()
            .collect();

        let mut updater = store.updater();
        updater.set_fork_heads(&heads);
        updater.commit().unwrap();

        assert_eq!(store.fork_heads().unwrap(), heads);
    }

    #[test]
    fn empty_receipt_bundle_round_trips() {
        let store = storage();
        let hash = Hash::of(b"genesis");
        let mut updater = store.updater();
        updater.put_receipts(&hash, &[]);
        updater.commit().unwrap();

        assert_eq!(store.receipts(&hash).unwrap(), Some(vec![]));
    }
}
