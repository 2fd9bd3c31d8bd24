//! In-memory storage implementation.
//!
//! A drop-in replacement for the RocksDB backend used by tests and
//! deterministic simulation. All column families live in one map guarded
//! by a single `RwLock`, so a batch write is atomic with respect to any
//! concurrent reader.

use crate::batch::BatchOperation;
use crate::{ColumnFamily, Storage, StorageResult, WriteBatch};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

type Family = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory storage backend.
#[derive(Default)]
pub struct MemoryStorage {
    families: RwLock<HashMap<ColumnFamily, Family>>,
}

impl MemoryStorage {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys in a column family.
    pub fn len(&self, cf: ColumnFamily) -> usize {
        self.families
            .read()
            .get(&cf)
            .map(|family| family.len())
            .unwrap_or(0)
    }

    /// Check if a column family has no keys.
    pub fn is_empty(&self, cf: ColumnFamily) -> bool {
        self.len(cf) == 0
    }
}

impl Storage for MemoryStorage {
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self
            .families
            .read()
            .get(&cf)
            .and_then(|family| family.get(key).cloned()))
    }

    fn put(&self, cf: ColumnFamily, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.families
            .write()
            .entry(cf)
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<()> {
        if let Some(family) = self.families.write().get_mut(&cf) {
            family.remove(key);
        }
        Ok(())
    }

    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        let mut families = self.families.write();
        for op in batch.operations {
            match op {
                BatchOperation::Put { cf, key, value } => {
                    families.entry(cf).or_default().insert(key, value);
                }
                BatchOperation::Delete { cf, key } => {
                    if let Some(family) = families.get_mut(&cf) {
                        family.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_are_isolated() {
        let store = MemoryStorage::new();
        store.put(ColumnFamily::Headers, b"k", b"header").unwrap();
        store.put(ColumnFamily::Bodies, b"k", b"body").unwrap();

        assert_eq!(
            store.get(ColumnFamily::Headers, b"k").unwrap(),
            Some(b"header".to_vec())
        );
        assert_eq!(
            store.get(ColumnFamily::Bodies, b"k").unwrap(),
            Some(b"body".to_vec())
        );
        assert_eq!(store.get(ColumnFamily::Metadata, b"k").unwrap(), None);
    }

    #[test]
    fn batch_put_and_delete() {
        let store = MemoryStorage::new();
        store.put(ColumnFamily::TxLocations, b"old", b"loc").unwrap();

        let mut batch = WriteBatch::new();
        batch.put(ColumnFamily::TxLocations, b"new".to_vec(), b"loc".to_vec());
        batch.delete(ColumnFamily::TxLocations, b"old".to_vec());
        store.write_batch(batch).unwrap();

        assert!(store.contains(ColumnFamily::TxLocations, b"new").unwrap());
        assert!(!store.contains(ColumnFamily::TxLocations, b"old").unwrap());
    }

    #[test]
    fn dropped_batch_leaves_no_trace() {
        let store = MemoryStorage::new();
        let mut batch = WriteBatch::new();
        batch.put(ColumnFamily::Headers, b"k".to_vec(), b"v".to_vec());
        drop(batch);
        assert!(store.is_empty(ColumnFamily::Headers));
    }
}
