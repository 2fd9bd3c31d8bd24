//! RocksDB database implementation.

use crate::batch::BatchOperation;
use crate::{Storage, StorageError, StorageResult, WriteBatch};
use rocksdb::{ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Column families for organizing chain data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnFamily {
    /// Block headers keyed by block hash.
    Headers,
    /// Block bodies keyed by block hash.
    Bodies,
    /// Receipt bundles keyed by block hash.
    Receipts,
    /// Cumulative difficulty keyed by block hash.
    TotalDifficulty,
    /// Canonical number -> hash mapping.
    CanonicalIndex,
    /// Transaction hash -> block location.
    TxLocations,
    /// Chain head and fork-head bookkeeping.
    Metadata,
    /// Default column family (required by RocksDB).
    Default,
}

impl ColumnFamily {
    /// The string name of the column family.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnFamily::Headers => "headers",
            ColumnFamily::Bodies => "bodies",
            ColumnFamily::Receipts => "receipts",
            ColumnFamily::TotalDifficulty => "total_difficulty",
            ColumnFamily::CanonicalIndex => "canonical_index",
            ColumnFamily::TxLocations => "tx_locations",
            ColumnFamily::Metadata => "metadata",
            ColumnFamily::Default => "default",
        }
    }

    /// All column families.
    pub fn all() -> &'static [ColumnFamily] {
        &[
            ColumnFamily::Headers,
            ColumnFamily::Bodies,
            ColumnFamily::Receipts,
            ColumnFamily::TotalDifficulty,
            ColumnFamily::CanonicalIndex,
            ColumnFamily::TxLocations,
            ColumnFamily::Metadata,
            ColumnFamily::Default,
        ]
    }
}

/// RocksDB database wrapper.
///
/// Clones share the underlying handle.
#[derive(Clone)]
pub struct Database {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        info!("Opening database at {:?}", path);

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(256);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ColumnFamily::all()
            .iter()
            .map(|cf| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
                ColumnFamilyDescriptor::new(cf.name(), cf_opts)
            })
            .collect();

        let db =
            DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(&opts, path, cf_descriptors)?;

        debug!("Database opened successfully");

        Ok(Self { db: Arc::new(db) })
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> StorageResult<()> {
        for cf in ColumnFamily::all() {
            if let Some(handle) = self.db.cf_handle(cf.name()) {
                self.db.flush_cf(&handle)?;
            }
        }
        Ok(())
    }

    fn handle(
        &self,
        cf: ColumnFamily,
    ) -> StorageResult<Arc<rocksdb::BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(cf.name())
            .ok_or(StorageError::ColumnFamilyNotFound(cf.name()))
    }
}

impl Storage for Database {
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let handle = self.handle(cf)?;
        Ok(self.db.get_cf(&handle, key)?)
    }

    fn put(&self, cf: ColumnFamily, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let handle = self.handle(cf)?;
        self.db.put_cf(&handle, key, value)?;
        Ok(())
    }

    fn delete(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<()> {
        let handle = self.handle(cf)?;
        self.db.delete_cf(&handle, key)?;
        Ok(())
    }

    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        let mut rocks_batch = rocksdb::WriteBatch::default();

        for op in batch.operations {
            match op {
                BatchOperation::Put { cf, key, value } => {
                    rocks_batch.put_cf(&self.handle(cf)?, &key, &value);
                }
                BatchOperation::Delete { cf, key } => {
                    rocks_batch.delete_cf(&self.handle(cf)?, &key);
                }
            }
        }

        self.db.write(rocks_batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_put_get_delete() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(tmp.path()).unwrap();

        db.put(ColumnFamily::Metadata, b"key1", b"value1").unwrap();
        assert_eq!(
            db.get(ColumnFamily::Metadata, b"key1").unwrap(),
            Some(b"value1".to_vec())
        );

        db.delete(ColumnFamily::Metadata, b"key1").unwrap();
        assert_eq!(db.get(ColumnFamily::Metadata, b"key1").unwrap(), None);
    }

    #[test]
    fn batch_applies_all_operations() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(tmp.path()).unwrap();

        db.put(ColumnFamily::CanonicalIndex, b"stale", b"x").unwrap();

        let mut batch = WriteBatch::new();
        batch.put(ColumnFamily::Headers, b"h1".to_vec(), b"header1".to_vec());
        batch.put(ColumnFamily::Bodies, b"h1".to_vec(), b"body1".to_vec());
        batch.delete(ColumnFamily::CanonicalIndex, b"stale".to_vec());
        db.write_batch(batch).unwrap();

        assert_eq!(
            db.get(ColumnFamily::Headers, b"h1").unwrap(),
            Some(b"header1".to_vec())
        );
        assert_eq!(
            db.get(ColumnFamily::Bodies, b"h1").unwrap(),
            Some(b"body1".to_vec())
        );
        assert_eq!(db.get(ColumnFamily::CanonicalIndex, b"stale").unwrap(), None);
    }

    #[test]
    fn data_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let db = Database::open(tmp.path()).unwrap();
            db.put(ColumnFamily::Headers, b"persist", b"data").unwrap();
        }
        {
            let db = Database::open(tmp.path()).unwrap();
            assert_eq!(
                db.get(ColumnFamily::Headers, b"persist").unwrap(),
                Some(b"data".to_vec())
            );
        }
    }
}
