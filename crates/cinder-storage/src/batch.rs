//! Write batch for atomic multi-key updates.

use crate::ColumnFamily;

/// One buffered write.
#[derive(Debug, Clone)]
pub(crate) enum BatchOperation {
    Put {
        cf: ColumnFamily,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        cf: ColumnFamily,
        key: Vec<u8>,
    },
}

/// An ordered set of writes applied atomically.
///
/// Nothing touches the backing store until the batch is handed to
/// `Storage::write_batch`; dropping a batch discards it.
#[derive(Debug, Default)]
pub struct WriteBatch {
    pub(crate) operations: Vec<BatchOperation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a put.
    pub fn put(&mut self, cf: ColumnFamily, key: Vec<u8>, value: Vec<u8>) {
        self.operations.push(BatchOperation::Put { cf, key, value });
    }

    /// Buffer a delete.
    pub fn delete(&mut self, cf: ColumnFamily, key: Vec<u8>) {
        self.operations.push(BatchOperation::Delete { cf, key });
    }

    /// Number of buffered writes.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_writes_in_order() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());

        batch.put(ColumnFamily::Headers, b"k1".to_vec(), b"v1".to_vec());
        batch.delete(ColumnFamily::CanonicalIndex, b"k2".to_vec());

        assert_eq!(batch.len(), 2);
        assert!(matches!(batch.operations[0], BatchOperation::Put { .. }));
        assert!(matches!(
            batch.operations[1],
            BatchOperation::Delete { .. }
        ));
    }
}
