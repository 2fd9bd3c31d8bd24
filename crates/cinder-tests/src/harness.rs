//! Test harness for integration tests.
//!
//! Provides database fixtures, chain constructors for both backends, and
//! recording observer/metrics doubles.

use cinder_chain::{
    BlockAddedEvent, BlockAddedObserver, Blockchain, GaugeFn, MetricsSystem, NoopMetrics,
};
use cinder_storage::{Database, MemoryStorage, Storage};
use cinder_types::Block;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Test database wrapper that cleans up on drop.
pub struct TestDatabase {
    db: Database,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a new test database in a temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(temp_dir.path()).expect("Failed to open database");
        Self {
            db,
            _temp_dir: temp_dir,
        }
    }

    /// Path to the database directory.
    pub fn path(&self) -> PathBuf {
        self._temp_dir.path().to_path_buf()
    }

    /// A handle sharing the underlying connection.
    pub fn db_clone(&self) -> Database {
        self.db.clone()
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// A chain over a fresh in-memory store.
pub fn memory_chain(genesis: Block) -> Blockchain {
    chain_on(Arc::new(MemoryStorage::new()), genesis)
}

/// A chain over the given backend, with metrics discarded.
pub fn chain_on(storage: Arc<dyn Storage>, genesis: Block) -> Blockchain {
    Blockchain::new(genesis, storage, &NoopMetrics).expect("Failed to open blockchain")
}

/// Observer that records every delivered event.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<BlockAddedEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All events delivered so far, in order.
    pub fn events(&self) -> Vec<BlockAddedEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl BlockAddedObserver for RecordingObserver {
    fn on_block_added(&self, event: &BlockAddedEvent, _blockchain: &Blockchain) {
        self.events.lock().push(event.clone());
    }
}

/// Observer that panics on every delivery.
pub struct PanickingObserver;

impl BlockAddedObserver for PanickingObserver {
    fn on_block_added(&self, _event: &BlockAddedEvent, _blockchain: &Blockchain) {
        panic!("observer failure");
    }
}

/// Metrics double that keeps registered gauges readable.
#[derive(Default)]
pub struct RecordingMetrics {
    gauges: Mutex<HashMap<&'static str, GaugeFn>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a registered gauge's current value.
    pub fn read(&self, name: &str) -> Option<f64> {
        self.gauges.lock().get(name).map(|gauge| gauge())
    }
}

impl MetricsSystem for RecordingMetrics {
    fn register_gauge(&self, name: &'static str, _help: &'static str, read: GaugeFn) {
        self.gauges.lock().insert(name, read);
    }
}
