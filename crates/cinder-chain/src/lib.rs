//! # cinder-chain
//!
//! Mutable blockchain index for the cinder node.
//!
//! This crate accepts validated blocks together with their execution
//! receipts, persists them through `cinder-storage`, and maintains the
//! canonical chain: the unique path from genesis to the tip of greatest
//! total difficulty. It provides:
//!
//! - `Blockchain`: genesis installation, block append, fork tracking and
//!   chain reorganization
//! - `ChainStorage` / `Updater`: typed reads and atomic batched writes over
//!   the raw key-value backend
//! - `BlockAddedEvent` and a synchronous observer registry
//! - A `MetricsSystem` facade exposing chain-head gauges
//!
//! ## Concurrency
//!
//! A single engine-wide mutex serializes mutations (`append`, genesis
//! install). Reads go straight to the backend or to the cached head and
//! never take the writer lock. Observers are notified synchronously, in
//! append order, while the writer lock is held.

mod blockchain;
mod error;
mod event;
mod metrics;
mod observers;
mod store;

pub use blockchain::Blockchain;
pub use error::{ChainError, ChainResult};
pub use event::BlockAddedEvent;
pub use metrics::{GaugeFn, MetricsSystem, NoopMetrics, CHAIN_HEIGHT_GAUGE, TOTAL_DIFFICULTY_GAUGE};
pub use observers::{BlockAddedObserver, SubscriptionId};
pub use store::{ChainStorage, Updater};
