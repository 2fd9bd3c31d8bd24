//! Metrics facade.
//!
//! The index exposes two gauges driven by pure reads of chain-head state.
//! The metrics framework is an injected collaborator: callers hand the
//! engine a `MetricsSystem` at construction and the engine registers its
//! gauges against it. The default backend is a no-op.

/// Supplier for a gauge's current value.
pub type GaugeFn = Box<dyn Fn() -> f64 + Send + Sync>;

/// Current canonical block number.
pub const CHAIN_HEIGHT_GAUGE: &str = "blockchain.height";

/// Total difficulty of the current chain head.
pub const TOTAL_DIFFICULTY_GAUGE: &str = "blockchain.difficulty_total";

/// Gauge registration sink.
pub trait MetricsSystem: Send + Sync {
    /// Register a gauge whose value is read on demand via `read`.
    fn register_gauge(&self, name: &'static str, help: &'static str, read: GaugeFn);
}

/// Metrics backend that discards all registrations.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSystem for NoopMetrics {
    fn register_gauge(&self, _name: &'static str, _help: &'static str, _read: GaugeFn) {}
}
