//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `ledger_operations_committed_total` - Operations committed
//! - `ledger_operations_rejected_total` - Operations rejected by validation
//! - `ledger_commit_conflicts_total` - Optimistic commit conflicts retried
//! - `ledger_contention_exhausted_total` - Operations that ran out of retries
//! - `ledger_operation_duration_seconds` - Submit-to-commit latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Operations committed
    pub operations_committed: IntCounter,

    /// Operations rejected by validation
    pub operations_rejected: IntCounter,

    /// Optimistic commit conflicts that triggered a retry
    pub commit_conflicts: IntCounter,

    /// Operations that exhausted the retry budget
    pub contention_exhausted: IntCounter,

    /// Submit-to-commit latency histogram
    pub operation_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("operations_committed", &self.operations_committed.get())
            .field("operations_rejected", &self.operations_rejected.get())
            .field("commit_conflicts", &self.commit_conflicts.get())
            .finish()
    }
}

impl Metrics {
    /// Create a metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let operations_committed = IntCounter::new(
            "ledger_operations_committed_total",
            "Operations committed",
        )?;
        registry.register(Box::new(operations_committed.clone()))?;

        let operations_rejected = IntCounter::new(
            "ledger_operations_rejected_total",
            "Operations rejected by validation",
        )?;
        registry.register(Box::new(operations_rejected.clone()))?;

        let commit_conflicts = IntCounter::new(
            "ledger_commit_conflicts_total",
            "Optimistic commit conflicts retried",
        )?;
        registry.register(Box::new(commit_conflicts.clone()))?;

        let contention_exhausted = IntCounter::new(
            "ledger_contention_exhausted_total",
            "Operations that exhausted the retry budget",
        )?;
        registry.register(Box::new(contention_exhausted.clone()))?;

        let operation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_operation_duration_seconds",
                "Submit-to-commit latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            operations_committed,
            operations_rejected,
            commit_conflicts,
            contention_exhausted,
            operation_duration,
            registry,
        })
    }

    /// Record a committed operation
    pub fn record_commit(&self) {
        self.operations_committed.inc();
    }

    /// Record a validation rejection
    pub fn record_rejection(&self) {
        self.operations_rejected.inc();
    }

    /// Record a commit conflict
    pub fn record_conflict(&self) {
        self.commit_conflicts.inc();
    }

    /// Record a retry-budget exhaustion
    pub fn record_exhausted(&self) {
        self.contention_exhausted.inc();
    }

    /// Record submit-to-commit duration
    pub fn record_duration(&self, duration_seconds: f64) {
        self.operation_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
