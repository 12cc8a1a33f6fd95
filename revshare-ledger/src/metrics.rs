//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `revshare_operations_total{operation,outcome}` - Operations by result
//! - `revshare_revenue_distributed_total` - Nominal revenue distributed
//! - `revshare_earnings_withdrawn_total` - Earnings withdrawn
//! - `revshare_blocks_total` - Sealed blocks
//! - `revshare_chain_height` - Height of the last sealed block
//!
//! Counters live in a private [`Registry`] per collector, so several ledgers
//! can coexist in one process.

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Operations by name and outcome
    pub operations_total: IntCounterVec,

    /// Nominal revenue distributed (saturates at u64::MAX per increment)
    pub revenue_distributed: IntCounter,

    /// Earnings withdrawn
    pub earnings_withdrawn: IntCounter,

    /// Sealed blocks
    pub blocks_total: IntCounter,

    /// Last sealed height
    pub chain_height: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("blocks_total", &self.blocks_total.get())
            .field("chain_height", &self.chain_height.get())
            .finish()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let operations_total = IntCounterVec::new(
            Opts::new("revshare_operations_total", "Ledger operations by outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let revenue_distributed = IntCounter::new(
            "revshare_revenue_distributed_total",
            "Nominal revenue distributed",
        )?;
        registry.register(Box::new(revenue_distributed.clone()))?;

        let earnings_withdrawn =
            IntCounter::new("revshare_earnings_withdrawn_total", "Earnings withdrawn")?;
        registry.register(Box::new(earnings_withdrawn.clone()))?;

        let blocks_total = IntCounter::new("revshare_blocks_total", "Sealed blocks")?;
        registry.register(Box::new(blocks_total.clone()))?;

        let chain_height = IntGauge::new("revshare_chain_height", "Last sealed height")?;
        registry.register(Box::new(chain_height.clone()))?;

        Ok(Self {
            operations_total,
            revenue_distributed,
            earnings_withdrawn,
            blocks_total,
            chain_height,
            registry,
        })
    }

    /// Record an operation result; `outcome` is "ok" or an error kind label
    pub fn record_operation(&self, operation: &str, outcome: &str) {
        self.operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Record a distribution
    pub fn record_distribution(&self, amount: u128) {
        self.revenue_distributed
            .inc_by(u64::try_from(amount).unwrap_or(u64::MAX));
    }

    /// Record a withdrawal
    pub fn record_withdrawal(&self, amount: u128) {
        self.earnings_withdrawn
            .inc_by(u64::try_from(amount).unwrap_or(u64::MAX));
    }

    /// Record a sealed block
    pub fn record_block_sealed(&self, height: u64) {
        self.blocks_total.inc();
        self.chain_height
            .set(i64::try_from(height).unwrap_or(i64::MAX));
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
