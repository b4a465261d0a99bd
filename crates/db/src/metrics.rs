//! Seam for the columnar machine-metrics store.
//!
//! Machine monitoring metrics live in a wide-column store maintained by the
//! staking-app ingest path, not in Postgres. The collector only needs one
//! keyed lookup per pass, expressed here as [`MachineMetricsStore`] so the
//! monitoring sub-collector can be exercised against an in-memory fake.

use std::collections::HashMap;

use async_trait::async_trait;

use chainpulse_core::types::{DbId, Timestamp};

/// Key identifying one monitored machine: `(user, "system", machine)` in
/// the wide store's row-key scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MachineKey {
    pub user_id: DbId,
    pub machine: String,
}

/// One system-metrics sample as reported by the monitoring agent.
#[derive(Debug, Clone, Default)]
pub struct SystemMetrics {
    pub timestamp: Option<Timestamp>,
    pub disk_node_bytes_free: i64,
    pub disk_node_bytes_total: i64,
    pub cpu_node_system_seconds_total: i64,
    pub cpu_node_idle_seconds_total: i64,
    pub memory_node_bytes_total: i64,
    pub memory_node_bytes_free: i64,
    pub memory_node_bytes_cached: i64,
    pub memory_node_bytes_buffers: i64,
}

/// The current sample plus the sample from five minutes earlier, used for
/// rate-style predicates (CPU load over the window).
#[derive(Debug, Clone, Default)]
pub struct MetricsPair {
    pub current: SystemMetrics,
    pub five_minutes_ago: Option<SystemMetrics>,
}

/// Error from the metrics store backend.
#[derive(Debug, thiserror::Error)]
#[error("Machine metrics store error: {0}")]
pub struct MetricsStoreError(pub String);

/// Keyed lookup of current + 5-minute-old system metrics per machine.
#[async_trait]
pub trait MachineMetricsStore: Send + Sync {
    /// Fetch metrics for each requested machine. Machines that never
    /// reported are absent from the result map.
    async fn machine_metrics(
        &self,
        keys: &[MachineKey],
    ) -> Result<HashMap<MachineKey, MetricsPair>, MetricsStoreError>;
}

/// Store used when no metrics backend is configured: every machine looks
/// like it never reported, so no machine alerts fire.
pub struct NullMetricsStore;

#[async_trait]
impl MachineMetricsStore for NullMetricsStore {
    async fn machine_metrics(
        &self,
        _keys: &[MachineKey],
    ) -> Result<HashMap<MachineKey, MetricsPair>, MetricsStoreError> {
        Ok(HashMap::new())
    }
}
