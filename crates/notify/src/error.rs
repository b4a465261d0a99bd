//! Pipeline error taxonomy.

use chainpulse_core::events::EventName;
use chainpulse_db::metrics::MetricsStoreError;

/// Error aborting a collection pass.
///
/// None of these are fatal to the process: the pass is abandoned without
/// the epoch marker being written, and the epoch is retried on the next
/// loop tick.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// The store failed a consistency precondition (epoch gap, missing or
    /// degraded attestation data). Collecting would risk false positives.
    #[error("Store consistency check failed: {0}")]
    Consistency(String),

    /// An anomalous candidate volume tripped a circuit breaker; this looks
    /// like upstream data corruption, not a legitimate mass event.
    #[error("Circuit breaker tripped for {event}: {count} candidates (limit {limit})")]
    CircuitBreaker {
        event: EventName,
        count: usize,
        limit: usize,
    },

    /// A store read or the queuing transaction failed.
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// The machine-metrics store failed.
    #[error(transparent)]
    Metrics(#[from] MetricsStoreError),
}
