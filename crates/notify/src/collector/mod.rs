//! Epoch-driven notification collector.
//!
//! One pass turns the raw chain/DB state of a single finalized epoch into
//! a typed, deduplicated notification set per user, which the queuing
//! renderer then persists. Any sub-collector error aborts the whole pass
//! for that epoch; since the epoch marker commits with the queue rows,
//! an aborted epoch is simply retried on the next loop tick.

mod machine;
mod network;
mod rocketpool;
mod user;
mod validator;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use chainpulse_db::metrics::MachineMetricsStore;
use chainpulse_db::models::dashboard::ValidatorDashboardConfig;
use chainpulse_db::models::subscription::Subscription;
use chainpulse_db::repositories::{DashboardRepo, EpochRepo};
use chainpulse_db::DbPool;

use chainpulse_core::events::EventName;

use crate::accumulator::NotificationsPerUserId;
use crate::config::NotifyConfig;
use crate::error::CollectError;
use crate::queuing;
use crate::types::NotificationMetadata;

pub use machine::MachineCollector;

/// Minimum attestation participation per epoch for the offline/online
/// detector to trust the data.
const MIN_PARTICIPATION: f64 = 0.6;

/// Shared read-only state for one collection pass.
pub(crate) struct CollectContext<'a> {
    pub pool: &'a DbPool,
    pub config: &'a NotifyConfig,
    pub epoch: u64,
    pub dashboards: &'a ValidatorDashboardConfig,
}

impl CollectContext<'_> {
    /// Build the shared metadata for a notification emitted to `sub`.
    pub fn metadata_for(&self, sub: &Subscription, event: EventName) -> NotificationMetadata {
        let mut meta = NotificationMetadata {
            subscription_id: sub.id,
            user_id: sub.user_id,
            epoch: self.epoch,
            event_name: event,
            event_filter: sub.event_filter.clone(),
            dashboard_id: sub.dashboard_id,
            dashboard_name: None,
            group_id: sub.group_id,
            group_name: None,
        };
        // Dashboard/group names come from the per-pass snapshot when the
        // subscription is dashboard-scoped.
        if let (Some(dash_id), Some(group_id)) = (sub.dashboard_id, sub.group_id) {
            if let Some(row) = self
                .dashboards
                .iter_rows()
                .find(|r| r.dashboard_id == dash_id && r.group_id == group_id)
            {
                meta.dashboard_name = Some(row.dashboard_name.clone());
                meta.group_name = Some(row.group_name.clone());
            }
        }
        meta
    }
}

/// The epoch-driven orchestrator.
pub struct NotificationCollector {
    pool: DbPool,
    config: NotifyConfig,
    metrics_store: Arc<dyn MachineMetricsStore>,
    machine: MachineCollector,
}

impl NotificationCollector {
    pub fn new(
        pool: DbPool,
        config: NotifyConfig,
        metrics_store: Arc<dyn MachineMetricsStore>,
    ) -> Self {
        Self {
            pool,
            config,
            metrics_store,
            machine: MachineCollector::new(),
        }
    }

    /// Run the collector loop until cancelled.
    ///
    /// Each tick collects and queues every pending epoch in increasing
    /// order, stopping at the first failure so the failed epoch is
    /// retried on the next tick.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.collector_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Notification collector cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.collect_pending().await {
                        tracing::error!(error = %e, "Collection pass failed, will retry");
                    }
                }
            }
        }
    }

    /// Collect and queue every epoch in
    /// `last_notified+1 ..= latest_finalized`, capped to the lookback
    /// window so catch-up work after downtime stays bounded.
    pub async fn collect_pending(&mut self) -> Result<(), CollectError> {
        let Some(latest_finalized) = EpochRepo::latest_finalized_epoch(&self.pool).await? else {
            return Ok(());
        };
        let latest_finalized = latest_finalized as u64;
        let last_notified = EpochRepo::last_notified_epoch(&self.pool)
            .await?
            .map(|e| e as u64);

        let mut start = match last_notified {
            Some(last) if last >= latest_finalized => return Ok(()),
            Some(last) => last + 1,
            None => latest_finalized,
        };
        let window_floor =
            latest_finalized.saturating_sub(self.config.epoch_lookback.saturating_sub(1));
        if start < window_floor {
            tracing::warn!(
                skipped_from = start,
                skipped_to = window_floor - 1,
                "Catch-up window exceeded, skipping epochs"
            );
            start = window_floor;
        }

        for epoch in start..=latest_finalized {
            let accumulator = self.collect(epoch).await?;
            tracing::info!(epoch, count = accumulator.total(), "Collected notifications");
            queuing::queue_notifications(&self.pool, &accumulator, epoch).await?;
        }
        Ok(())
    }

    /// One collection pass: verify store consistency, then run every
    /// sub-collector against the epoch.
    pub async fn collect(&mut self, epoch: u64) -> Result<NotificationsPerUserId, CollectError> {
        let recent =
            EpochRepo::recent_epochs(&self.pool, self.config.epoch_lookback as i64).await?;
        if !epochs_contiguous(&recent) {
            return Err(CollectError::Consistency(format!(
                "epoch ledger has a gap near the head: {recent:?}"
            )));
        }

        let dashboards = DashboardRepo::load_config(&self.pool).await?;
        let ctx = CollectContext {
            pool: &self.pool,
            config: &self.config,
            epoch,
            dashboards: &dashboards,
        };

        let mut acc = NotificationsPerUserId::new();

        validator::collect_proposals(&ctx, &mut acc).await?;
        validator::collect_attestations_missed(&ctx, &mut acc).await?;
        validator::collect_liveness(&ctx, &mut acc).await?;
        validator::collect_slashings(&ctx, &mut acc).await?;
        validator::collect_withdrawals(&ctx, &mut acc).await?;
        validator::collect_sync_committee_soon(&ctx, &mut acc).await?;
        network::collect_client_updates(&ctx, &mut acc).await?;
        network::collect_network_liveness(&ctx, &mut acc).await?;
        user::collect_tax_reports(&ctx, &mut acc).await?;
        rocketpool::collect_commission(&ctx, &mut acc).await?;
        rocketpool::collect_claim_rounds(&ctx, &mut acc).await?;
        rocketpool::collect_collateral(&ctx, &mut acc).await?;
        self.machine
            .collect(&ctx, self.metrics_store.as_ref(), &mut acc)
            .await?;

        Ok(acc)
    }
}

/// The head of the epoch ledger must be strictly contiguous: the two most
/// recent epochs differ by exactly one.
pub(crate) fn epochs_contiguous(recent_desc: &[i64]) -> bool {
    match recent_desc {
        [] | [_] => false,
        [head, next, ..] => *head == *next + 1,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_head_passes() {
        assert!(epochs_contiguous(&[105, 104, 103, 102, 101]));
    }

    #[test]
    fn gap_at_head_fails() {
        assert!(!epochs_contiguous(&[105, 103, 102]));
    }

    #[test]
    fn short_ledger_fails() {
        assert!(!epochs_contiguous(&[]));
        assert!(!epochs_contiguous(&[105]));
    }

    #[test]
    fn gap_below_head_is_tolerated() {
        // Only the last two epochs gate collection; older gaps are the
        // indexer's backfill problem.
        assert!(epochs_contiguous(&[105, 104, 101]));
    }
}
