//! Network-wide sub-collectors: client releases and finality delay.

use std::sync::Arc;

use chainpulse_core::events::EventName;
use chainpulse_db::repositories::{ClientReleaseRepo, EpochRepo, SubscriptionRepo};

use crate::accumulator::NotificationsPerUserId;
use crate::error::CollectError;
use crate::types::network::{ClientUpdateNotification, NetworkLivenessNotification};

use super::CollectContext;

/// New Ethereum client releases.
///
/// Subscriptions filter on the lowercase client name; the cooldown is the
/// release timestamp, so one subscription fires once per release.
pub(super) async fn collect_client_updates(
    ctx: &CollectContext<'_>,
    acc: &mut NotificationsPerUserId,
) -> Result<(), CollectError> {
    let releases = ClientReleaseRepo::latest_releases(ctx.pool).await?;
    if releases.is_empty() {
        return Ok(());
    }

    let filters: Vec<String> = releases.iter().map(|r| r.client.to_lowercase()).collect();
    let subs = SubscriptionRepo::list_for_event_filtered(
        ctx.pool,
        EventName::EthClientUpdate.as_str(),
        &filters,
    )
    .await?;

    for release in &releases {
        let filter = release.client.to_lowercase();
        for sub in subs.iter().filter(|s| s.event_filter == filter) {
            if sub.should_suppress_for_epoch(ctx.epoch) {
                continue;
            }
            // Already notified about this release (or a newer one).
            if matches!(sub.last_sent_ts, Some(ts) if ts >= release.released_at) {
                continue;
            }
            acc.add(Arc::new(ClientUpdateNotification {
                meta: ctx.metadata_for(sub, EventName::EthClientUpdate),
                client: release.client.clone(),
                version: release.version.clone(),
            }));
        }
    }
    Ok(())
}

/// Finality delay alerts.
pub(super) async fn collect_network_liveness(
    ctx: &CollectContext<'_>,
    acc: &mut NotificationsPerUserId,
) -> Result<(), CollectError> {
    let latest = EpochRepo::latest_epoch(ctx.pool).await?.unwrap_or(0);
    let finalized = EpochRepo::latest_finalized_epoch(ctx.pool).await?.unwrap_or(0);
    let delay = (latest - finalized).max(0) as u64;
    if delay < ctx.config.finality_delay_threshold {
        return Ok(());
    }

    let subs = SubscriptionRepo::list_for_event(
        ctx.pool,
        EventName::NetworkLivenessIncreased.as_str(),
    )
    .await?;
    for sub in &subs {
        if sub.should_suppress_for_epoch(ctx.epoch) {
            continue;
        }
        acc.add(Arc::new(NetworkLivenessNotification {
            meta: ctx.metadata_for(sub, EventName::NetworkLivenessIncreased),
            finality_delay: delay,
        }));
    }
    Ok(())
}
