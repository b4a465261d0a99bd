//! Rocket Pool sub-collectors: commission, claim rounds, and collateral
//! bounds.

use std::sync::Arc;

use chainpulse_core::events::EventName;
use chainpulse_db::models::rocketpool::RocketpoolNodeStats;
use chainpulse_db::repositories::{RocketpoolRepo, SubscriptionRepo};

use crate::accumulator::NotificationsPerUserId;
use crate::error::CollectError;
use crate::types::rocketpool::{
    CollateralBound, RocketpoolClaimRoundNotification, RocketpoolCommissionNotification,
    RocketpoolCollateralNotification,
};

use super::CollectContext;

/// Network commission rate crossing subscriber thresholds.
pub(super) async fn collect_commission(
    ctx: &CollectContext<'_>,
    acc: &mut NotificationsPerUserId,
) -> Result<(), CollectError> {
    let minipools = RocketpoolRepo::minipools(ctx.pool).await?;
    if minipools.is_empty() {
        return Ok(());
    }
    let commission =
        minipools.iter().map(|m| m.node_fee).sum::<f64>() / minipools.len() as f64;

    let subs = SubscriptionRepo::list_for_event(
        ctx.pool,
        EventName::RocketpoolCommissionThreshold.as_str(),
    )
    .await?;
    for sub in &subs {
        if sub.should_suppress_for_epoch(ctx.epoch) {
            continue;
        }
        if sub.event_threshold <= 0.0 || commission < sub.event_threshold {
            continue;
        }
        acc.add(Arc::new(RocketpoolCommissionNotification {
            meta: ctx.metadata_for(sub, EventName::RocketpoolCommissionThreshold),
            commission,
        }));
    }
    Ok(())
}

/// New RPL claim rounds: fires once per round per subscription, gated by
/// the round start against the subscription's last-sent timestamp.
pub(super) async fn collect_claim_rounds(
    ctx: &CollectContext<'_>,
    acc: &mut NotificationsPerUserId,
) -> Result<(), CollectError> {
    let Some(round) = RocketpoolRepo::latest_reward_round(ctx.pool).await? else {
        return Ok(());
    };

    let subs = SubscriptionRepo::list_for_event(
        ctx.pool,
        EventName::RocketpoolNewClaimround.as_str(),
    )
    .await?;
    for sub in &subs {
        if sub.should_suppress_for_epoch(ctx.epoch) {
            continue;
        }
        let already_notified = match sub.last_sent_ts {
            Some(ts) => ts >= round.claim_interval_start,
            None => false,
        };
        if already_notified {
            continue;
        }
        acc.add(Arc::new(RocketpoolClaimRoundNotification {
            meta: ctx.metadata_for(sub, EventName::RocketpoolNewClaimround),
            round_index: round.round_index,
        }));
    }
    Ok(())
}

/// Collateral bound alerts. Subscriptions filter on the node address; the
/// threshold scales the bound the user wants to be warned at.
pub(super) async fn collect_collateral(
    ctx: &CollectContext<'_>,
    acc: &mut NotificationsPerUserId,
) -> Result<(), CollectError> {
    let stats = RocketpoolRepo::node_stats(ctx.pool).await?;
    if stats.is_empty() {
        return Ok(());
    }

    for (event, bound) in [
        (EventName::RocketpoolCollateralMinReached, CollateralBound::Min),
        (EventName::RocketpoolCollateralMaxReached, CollateralBound::Max),
    ] {
        let filters: Vec<String> = stats.iter().map(|s| s.node_address.clone()).collect();
        let subs =
            SubscriptionRepo::list_for_event_filtered(ctx.pool, event.as_str(), &filters).await?;

        for node in &stats {
            for sub in subs.iter().filter(|s| s.event_filter == node.node_address) {
                if sub.should_suppress_for_epoch(ctx.epoch) {
                    continue;
                }
                if !collateral_bound_reached(node, bound, sub.event_threshold) {
                    continue;
                }
                acc.add(Arc::new(RocketpoolCollateralNotification {
                    meta: ctx.metadata_for(sub, event),
                    node_address: node.node_address.clone(),
                    rpl_stake: node.rpl_stake,
                    bound,
                }));
            }
        }
    }
    Ok(())
}

/// Min: the stake fell to within `threshold` (a fraction above the
/// minimum, default exactly at it). Max: the stake reached the maximum
/// scaled by `threshold` (default the full maximum).
pub(super) fn collateral_bound_reached(
    node: &RocketpoolNodeStats,
    bound: CollateralBound,
    threshold: f64,
) -> bool {
    match bound {
        CollateralBound::Min => {
            let scale = 1.0 + threshold.max(0.0);
            node.rpl_stake <= node.min_rpl_stake * scale
        }
        CollateralBound::Max => {
            let scale = if threshold > 0.0 { threshold } else { 1.0 };
            node.rpl_stake >= node.max_rpl_stake * scale
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn node(stake: f64, min: f64, max: f64) -> RocketpoolNodeStats {
        RocketpoolNodeStats {
            node_address: "0xnode".to_string(),
            rpl_stake: stake,
            min_rpl_stake: min,
            max_rpl_stake: max,
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn min_bound_with_headroom_threshold() {
        let n = node(110.0, 100.0, 1500.0);
        // Exactly at min scale 1.0: 110 > 100, no alert.
        assert!(!collateral_bound_reached(&n, CollateralBound::Min, 0.0));
        // 10% headroom: 110 <= 100 * 1.1.
        assert!(collateral_bound_reached(&n, CollateralBound::Min, 0.1));
    }

    #[test]
    fn max_bound_defaults_to_full_maximum() {
        let n = node(1500.0, 100.0, 1500.0);
        assert!(collateral_bound_reached(&n, CollateralBound::Max, 0.0));
        assert!(!collateral_bound_reached(
            &node(1400.0, 100.0, 1500.0),
            CollateralBound::Max,
            0.0
        ));
        // 90% of max is enough when the user says so.
        assert!(collateral_bound_reached(
            &node(1400.0, 100.0, 1500.0),
            CollateralBound::Max,
            0.9
        ));
    }
}
