//! Validator event sub-collectors: proposals, attestations, liveness,
//! slashings, withdrawals, and upcoming sync-committee duties.
//!
//! Each follows the same shape: load the epoch's facts, resolve the
//! affected validators to pubkeys, load the matching subscriptions, apply
//! the cooldown check, and emit into the accumulator.

use std::collections::HashMap;
use std::sync::Arc;

use chainpulse_core::events::EventName;
use chainpulse_core::types::EPOCHS_PER_SYNC_PERIOD;
use chainpulse_db::models::chain::{
    ProposalWithReward, PROPOSAL_STATUS_MISSED, PROPOSAL_STATUS_PROPOSED,
};
use chainpulse_db::repositories::{ChainRepo, SubscriptionRepo};

use crate::accumulator::NotificationsPerUserId;
use crate::error::CollectError;
use crate::types::validator::{
    AttestationMissedNotification, ProposalNotification, SlashedNotification,
    SyncCommitteeSoonNotification, ValidatorLivenessNotification, WithdrawalNotification,
};

use super::{CollectContext, MIN_PARTICIPATION};

/// Block proposal outcomes, enriched with the execution reward.
pub(super) async fn collect_proposals(
    ctx: &CollectContext<'_>,
    acc: &mut NotificationsPerUserId,
) -> Result<(), CollectError> {
    let proposals = ChainRepo::proposals_for_epoch(ctx.pool, ctx.epoch as i64).await?;
    if proposals.is_empty() {
        return Ok(());
    }

    let indices: Vec<i64> = proposals.iter().map(|p| p.proposer_index).collect();
    let pubkeys = ChainRepo::pubkeys_by_index(ctx.pool, &indices).await?;

    let by_status: [(i16, EventName); 2] = [
        (PROPOSAL_STATUS_PROPOSED, EventName::ValidatorProposalSubmitted),
        (PROPOSAL_STATUS_MISSED, EventName::ValidatorProposalMissed),
    ];

    for (status, event) in by_status {
        let relevant: Vec<&ProposalWithReward> =
            proposals.iter().filter(|p| p.status == status).collect();
        if relevant.is_empty() {
            continue;
        }
        let filters: Vec<String> = relevant
            .iter()
            .filter_map(|p| pubkeys.get(&p.proposer_index).cloned())
            .collect();
        let subs =
            SubscriptionRepo::list_for_event_filtered(ctx.pool, event.as_str(), &filters).await?;

        let by_pubkey = index_subs_by_filter(&subs);
        for proposal in relevant {
            let Some(pubkey) = pubkeys.get(&proposal.proposer_index) else {
                continue;
            };
            for sub in by_pubkey.get(pubkey.as_str()).into_iter().flatten() {
                if sub.should_suppress_for_epoch(ctx.epoch) {
                    continue;
                }
                acc.add(Arc::new(ProposalNotification {
                    meta: ctx.metadata_for(sub, event),
                    validator_index: proposal.proposer_index,
                    slot: proposal.slot,
                    status: proposal.status,
                    reward_gwei: proposal.reward_gwei,
                }));
            }
        }
    }
    Ok(())
}

/// Validators that failed to attest in this epoch.
pub(super) async fn collect_attestations_missed(
    ctx: &CollectContext<'_>,
    acc: &mut NotificationsPerUserId,
) -> Result<(), CollectError> {
    let epoch = ctx.epoch as i64;
    let participation = ChainRepo::attestation_participation(ctx.pool, epoch, epoch).await?;
    let Some(duties) = participation.get(&epoch) else {
        return Ok(());
    };

    let missed: Vec<i64> = duties
        .iter()
        .filter(|(_, attested)| !**attested)
        .map(|(idx, _)| *idx)
        .collect();
    if missed.is_empty() {
        return Ok(());
    }

    let pubkeys = ChainRepo::pubkeys_by_index(ctx.pool, &missed).await?;
    let filters: Vec<String> = pubkeys.values().cloned().collect();
    let subs = SubscriptionRepo::list_for_event_filtered(
        ctx.pool,
        EventName::ValidatorAttestationMissed.as_str(),
        &filters,
    )
    .await?;

    let by_pubkey = index_subs_by_filter(&subs);
    for index in missed {
        let Some(pubkey) = pubkeys.get(&index) else {
            continue;
        };
        for sub in by_pubkey.get(pubkey.as_str()).into_iter().flatten() {
            if sub.should_suppress_for_epoch(ctx.epoch) {
                continue;
            }
            acc.add(Arc::new(AttestationMissedNotification {
                meta: ctx.metadata_for(sub, EventName::ValidatorAttestationMissed),
                validator_index: index,
            }));
        }
    }
    Ok(())
}

/// A validator's liveness transition derived from its last four epochs of
/// attestation history, ordered oldest to newest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum LivenessChange {
    /// Attested at `epoch-3`, missed everything since.
    Offline,
    /// Missed `epoch-3 ..= epoch-1`, attested at `epoch`.
    Online,
}

/// Classify the `[epoch-3, epoch-2, epoch-1, epoch]` attestation history.
pub(super) fn classify_liveness(history: [bool; 4]) -> Option<LivenessChange> {
    match history {
        [true, false, false, false] => Some(LivenessChange::Offline),
        [false, false, false, true] => Some(LivenessChange::Online),
        _ => None,
    }
}

/// Fraction of duties attested within one epoch's participation map.
pub(super) fn participation_ratio(duties: &HashMap<i64, bool>) -> f64 {
    if duties.is_empty() {
        return 0.0;
    }
    let attested = duties.values().filter(|a| **a).count();
    attested as f64 / duties.len() as f64
}

/// Newly offline / back online validators.
///
/// Gated twice: the four-epoch window must be complete with healthy
/// participation (otherwise the data, not the validators, is the problem),
/// and the number of transitions must stay under the circuit-breaker limit
/// (a mass transition means upstream corruption, not a mass outage).
pub(super) async fn collect_liveness(
    ctx: &CollectContext<'_>,
    acc: &mut NotificationsPerUserId,
) -> Result<(), CollectError> {
    let epoch = ctx.epoch as i64;
    if epoch < 3 {
        return Ok(());
    }
    let participation =
        ChainRepo::attestation_participation(ctx.pool, epoch - 3, epoch).await?;

    for e in epoch - 3..=epoch {
        let Some(duties) = participation.get(&e) else {
            return Err(CollectError::Consistency(format!(
                "no attestation data for epoch {e}"
            )));
        };
        let ratio = participation_ratio(duties);
        if ratio < MIN_PARTICIPATION {
            return Err(CollectError::Consistency(format!(
                "attestation participation for epoch {e} is {ratio:.2}, below {MIN_PARTICIPATION}"
            )));
        }
    }

    // Indexing below cannot fail: the four epochs were just checked.
    let window: Vec<&HashMap<i64, bool>> = (epoch - 3..=epoch)
        .map(|e| &participation[&e])
        .collect();

    let mut offline: Vec<i64> = Vec::new();
    let mut online: Vec<i64> = Vec::new();
    for (&validator, &latest) in window[3] {
        let history = [
            *window[0].get(&validator).unwrap_or(&false),
            *window[1].get(&validator).unwrap_or(&false),
            *window[2].get(&validator).unwrap_or(&false),
            latest,
        ];
        match classify_liveness(history) {
            Some(LivenessChange::Offline) => offline.push(validator),
            Some(LivenessChange::Online) => online.push(validator),
            None => {}
        }
    }

    let limit = ctx.config.offline_breaker_limit;
    for (count, label) in [(offline.len(), "offline"), (online.len(), "online")] {
        if count > limit {
            tracing::error!(count, limit, label, "Liveness circuit breaker tripped");
            return Err(CollectError::CircuitBreaker {
                event: EventName::ValidatorIsOffline,
                count,
                limit,
            });
        }
    }

    let all: Vec<i64> = offline.iter().chain(online.iter()).copied().collect();
    if all.is_empty() {
        return Ok(());
    }
    let pubkeys = ChainRepo::pubkeys_by_index(ctx.pool, &all).await?;
    let filters: Vec<String> = pubkeys.values().cloned().collect();
    let subs = SubscriptionRepo::list_for_event_filtered(
        ctx.pool,
        EventName::ValidatorIsOffline.as_str(),
        &filters,
    )
    .await?;
    let by_pubkey = index_subs_by_filter(&subs);

    for (validators, is_offline) in [(&offline, true), (&online, false)] {
        for &index in validators.iter() {
            let Some(pubkey) = pubkeys.get(&index) else {
                continue;
            };
            // Offline is reported as of the first epoch the validator
            // stopped attesting.
            let latest_state = if is_offline {
                ctx.epoch - 2
            } else {
                ctx.epoch
            };
            for sub in by_pubkey.get(pubkey.as_str()).into_iter().flatten() {
                if sub.should_suppress_for_epoch(ctx.epoch) {
                    continue;
                }
                acc.add(Arc::new(ValidatorLivenessNotification {
                    meta: ctx.metadata_for(sub, EventName::ValidatorIsOffline),
                    validator_index: index,
                    is_offline,
                    latest_state,
                }));
            }
        }
    }
    Ok(())
}

/// Slashings included in this epoch.
pub(super) async fn collect_slashings(
    ctx: &CollectContext<'_>,
    acc: &mut NotificationsPerUserId,
) -> Result<(), CollectError> {
    let slashings = ChainRepo::slashings_for_epoch(ctx.pool, ctx.epoch as i64).await?;
    if slashings.is_empty() {
        return Ok(());
    }

    let indices: Vec<i64> = slashings.iter().map(|s| s.slashed_index).collect();
    let pubkeys = ChainRepo::pubkeys_by_index(ctx.pool, &indices).await?;
    let filters: Vec<String> = pubkeys.values().cloned().collect();
    let subs = SubscriptionRepo::list_for_event_filtered(
        ctx.pool,
        EventName::ValidatorGotSlashed.as_str(),
        &filters,
    )
    .await?;
    let by_pubkey = index_subs_by_filter(&subs);

    for slashing in &slashings {
        let Some(pubkey) = pubkeys.get(&slashing.slashed_index) else {
            continue;
        };
        for sub in by_pubkey.get(pubkey.as_str()).into_iter().flatten() {
            if sub.should_suppress_for_epoch(ctx.epoch) {
                continue;
            }
            acc.add(Arc::new(SlashedNotification {
                meta: ctx.metadata_for(sub, EventName::ValidatorGotSlashed),
                validator_index: slashing.slashed_index,
                slasher_index: slashing.slasher_index,
                reason: slashing.reason.clone(),
                slot: slashing.slot,
            }));
        }
    }
    Ok(())
}

/// Withdrawals processed in this epoch's slots.
pub(super) async fn collect_withdrawals(
    ctx: &CollectContext<'_>,
    acc: &mut NotificationsPerUserId,
) -> Result<(), CollectError> {
    let withdrawals = ChainRepo::withdrawals_for_epoch(ctx.pool, ctx.epoch as i64).await?;
    if withdrawals.is_empty() {
        return Ok(());
    }

    let indices: Vec<i64> = withdrawals.iter().map(|w| w.validator_index).collect();
    let pubkeys = ChainRepo::pubkeys_by_index(ctx.pool, &indices).await?;
    let filters: Vec<String> = pubkeys.values().cloned().collect();
    let subs = SubscriptionRepo::list_for_event_filtered(
        ctx.pool,
        EventName::ValidatorReceivedWithdrawal.as_str(),
        &filters,
    )
    .await?;
    let by_pubkey = index_subs_by_filter(&subs);

    for withdrawal in &withdrawals {
        let Some(pubkey) = pubkeys.get(&withdrawal.validator_index) else {
            continue;
        };
        for sub in by_pubkey.get(pubkey.as_str()).into_iter().flatten() {
            if sub.should_suppress_for_epoch(ctx.epoch) {
                continue;
            }
            acc.add(Arc::new(WithdrawalNotification {
                meta: ctx.metadata_for(sub, EventName::ValidatorReceivedWithdrawal),
                validator_index: withdrawal.validator_index,
                slot: withdrawal.slot,
                address: withdrawal.address.clone(),
                amount_gwei: withdrawal.amount_gwei,
            }));
        }
    }
    Ok(())
}

/// Upcoming sync-committee assignments, announced a fixed number of
/// epochs before the next period starts.
pub(super) async fn collect_sync_committee_soon(
    ctx: &CollectContext<'_>,
    acc: &mut NotificationsPerUserId,
) -> Result<(), CollectError> {
    if !is_sync_announcement_epoch(ctx.epoch, ctx.config.sync_lookahead_epochs) {
        return Ok(());
    }
    let next_period = ctx.epoch / EPOCHS_PER_SYNC_PERIOD + 1;
    let start_epoch = next_period * EPOCHS_PER_SYNC_PERIOD;

    let assigned =
        ChainRepo::sync_assignments_for_period(ctx.pool, next_period as i64).await?;
    if assigned.is_empty() {
        return Ok(());
    }

    let pubkeys = ChainRepo::pubkeys_by_index(ctx.pool, &assigned).await?;
    let filters: Vec<String> = pubkeys.values().cloned().collect();
    let subs = SubscriptionRepo::list_for_event_filtered(
        ctx.pool,
        EventName::ValidatorSynccommitteeSoon.as_str(),
        &filters,
    )
    .await?;
    let by_pubkey = index_subs_by_filter(&subs);

    for index in assigned {
        let Some(pubkey) = pubkeys.get(&index) else {
            continue;
        };
        for sub in by_pubkey.get(pubkey.as_str()).into_iter().flatten() {
            if sub.should_suppress_for_epoch(ctx.epoch) {
                continue;
            }
            acc.add(Arc::new(SyncCommitteeSoonNotification {
                meta: ctx.metadata_for(sub, EventName::ValidatorSynccommitteeSoon),
                validator_index: index,
                period: next_period,
                start_epoch,
            }));
        }
    }
    Ok(())
}

/// Whether `epoch` is exactly `lookahead` epochs before a period boundary.
pub(super) fn is_sync_announcement_epoch(epoch: u64, lookahead: u64) -> bool {
    (epoch + lookahead + 1) % EPOCHS_PER_SYNC_PERIOD == 0
}

/// Index subscriptions by their event filter for the join.
pub(super) fn index_subs_by_filter(
    subs: &[chainpulse_db::models::subscription::Subscription],
) -> HashMap<&str, Vec<&chainpulse_db::models::subscription::Subscription>> {
    let mut by_filter: HashMap<&str, Vec<_>> = HashMap::new();
    for sub in subs {
        by_filter.entry(sub.event_filter.as_str()).or_default().push(sub);
    }
    by_filter
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newly_offline_is_detected() {
        assert_eq!(
            classify_liveness([true, false, false, false]),
            Some(LivenessChange::Offline)
        );
    }

    #[test]
    fn newly_online_is_detected() {
        assert_eq!(
            classify_liveness([false, false, false, true]),
            Some(LivenessChange::Online)
        );
    }

    #[test]
    fn steady_states_are_ignored() {
        assert_eq!(classify_liveness([true, true, true, true]), None);
        // Already flagged offline in an earlier pass.
        assert_eq!(classify_liveness([false, false, false, false]), None);
        // A single missed attestation is not an outage.
        assert_eq!(classify_liveness([true, true, false, true]), None);
        // Still in the middle of going offline.
        assert_eq!(classify_liveness([true, true, false, false]), None);
    }

    #[test]
    fn participation_ratio_counts_attested() {
        let duties: HashMap<i64, bool> =
            [(1, true), (2, true), (3, false), (4, true)].into_iter().collect();
        assert!((participation_ratio(&duties) - 0.75).abs() < f64::EPSILON);
        assert_eq!(participation_ratio(&HashMap::new()), 0.0);
    }

    #[test]
    fn sync_announcement_fires_lookahead_epochs_before_boundary() {
        // Period boundary at 512; with a lookahead of 225 the
        // announcement epoch is 286.
        assert!(is_sync_announcement_epoch(286, 225));
        assert!(!is_sync_announcement_epoch(285, 225));
        assert!(!is_sync_announcement_epoch(287, 225));
    }

}
