//! Repository for per-epoch chain facts: attestation participation, block
//! proposals, withdrawals, slashings, and sync-committee assignments.

use std::collections::HashMap;

use sqlx::PgPool;

use chainpulse_core::types::SLOTS_PER_EPOCH;

use crate::models::chain::{ProposalWithReward, SlashingRow, WithdrawalRow};

/// One `(epoch, validator, attested)` participation fact.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ParticipationRow {
    epoch: i64,
    validator_index: i64,
    attested: bool,
}

/// Provides the chain-fact queries the validator sub-collectors join
/// against subscriptions.
pub struct ChainRepo;

impl ChainRepo {
    /// Attestation participation for every validator over an inclusive
    /// epoch range, as `epoch → validator → attested`.
    pub async fn attestation_participation(
        pool: &PgPool,
        start_epoch: i64,
        end_epoch: i64,
    ) -> Result<HashMap<i64, HashMap<i64, bool>>, sqlx::Error> {
        let rows: Vec<ParticipationRow> = sqlx::query_as(
            "SELECT epoch, validator_index, attested FROM attestation_duties \
             WHERE epoch >= $1 AND epoch <= $2",
        )
        .bind(start_epoch)
        .bind(end_epoch)
        .fetch_all(pool)
        .await?;

        let mut by_epoch: HashMap<i64, HashMap<i64, bool>> = HashMap::new();
        for row in rows {
            by_epoch
                .entry(row.epoch)
                .or_default()
                .insert(row.validator_index, row.attested);
        }
        Ok(by_epoch)
    }

    /// Block proposal outcomes for an epoch, enriched with the
    /// execution-layer reward (the larger of the indexed producer reward
    /// and the winning MEV relay bid; zero when the execution block is not
    /// indexed).
    pub async fn proposals_for_epoch(
        pool: &PgPool,
        epoch: i64,
    ) -> Result<Vec<ProposalWithReward>, sqlx::Error> {
        sqlx::query_as(
            "SELECT p.slot, p.epoch, p.proposer_index, p.status, p.exec_block_number, \
                    COALESCE(GREATEST(er.reward_gwei, rb.value_gwei), \
                             er.reward_gwei, rb.value_gwei, 0) AS reward_gwei \
             FROM block_proposals p \
             LEFT JOIN execution_rewards er ON er.block_number = p.exec_block_number \
             LEFT JOIN relay_bids rb ON rb.block_number = p.exec_block_number \
             WHERE p.epoch = $1 \
             ORDER BY p.slot",
        )
        .bind(epoch)
        .fetch_all(pool)
        .await
    }

    /// Withdrawals processed in the slots of an epoch.
    pub async fn withdrawals_for_epoch(
        pool: &PgPool,
        epoch: i64,
    ) -> Result<Vec<WithdrawalRow>, sqlx::Error> {
        let first_slot = epoch * SLOTS_PER_EPOCH as i64;
        sqlx::query_as(
            "SELECT withdrawal_index, slot, validator_index, address, amount_gwei \
             FROM withdrawals \
             WHERE slot >= $1 AND slot < $2 \
             ORDER BY withdrawal_index",
        )
        .bind(first_slot)
        .bind(first_slot + SLOTS_PER_EPOCH as i64)
        .fetch_all(pool)
        .await
    }

    /// Slashings included in an epoch.
    pub async fn slashings_for_epoch(
        pool: &PgPool,
        epoch: i64,
    ) -> Result<Vec<SlashingRow>, sqlx::Error> {
        sqlx::query_as(
            "SELECT slot, epoch, slasher_index, slashed_index, reason \
             FROM slashings WHERE epoch = $1 ORDER BY slot",
        )
        .bind(epoch)
        .fetch_all(pool)
        .await
    }

    /// Validator indices assigned to the sync committee of a period.
    pub async fn sync_assignments_for_period(
        pool: &PgPool,
        period: i64,
    ) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT validator_index FROM sync_committee_assignments \
             WHERE period = $1 ORDER BY validator_index",
        )
        .bind(period)
        .fetch_all(pool)
        .await
    }

    /// Hex pubkeys for the given validator indices, as `index → pubkey`.
    pub async fn pubkeys_by_index(
        pool: &PgPool,
        indices: &[i64],
    ) -> Result<HashMap<i64, String>, sqlx::Error> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT validator_index, pubkey FROM validators \
             WHERE validator_index = ANY($1)",
        )
        .bind(indices)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    /// The full `pubkey → index` mapping, for filter resolution.
    pub async fn indices_by_pubkey(pool: &PgPool) -> Result<HashMap<String, i64>, sqlx::Error> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT pubkey, validator_index FROM validators")
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().collect())
    }
}
