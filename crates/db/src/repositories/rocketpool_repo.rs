//! Repository for Rocket Pool fact tables.

use sqlx::PgPool;

use crate::models::rocketpool::{MinipoolRow, RewardRoundRow, RocketpoolNodeStats};

/// Provides Rocket Pool protocol facts for the Rocket Pool sub-collector.
pub struct RocketpoolRepo;

impl RocketpoolRepo {
    /// All minipools with their commission rate.
    pub async fn minipools(pool: &PgPool) -> Result<Vec<MinipoolRow>, sqlx::Error> {
        sqlx::query_as("SELECT pubkey, node_address, node_fee FROM rocketpool_minipools")
            .fetch_all(pool)
            .await
    }

    /// Current RPL stake and collateral bounds per node.
    pub async fn node_stats(pool: &PgPool) -> Result<Vec<RocketpoolNodeStats>, sqlx::Error> {
        sqlx::query_as(
            "SELECT node_address, rpl_stake, min_rpl_stake, max_rpl_stake, updated_at \
             FROM rocketpool_node_stats",
        )
        .fetch_all(pool)
        .await
    }

    /// The most recent RPL reward round, if the protocol tables are
    /// populated.
    pub async fn latest_reward_round(
        pool: &PgPool,
    ) -> Result<Option<RewardRoundRow>, sqlx::Error> {
        sqlx::query_as(
            "SELECT round_index, claim_interval_start FROM rocketpool_reward_rounds \
             ORDER BY round_index DESC LIMIT 1",
        )
        .fetch_optional(pool)
        .await
    }
}
