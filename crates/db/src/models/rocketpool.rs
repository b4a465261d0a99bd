//! Rocket Pool fact row types.

use sqlx::FromRow;

use chainpulse_core::types::Timestamp;

/// A row from the `rocketpool_minipools` table.
#[derive(Debug, Clone, FromRow)]
pub struct MinipoolRow {
    pub pubkey: String,
    pub node_address: String,
    /// Commission rate as a fraction (e.g. 0.15 for 15%).
    pub node_fee: f64,
}

/// A row from the `rocketpool_node_stats` table.
///
/// Stakes are RPL amounts as floating point; they are only compared against
/// user-configured threshold fractions, never summed.
#[derive(Debug, Clone, FromRow)]
pub struct RocketpoolNodeStats {
    pub node_address: String,
    pub rpl_stake: f64,
    pub min_rpl_stake: f64,
    pub max_rpl_stake: f64,
    pub updated_at: Timestamp,
}

/// A row from the `rocketpool_reward_rounds` table.
#[derive(Debug, Clone, FromRow)]
pub struct RewardRoundRow {
    pub round_index: i64,
    pub claim_interval_start: Timestamp,
}
