//! Chain fact row types (proposals, withdrawals, slashings, sync duties,
//! client releases).

use sqlx::FromRow;

use chainpulse_core::types::{DbId, Timestamp};

/// Block proposal status: proposed.
pub const PROPOSAL_STATUS_PROPOSED: i16 = 1;

/// Block proposal status: missed.
pub const PROPOSAL_STATUS_MISSED: i16 = 2;

/// Block proposal status: orphaned.
pub const PROPOSAL_STATUS_ORPHANED: i16 = 3;

/// A block proposal outcome joined with its execution-layer reward.
///
/// `reward_gwei` is the larger of the indexed producer reward and the
/// winning MEV relay bid; zero when the execution block is not indexed yet.
#[derive(Debug, Clone, FromRow)]
pub struct ProposalWithReward {
    pub slot: i64,
    pub epoch: i64,
    pub proposer_index: i64,
    pub status: i16,
    pub exec_block_number: Option<i64>,
    pub reward_gwei: i64,
}

/// A row from the `withdrawals` table.
#[derive(Debug, Clone, FromRow)]
pub struct WithdrawalRow {
    pub withdrawal_index: i64,
    pub slot: i64,
    pub validator_index: i64,
    pub address: String,
    pub amount_gwei: i64,
}

/// A row from the `slashings` table.
#[derive(Debug, Clone, FromRow)]
pub struct SlashingRow {
    pub slot: i64,
    pub epoch: i64,
    pub slasher_index: i64,
    pub slashed_index: i64,
    pub reason: String,
}

/// A row from the `eth_client_releases` table.
#[derive(Debug, Clone, FromRow)]
pub struct ClientReleaseRow {
    pub id: DbId,
    pub client: String,
    pub version: String,
    pub released_at: Timestamp,
}
