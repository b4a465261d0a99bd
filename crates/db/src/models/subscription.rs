//! Subscription entity model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use chainpulse_core::types::{DbId, Timestamp};

/// A row from the `subscriptions` table.
///
/// Created by the dashboard/API layer; this pipeline only reads rows and
/// advances `last_sent_ts` / `last_sent_epoch` after a successful queue.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subscription {
    pub id: DbId,
    pub user_id: DbId,
    pub event_name: String,
    /// Event-specific join key: hex validator pubkey, machine name, or a
    /// dashboard-scoped composite key. Empty for network-wide events.
    pub event_filter: String,
    pub dashboard_id: Option<DbId>,
    pub group_id: Option<DbId>,
    /// Event-specific numeric threshold (machine alerts, Rocket Pool
    /// collateral). Zero when unused.
    pub event_threshold: f64,
    pub created_ts: Timestamp,
    pub created_epoch: i64,
    pub last_sent_ts: Option<Timestamp>,
    pub last_sent_epoch: Option<i64>,
    pub internal_state: Option<String>,
}

impl Subscription {
    /// The at-most-once-per-epoch-per-subscription guard.
    ///
    /// A notification for `epoch` is suppressed when the subscription has
    /// already fired at or past that epoch, or did not yet exist at it.
    pub fn should_suppress_for_epoch(&self, epoch: u64) -> bool {
        let epoch = epoch as i64;
        if epoch < self.created_epoch {
            return true;
        }
        matches!(self.last_sent_epoch, Some(last) if last >= epoch)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(created_epoch: i64, last_sent_epoch: Option<i64>) -> Subscription {
        Subscription {
            id: 1,
            user_id: 1,
            event_name: "validator_attestation_missed".to_string(),
            event_filter: "0xabc".to_string(),
            dashboard_id: None,
            group_id: None,
            event_threshold: 0.0,
            created_ts: chrono::Utc::now(),
            created_epoch,
            last_sent_ts: None,
            last_sent_epoch,
            internal_state: None,
        }
    }

    #[test]
    fn fires_for_epoch_after_creation() {
        assert!(!sub(100, None).should_suppress_for_epoch(101));
    }

    #[test]
    fn suppressed_before_creation_epoch() {
        assert!(sub(100, None).should_suppress_for_epoch(99));
    }

    #[test]
    fn suppressed_when_already_sent_this_epoch() {
        assert!(sub(100, Some(101)).should_suppress_for_epoch(101));
        assert!(sub(100, Some(105)).should_suppress_for_epoch(101));
    }

    #[test]
    fn fires_again_for_later_epoch() {
        assert!(!sub(100, Some(101)).should_suppress_for_epoch(102));
    }
}
