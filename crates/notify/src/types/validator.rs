//! Validator event notification variants.

use chainpulse_db::models::chain::{PROPOSAL_STATUS_MISSED, PROPOSAL_STATUS_PROPOSED};

use super::{format_gwei, validator_ref, NotificationBody, NotificationFormat, NotificationMetadata};

/// Block proposal outcome (submitted, missed, or orphaned).
#[derive(Debug, Clone)]
pub struct ProposalNotification {
    pub meta: NotificationMetadata,
    pub validator_index: i64,
    pub slot: i64,
    pub status: i16,
    /// Execution-layer reward in gwei; zero when the block is missed or
    /// the execution block is not indexed.
    pub reward_gwei: i64,
}

impl NotificationBody for ProposalNotification {
    fn metadata(&self) -> &NotificationMetadata {
        &self.meta
    }

    fn title(&self) -> String {
        match self.status {
            PROPOSAL_STATUS_PROPOSED => "Block Proposed".to_string(),
            PROPOSAL_STATUS_MISSED => "Block Proposal Missed".to_string(),
            _ => "Block Proposal Orphaned".to_string(),
        }
    }

    fn info(&self, format: NotificationFormat) -> String {
        let who = validator_ref(format, self.validator_index);
        match self.status {
            PROPOSAL_STATUS_PROPOSED => format!(
                "New block proposed by {who} in slot {} with a {} execution reward",
                self.slot,
                format_gwei(self.reward_gwei)
            ),
            PROPOSAL_STATUS_MISSED => {
                format!("{who} missed the block proposal in slot {}", self.slot)
            }
            _ => format!(
                "The block proposed by {who} in slot {} was orphaned",
                self.slot
            ),
        }
    }
}

/// Missed attestation.
#[derive(Debug, Clone)]
pub struct AttestationMissedNotification {
    pub meta: NotificationMetadata,
    pub validator_index: i64,
}

impl NotificationBody for AttestationMissedNotification {
    fn metadata(&self) -> &NotificationMetadata {
        &self.meta
    }

    fn title(&self) -> String {
        "Attestation Missed".to_string()
    }

    fn info(&self, format: NotificationFormat) -> String {
        format!(
            "{} missed an attestation in epoch {}",
            validator_ref(format, self.validator_index),
            self.meta.epoch
        )
    }
}

/// Offline/online state change. Back-online notifications are delivered to
/// the same `validator_is_offline` subscription.
#[derive(Debug, Clone)]
pub struct ValidatorLivenessNotification {
    pub meta: NotificationMetadata,
    pub validator_index: i64,
    pub is_offline: bool,
    /// For offline: the first epoch the validator stopped attesting.
    /// For online: the epoch it resumed.
    pub latest_state: u64,
}

impl NotificationBody for ValidatorLivenessNotification {
    fn metadata(&self) -> &NotificationMetadata {
        &self.meta
    }

    fn title(&self) -> String {
        if self.is_offline {
            "Validator Offline".to_string()
        } else {
            "Validator Back Online".to_string()
        }
    }

    fn info(&self, format: NotificationFormat) -> String {
        let who = validator_ref(format, self.validator_index);
        if self.is_offline {
            format!("{who} stopped attesting in epoch {}", self.latest_state)
        } else {
            format!("{who} is back online since epoch {}", self.latest_state)
        }
    }
}

/// Slashing of a watched validator.
#[derive(Debug, Clone)]
pub struct SlashedNotification {
    pub meta: NotificationMetadata,
    pub validator_index: i64,
    pub slasher_index: i64,
    pub reason: String,
    pub slot: i64,
}

impl NotificationBody for SlashedNotification {
    fn metadata(&self) -> &NotificationMetadata {
        &self.meta
    }

    fn title(&self) -> String {
        "Validator Slashed".to_string()
    }

    fn info(&self, format: NotificationFormat) -> String {
        format!(
            "{} was slashed by {} in slot {} ({})",
            validator_ref(format, self.validator_index),
            validator_ref(format, self.slasher_index),
            self.slot,
            self.reason
        )
    }
}

/// A processed withdrawal.
#[derive(Debug, Clone)]
pub struct WithdrawalNotification {
    pub meta: NotificationMetadata,
    pub validator_index: i64,
    pub slot: i64,
    pub address: String,
    pub amount_gwei: i64,
}

impl NotificationBody for WithdrawalNotification {
    fn metadata(&self) -> &NotificationMetadata {
        &self.meta
    }

    fn title(&self) -> String {
        "Withdrawal Processed".to_string()
    }

    fn info(&self, format: NotificationFormat) -> String {
        format!(
            "{} received a withdrawal of {} to {} in slot {}",
            validator_ref(format, self.validator_index),
            format_gwei(self.amount_gwei),
            self.address,
            self.slot
        )
    }
}

/// Upcoming sync-committee assignment.
#[derive(Debug, Clone)]
pub struct SyncCommitteeSoonNotification {
    pub meta: NotificationMetadata,
    pub validator_index: i64,
    pub period: u64,
    pub start_epoch: u64,
}

impl NotificationBody for SyncCommitteeSoonNotification {
    fn metadata(&self) -> &NotificationMetadata {
        &self.meta
    }

    fn title(&self) -> String {
        "Sync Committee Duty Soon".to_string()
    }

    fn info(&self, format: NotificationFormat) -> String {
        format!(
            "{} joins the sync committee of period {} starting at epoch {}",
            validator_ref(format, self.validator_index),
            self.period,
            self.start_epoch
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chainpulse_core::events::EventName;

    use super::*;

    fn meta(event: EventName) -> NotificationMetadata {
        NotificationMetadata {
            subscription_id: 1,
            user_id: 7,
            epoch: 101,
            event_name: event,
            event_filter: "0xabc".to_string(),
            dashboard_id: None,
            dashboard_name: None,
            group_id: None,
            group_name: None,
        }
    }

    #[test]
    fn proposal_titles_follow_status() {
        let mut n = ProposalNotification {
            meta: meta(EventName::ValidatorProposalSubmitted),
            validator_index: 42,
            slot: 3232,
            status: PROPOSAL_STATUS_PROPOSED,
            reward_gwei: 1_500_000_000,
        };
        assert_eq!(n.title(), "Block Proposed");
        assert!(n.info(NotificationFormat::Plain).contains("1.5 ETH"));

        n.status = PROPOSAL_STATUS_MISSED;
        assert_eq!(n.title(), "Block Proposal Missed");
    }

    #[test]
    fn liveness_renders_offline_and_online() {
        let mut n = ValidatorLivenessNotification {
            meta: meta(EventName::ValidatorIsOffline),
            validator_index: 9,
            is_offline: true,
            latest_state: 99,
        };
        assert_eq!(n.title(), "Validator Offline");
        assert!(n.info(NotificationFormat::Plain).contains("epoch 99"));

        n.is_offline = false;
        n.latest_state = 101;
        assert_eq!(n.title(), "Validator Back Online");
        assert!(n.info(NotificationFormat::Markdown).contains("epoch 101"));
    }
}
