//! Canonical event-name registry.
//!
//! Every subscribable event has exactly one wire name, stored verbatim in
//! the `subscriptions.event_name` column and in webhook `event_names`
//! arrays. [`EventName`] is the typed form; conversions to and from the
//! wire string are total in one direction and checked in the other.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A subscribable notification event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    /// A watched validator proposed a block.
    ValidatorProposalSubmitted,
    /// A watched validator missed a block proposal.
    ValidatorProposalMissed,
    /// A watched validator missed an attestation.
    ValidatorAttestationMissed,
    /// A watched validator stopped (or resumed) attesting. Back-online
    /// notifications are delivered to the same subscription.
    ValidatorIsOffline,
    /// A watched validator was slashed.
    ValidatorGotSlashed,
    /// A watched validator received a withdrawal.
    ValidatorReceivedWithdrawal,
    /// A watched validator joins a sync committee in the next period.
    ValidatorSynccommitteeSoon,
    /// A new Ethereum client release was published.
    EthClientUpdate,
    /// A monitored machine stopped reporting metrics.
    MonitoringMachineOffline,
    /// A monitored machine's disk is almost full.
    MonitoringMachineDiskAlmostFull,
    /// A monitored machine's CPU load is too high.
    MonitoringMachineCpuLoad,
    /// A monitored machine's memory usage is too high.
    MonitoringMachineMemoryUsage,
    /// The monthly tax report is ready.
    UserTaxReport,
    /// Network finality is delayed beyond the liveness threshold.
    NetworkLivenessIncreased,
    /// A Rocket Pool minipool commission rate crossed the threshold.
    RocketpoolCommissionThreshold,
    /// A new Rocket Pool RPL claim round started.
    RocketpoolNewClaimround,
    /// A Rocket Pool node's RPL collateral fell to the minimum.
    RocketpoolCollateralMinReached,
    /// A Rocket Pool node's RPL collateral reached the maximum.
    RocketpoolCollateralMaxReached,
}

impl EventName {
    /// All known events, in registry order.
    pub const ALL: [EventName; 18] = [
        EventName::ValidatorProposalSubmitted,
        EventName::ValidatorProposalMissed,
        EventName::ValidatorAttestationMissed,
        EventName::ValidatorIsOffline,
        EventName::ValidatorGotSlashed,
        EventName::ValidatorReceivedWithdrawal,
        EventName::ValidatorSynccommitteeSoon,
        EventName::EthClientUpdate,
        EventName::MonitoringMachineOffline,
        EventName::MonitoringMachineDiskAlmostFull,
        EventName::MonitoringMachineCpuLoad,
        EventName::MonitoringMachineMemoryUsage,
        EventName::UserTaxReport,
        EventName::NetworkLivenessIncreased,
        EventName::RocketpoolCommissionThreshold,
        EventName::RocketpoolNewClaimround,
        EventName::RocketpoolCollateralMinReached,
        EventName::RocketpoolCollateralMaxReached,
    ];

    /// The canonical wire name, as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::ValidatorProposalSubmitted => "validator_proposal_submitted",
            EventName::ValidatorProposalMissed => "validator_proposal_missed",
            EventName::ValidatorAttestationMissed => "validator_attestation_missed",
            EventName::ValidatorIsOffline => "validator_is_offline",
            EventName::ValidatorGotSlashed => "validator_got_slashed",
            EventName::ValidatorReceivedWithdrawal => "validator_received_withdrawal",
            EventName::ValidatorSynccommitteeSoon => "validator_synccommittee_soon",
            EventName::EthClientUpdate => "eth_client_update",
            EventName::MonitoringMachineOffline => "monitoring_machine_offline",
            EventName::MonitoringMachineDiskAlmostFull => "monitoring_machine_disk_almost_full",
            EventName::MonitoringMachineCpuLoad => "monitoring_machine_cpu_load",
            EventName::MonitoringMachineMemoryUsage => "monitoring_machine_memory_usage",
            EventName::UserTaxReport => "user_tax_report",
            EventName::NetworkLivenessIncreased => "network_liveness_increased",
            EventName::RocketpoolCommissionThreshold => "rocketpool_commission_threshold",
            EventName::RocketpoolNewClaimround => "rocketpool_new_claimround",
            EventName::RocketpoolCollateralMinReached => "rocketpool_collateral_min_reached",
            EventName::RocketpoolCollateralMaxReached => "rocketpool_collateral_max_reached",
        }
    }

    /// Short human-readable label used in email subjects and digest lines.
    pub fn label(&self) -> &'static str {
        match self {
            EventName::ValidatorProposalSubmitted => "Block Proposal",
            EventName::ValidatorProposalMissed => "Missed Block Proposal",
            EventName::ValidatorAttestationMissed => "Missed Attestation",
            EventName::ValidatorIsOffline => "Validator Offline",
            EventName::ValidatorGotSlashed => "Validator Slashed",
            EventName::ValidatorReceivedWithdrawal => "Withdrawal Received",
            EventName::ValidatorSynccommitteeSoon => "Sync Committee Duty",
            EventName::EthClientUpdate => "Client Update",
            EventName::MonitoringMachineOffline => "Machine Offline",
            EventName::MonitoringMachineDiskAlmostFull => "Machine Disk Almost Full",
            EventName::MonitoringMachineCpuLoad => "Machine CPU Load",
            EventName::MonitoringMachineMemoryUsage => "Machine Memory Usage",
            EventName::UserTaxReport => "Tax Report",
            EventName::NetworkLivenessIncreased => "Finality Delayed",
            EventName::RocketpoolCommissionThreshold => "Rocket Pool Commission",
            EventName::RocketpoolNewClaimround => "Rocket Pool Claim Round",
            EventName::RocketpoolCollateralMinReached => "Rocket Pool Min Collateral",
            EventName::RocketpoolCollateralMaxReached => "Rocket Pool Max Collateral",
        }
    }

    /// Whether this event is keyed by a machine name rather than a
    /// validator public key.
    pub fn is_machine_event(&self) -> bool {
        matches!(
            self,
            EventName::MonitoringMachineOffline
                | EventName::MonitoringMachineDiskAlmostFull
                | EventName::MonitoringMachineCpuLoad
                | EventName::MonitoringMachineMemoryUsage
        )
    }

    /// Whether this event is a Rocket Pool event (filter is a node address
    /// or minipool pubkey).
    pub fn is_rocketpool_event(&self) -> bool {
        matches!(
            self,
            EventName::RocketpoolCommissionThreshold
                | EventName::RocketpoolNewClaimround
                | EventName::RocketpoolCollateralMinReached
                | EventName::RocketpoolCollateralMaxReached
        )
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown event name.
#[derive(Debug, thiserror::Error)]
#[error("Unknown event name: {0}")]
pub struct UnknownEventName(pub String);

impl FromStr for EventName {
    type Err = UnknownEventName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventName::ALL
            .iter()
            .find(|e| e.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownEventName(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
