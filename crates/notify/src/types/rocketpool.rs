//! Rocket Pool notification variants.

use super::{NotificationBody, NotificationFormat, NotificationMetadata};

/// The network commission rate crossed the subscriber's threshold.
#[derive(Debug, Clone)]
pub struct RocketpoolCommissionNotification {
    pub meta: NotificationMetadata,
    /// Current commission rate as a fraction.
    pub commission: f64,
}

impl NotificationBody for RocketpoolCommissionNotification {
    fn metadata(&self) -> &NotificationMetadata {
        &self.meta
    }

    fn title(&self) -> String {
        "Rocket Pool Commission".to_string()
    }

    fn info(&self, _format: NotificationFormat) -> String {
        format!(
            "The current Rocket Pool commission rate of {:.1}% crossed your threshold",
            self.commission * 100.0
        )
    }
}

/// A new RPL reward claim round started.
#[derive(Debug, Clone)]
pub struct RocketpoolClaimRoundNotification {
    pub meta: NotificationMetadata,
    pub round_index: i64,
}

impl NotificationBody for RocketpoolClaimRoundNotification {
    fn metadata(&self) -> &NotificationMetadata {
        &self.meta
    }

    fn title(&self) -> String {
        "Rocket Pool Claim Round".to_string()
    }

    fn info(&self, _format: NotificationFormat) -> String {
        format!(
            "A new Rocket Pool RPL claim round ({}) is available",
            self.round_index
        )
    }
}

/// Which collateral bound was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollateralBound {
    Min,
    Max,
}

/// A node's RPL collateral reached its minimum or maximum bound.
#[derive(Debug, Clone)]
pub struct RocketpoolCollateralNotification {
    pub meta: NotificationMetadata,
    pub node_address: String,
    pub rpl_stake: f64,
    pub bound: CollateralBound,
}

impl NotificationBody for RocketpoolCollateralNotification {
    fn metadata(&self) -> &NotificationMetadata {
        &self.meta
    }

    fn title(&self) -> String {
        match self.bound {
            CollateralBound::Min => "Rocket Pool Min Collateral".to_string(),
            CollateralBound::Max => "Rocket Pool Max Collateral".to_string(),
        }
    }

    fn info(&self, _format: NotificationFormat) -> String {
        match self.bound {
            CollateralBound::Min => format!(
                "Your Rocket Pool node {} dropped to its minimum RPL collateral ({:.0} RPL staked)",
                self.node_address, self.rpl_stake
            ),
            CollateralBound::Max => format!(
                "Your Rocket Pool node {} reached its maximum RPL collateral ({:.0} RPL staked)",
                self.node_address, self.rpl_stake
            ),
        }
    }
}
