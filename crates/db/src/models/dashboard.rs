//! Validator dashboard configuration models.

use std::collections::HashMap;

use sqlx::FromRow;

use chainpulse_core::types::DbId;

/// One flattened `(dashboard, group, validator)` membership row.
#[derive(Debug, Clone, FromRow)]
pub struct DashboardValidatorRow {
    pub dashboard_id: DbId,
    pub dashboard_name: String,
    pub user_id: DbId,
    pub group_id: DbId,
    pub group_name: String,
    pub validator_index: i64,
}

/// Immutable per-collection-pass snapshot of dashboard configuration.
///
/// Built once at the start of an epoch pass; a staleness window of one pass
/// is acceptable. Maps validator indices to the dashboard groups watching
/// them, and Rocket Pool node addresses to minipool pubkeys.
#[derive(Debug, Default)]
pub struct ValidatorDashboardConfig {
    /// validator index → memberships.
    memberships: HashMap<i64, Vec<DashboardValidatorRow>>,
    /// minipool pubkey (hex) → node address (hex).
    node_by_pubkey: HashMap<String, String>,
}

impl ValidatorDashboardConfig {
    /// Assemble the snapshot from flattened membership rows and the Rocket
    /// Pool minipool mapping.
    pub fn new(rows: Vec<DashboardValidatorRow>, minipools: Vec<(String, String)>) -> Self {
        let mut memberships: HashMap<i64, Vec<DashboardValidatorRow>> = HashMap::new();
        for row in rows {
            memberships.entry(row.validator_index).or_default().push(row);
        }
        let node_by_pubkey = minipools.into_iter().collect();
        Self {
            memberships,
            node_by_pubkey,
        }
    }

    /// Dashboard groups watching the given validator index.
    pub fn groups_for_validator(&self, validator_index: i64) -> &[DashboardValidatorRow] {
        self.memberships
            .get(&validator_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Rocket Pool node address operating the given minipool pubkey.
    pub fn node_for_pubkey(&self, pubkey: &str) -> Option<&str> {
        self.node_by_pubkey.get(pubkey).map(String::as_str)
    }

    /// Every membership row in the snapshot.
    pub fn iter_rows(&self) -> impl Iterator<Item = &DashboardValidatorRow> {
        self.memberships.values().flatten()
    }
}
