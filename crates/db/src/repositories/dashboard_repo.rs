//! Repository for validator dashboard configuration.

use sqlx::PgPool;

use crate::models::dashboard::{DashboardValidatorRow, ValidatorDashboardConfig};

/// Loads the per-pass dashboard configuration snapshot.
pub struct DashboardRepo;

impl DashboardRepo {
    /// Flattened `(dashboard, group, validator)` membership rows.
    pub async fn validator_memberships(
        pool: &PgPool,
    ) -> Result<Vec<DashboardValidatorRow>, sqlx::Error> {
        sqlx::query_as(
            "SELECT d.dashboard_id, d.name AS dashboard_name, d.user_id, \
                    g.group_id, g.name AS group_name, m.validator_index \
             FROM validator_dashboards d \
             JOIN validator_dashboard_groups g ON g.dashboard_id = d.dashboard_id \
             JOIN validator_dashboard_members m \
               ON m.dashboard_id = g.dashboard_id AND m.group_id = g.group_id",
        )
        .fetch_all(pool)
        .await
    }

    /// Rocket Pool `(minipool pubkey, node address)` mapping.
    pub async fn minipool_mapping(pool: &PgPool) -> Result<Vec<(String, String)>, sqlx::Error> {
        sqlx::query_as("SELECT pubkey, node_address FROM rocketpool_minipools")
            .fetch_all(pool)
            .await
    }

    /// Build the immutable snapshot used for one collection pass.
    pub async fn load_config(pool: &PgPool) -> Result<ValidatorDashboardConfig, sqlx::Error> {
        let rows = Self::validator_memberships(pool).await?;
        let minipools = Self::minipool_mapping(pool).await?;
        Ok(ValidatorDashboardConfig::new(rows, minipools))
    }
}
