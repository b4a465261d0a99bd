//! Repository for the `eth_client_releases` table.

use sqlx::PgPool;

use crate::models::chain::ClientReleaseRow;

/// Column list for `eth_client_releases` queries.
const COLUMNS: &str = "id, client, version, released_at";

/// Provides the latest-release-per-client lookup for client-update
/// notifications.
pub struct ClientReleaseRepo;

impl ClientReleaseRepo {
    /// The most recent release of each known client.
    pub async fn latest_releases(pool: &PgPool) -> Result<Vec<ClientReleaseRow>, sqlx::Error> {
        let query = format!(
            "SELECT DISTINCT ON (client) {COLUMNS} \
             FROM eth_client_releases \
             ORDER BY client, released_at DESC"
        );
        sqlx::query_as::<_, ClientReleaseRow>(&query)
            .fetch_all(pool)
            .await
    }
}
