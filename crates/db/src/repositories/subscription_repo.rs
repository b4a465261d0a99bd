//! Repository for the `subscriptions` table.

use sqlx::{PgExecutor, PgPool};

use chainpulse_core::types::{DbId, Timestamp};

use crate::models::subscription::Subscription;

/// Column list for `subscriptions` queries.
const COLUMNS: &str = "\
    id, user_id, event_name, event_filter, dashboard_id, group_id, \
    event_threshold, created_ts, created_epoch, last_sent_ts, \
    last_sent_epoch, internal_state";

/// Provides subscription lookups and the post-queue last-sent update.
pub struct SubscriptionRepo;

impl SubscriptionRepo {
    /// All subscriptions for one event type.
    pub async fn list_for_event(
        pool: &PgPool,
        event_name: &str,
    ) -> Result<Vec<Subscription>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM subscriptions WHERE event_name = $1 ORDER BY id"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(event_name)
            .fetch_all(pool)
            .await
    }

    /// Subscriptions for one event type restricted to a filter list.
    ///
    /// Used when the fact set is already known (e.g. only validators that
    /// actually missed an attestation) to avoid loading every subscriber.
    pub async fn list_for_event_filtered(
        pool: &PgPool,
        event_name: &str,
        filters: &[String],
    ) -> Result<Vec<Subscription>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM subscriptions \
             WHERE event_name = $1 AND event_filter = ANY($2) \
             ORDER BY id"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(event_name)
            .bind(filters)
            .fetch_all(pool)
            .await
    }

    /// Advance the last-sent state for the given subscriptions.
    ///
    /// Runs on the queuing transaction; "sent" here means "durably
    /// queued", not "delivered".
    pub async fn update_last_sent<'e, E>(
        executor: E,
        subscription_ids: &[DbId],
        ts: Timestamp,
        epoch: i64,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        if subscription_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE subscriptions \
             SET last_sent_ts = $2, last_sent_epoch = $3 \
             WHERE id = ANY($1)",
        )
        .bind(subscription_ids)
        .bind(ts)
        .bind(epoch)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
