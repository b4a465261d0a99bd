//! Repository for `user_webhooks` delivery bookkeeping.

use sqlx::PgPool;

use chainpulse_core::types::{DbId, Timestamp};

/// Persists per-target retry state after every delivery attempt.
pub struct WebhookRepo;

impl WebhookRepo {
    /// Record a successful delivery: retries reset, last-sent stamped.
    pub async fn record_success(
        pool: &PgPool,
        webhook_id: DbId,
        ts: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE user_webhooks \
             SET retries = 0, last_sent = $2, last_request = NULL, last_response = NULL \
             WHERE id = $1",
        )
        .bind(webhook_id)
        .bind(ts)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record a failed delivery: retries incremented (saturating in
    /// practice; the sender stops using targets past the limit), and the
    /// request/response pair kept for diagnostics.
    pub async fn record_failure(
        pool: &PgPool,
        webhook_id: DbId,
        request: &serde_json::Value,
        response: Option<&serde_json::Value>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE user_webhooks \
             SET retries = retries + 1, last_request = $2, last_response = $3 \
             WHERE id = $1",
        )
        .bind(webhook_id)
        .bind(request)
        .bind(response)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Overwrite the retry counter (Discord dispatch tracks it locally
    /// across a batch and persists the final value once).
    pub async fn set_retries(
        pool: &PgPool,
        webhook_id: DbId,
        retries: i32,
        last_sent: Option<Timestamp>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE user_webhooks \
             SET retries = $2, last_sent = COALESCE($3, last_sent) \
             WHERE id = $1",
        )
        .bind(webhook_id)
        .bind(retries)
        .bind(last_sent)
        .execute(pool)
        .await?;
        Ok(())
    }
}
