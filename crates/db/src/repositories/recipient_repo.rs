//! Repository for delivery recipients: emails, push tokens, and webhook
//! targets, honoring per-channel opt-outs.

use std::collections::HashMap;

use sqlx::PgPool;

use chainpulse_core::types::DbId;

use crate::models::user::{UserEmail, UserPushToken};
use crate::models::webhook::WebhookTarget;

/// Column list for `user_webhooks` queries.
const WEBHOOK_COLUMNS: &str =
    "id, user_id, url, retries, last_sent, destination, event_names";

/// Provides recipient lookups for the queuing renderer.
///
/// Every query joins `user_notification_channels` so that a user who
/// disabled a channel never appears in its recipient set, regardless of
/// active subscriptions.
pub struct RecipientRepo;

impl RecipientRepo {
    /// Email addresses for the given users, excluding users who disabled
    /// the email channel.
    pub async fn emails_by_user_ids(
        pool: &PgPool,
        user_ids: &[DbId],
    ) -> Result<HashMap<DbId, String>, sqlx::Error> {
        let rows: Vec<UserEmail> = sqlx::query_as(
            "SELECT u.id AS user_id, u.email FROM users u \
             WHERE u.id = ANY($1) \
               AND NOT EXISTS (\
                   SELECT 1 FROM user_notification_channels c \
                   WHERE c.user_id = u.id AND c.channel = 'email' AND NOT c.active)",
        )
        .bind(user_ids)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|r| (r.user_id, r.email)).collect())
    }

    /// Active device push tokens per user, excluding users who disabled
    /// the push channel.
    pub async fn push_tokens_by_user_ids(
        pool: &PgPool,
        user_ids: &[DbId],
    ) -> Result<HashMap<DbId, Vec<String>>, sqlx::Error> {
        let rows: Vec<UserPushToken> = sqlx::query_as(
            "SELECT d.user_id, d.push_token FROM user_devices d \
             WHERE d.user_id = ANY($1) AND d.active \
               AND NOT EXISTS (\
                   SELECT 1 FROM user_notification_channels c \
                   WHERE c.user_id = d.user_id AND c.channel = 'push' AND NOT c.active)",
        )
        .bind(user_ids)
        .fetch_all(pool)
        .await?;

        let mut by_user: HashMap<DbId, Vec<String>> = HashMap::new();
        for row in rows {
            by_user.entry(row.user_id).or_default().push(row.push_token);
        }
        Ok(by_user)
    }

    /// Webhook targets per user, excluding users who disabled the webhook
    /// channel. Discord and plain targets are returned together; the
    /// renderer splits them by destination.
    pub async fn webhooks_by_user_ids(
        pool: &PgPool,
        user_ids: &[DbId],
    ) -> Result<HashMap<DbId, Vec<WebhookTarget>>, sqlx::Error> {
        let query = format!(
            "SELECT {WEBHOOK_COLUMNS} FROM user_webhooks w \
             WHERE w.user_id = ANY($1) \
               AND NOT EXISTS (\
                   SELECT 1 FROM user_notification_channels c \
                   WHERE c.user_id = w.user_id AND c.channel = 'webhook' AND NOT c.active) \
             ORDER BY w.id"
        );
        let rows: Vec<WebhookTarget> = sqlx::query_as(&query)
            .bind(user_ids)
            .fetch_all(pool)
            .await?;

        let mut by_user: HashMap<DbId, Vec<WebhookTarget>> = HashMap::new();
        for row in rows {
            by_user.entry(row.user_id).or_default().push(row);
        }
        Ok(by_user)
    }
}
