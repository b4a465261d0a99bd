//! Repository for the `notification_queue` table.

use sqlx::{PgExecutor, PgPool};

use chainpulse_core::types::{DbId, Timestamp};

use crate::models::queue::QueuedNotification;

/// Column list for `notification_queue` queries.
const COLUMNS: &str = "id, created, sent, channel, content";

/// How long a sent row is kept before garbage collection.
const SENT_RETENTION_MINUTES: i32 = 30;

/// How long any row is kept, sent or not.
const MAX_AGE_MINUTES: i32 = 60;

/// Provides queue writes for the renderer and dequeue/claim operations for
/// the sender.
pub struct QueueRepo;

impl QueueRepo {
    /// Enqueue one rendered payload for a channel.
    ///
    /// Runs on the queuing transaction so all channels of one collection
    /// pass commit together.
    pub async fn enqueue<'e, E>(
        executor: E,
        channel: &str,
        content: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            "INSERT INTO notification_queue (channel, content) \
             VALUES ($1, $2) RETURNING id",
        )
        .bind(channel)
        .bind(content)
        .fetch_one(executor)
        .await
    }

    /// Unsent rows for a channel, oldest first.
    ///
    /// No row lock is taken; the advisory lock around the dispatch cycle
    /// is what prevents concurrent readers.
    pub async fn unsent_for_channel(
        pool: &PgPool,
        channel: &str,
        limit: i64,
    ) -> Result<Vec<QueuedNotification>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_queue \
             WHERE channel = $1 AND sent IS NULL \
             ORDER BY created ASC LIMIT $2"
        );
        sqlx::query_as::<_, QueuedNotification>(&query)
            .bind(channel)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Stamp rows as sent.
    pub async fn mark_sent(
        pool: &PgPool,
        ids: &[DbId],
        ts: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("UPDATE notification_queue SET sent = $2 WHERE id = ANY($1)")
            .bind(ids)
            .bind(ts)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete rows outright (retry-exhausted webhook payloads).
    pub async fn delete(pool: &PgPool, ids: &[DbId]) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM notification_queue WHERE id = ANY($1)")
            .bind(ids)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Drop rows sent more than 30 minutes ago or created more than an
    /// hour ago, bounding table growth and silently discarding anything
    /// stuck past the hour.
    pub async fn garbage_collect(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM notification_queue \
             WHERE sent < NOW() - make_interval(mins => $1) \
                OR created < NOW() - make_interval(mins => $2)",
        )
        .bind(SENT_RETENTION_MINUTES)
        .bind(MAX_AGE_MINUTES)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
