//! Repository for the `epochs` and `epochs_notified` tables.

use sqlx::{PgExecutor, PgPool};

/// Provides the epoch-ledger queries that gate every collection pass.
pub struct EpochRepo;

impl EpochRepo {
    /// The most recent finalized epoch, if any epoch is finalized yet.
    pub async fn latest_finalized_epoch(pool: &PgPool) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT MAX(epoch) FROM epochs WHERE finalized")
            .fetch_one(pool)
            .await
    }

    /// The most recent epoch the indexer has written at all, finalized or
    /// not. Used to compute the network finality delay.
    pub async fn latest_epoch(pool: &PgPool) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT MAX(epoch) FROM epochs")
            .fetch_one(pool)
            .await
    }

    /// The most recent epochs in the ledger, newest first, up to `limit`
    /// rows. The caller checks contiguity over this window.
    pub async fn recent_epochs(pool: &PgPool, limit: i64) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT epoch FROM epochs ORDER BY epoch DESC LIMIT $1")
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// The highest epoch already collected, if any.
    pub async fn last_notified_epoch(pool: &PgPool) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT MAX(epoch) FROM epochs_notified")
            .fetch_one(pool)
            .await
    }

    /// Wall-clock timestamp of an epoch, if the indexer has written it.
    pub async fn epoch_timestamp(
        pool: &PgPool,
        epoch: i64,
    ) -> Result<Option<chrono::DateTime<chrono::Utc>>, sqlx::Error> {
        sqlx::query_scalar("SELECT ts FROM epochs WHERE epoch = $1")
            .bind(epoch)
            .fetch_optional(pool)
            .await
    }

    /// Append the collected-epoch marker.
    ///
    /// Plain insert with no dedup: a second call for the same epoch fails
    /// on the primary key, which is exactly the duplicate-collection guard.
    /// Runs on the queuing transaction so marker and queue rows commit
    /// atomically.
    pub async fn mark_epoch_notified<'e, E>(executor: E, epoch: i64) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("INSERT INTO epochs_notified (epoch) VALUES ($1)")
            .bind(epoch)
            .execute(executor)
            .await?;
        Ok(())
    }
}
