//! Database access layer for the chainpulse notification engine.
//!
//! Provides the connection pool, migrations, the repository layer over the
//! chain-fact and notification tables, and the session-scoped advisory-lock
//! helper used to guarantee a single sender instance cluster-wide.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};

pub mod metrics;
pub mod models;
pub mod repositories;

/// Shared alias so call sites do not need to name the sqlx types.
pub type DbPool = PgPool;

/// Default maximum number of pooled connections.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Create a connection pool for the given database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(DEFAULT_MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// Verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

// ---------------------------------------------------------------------------
// Advisory lock
// ---------------------------------------------------------------------------

/// A held Postgres session-scoped advisory lock.
///
/// The lock lives on a dedicated pooled connection; dropping the guard
/// without calling [`release`](AdvisoryLock::release) returns the connection
/// to the pool, where Postgres releases the session lock when the connection
/// is eventually closed or reset. Callers should release explicitly so the
/// lock is available to other instances immediately.
pub struct AdvisoryLock {
    conn: sqlx::pool::PoolConnection<Postgres>,
    key: i64,
}

impl AdvisoryLock {
    /// Try to take the advisory lock identified by `key`.
    ///
    /// Returns `None` when another session holds the lock.
    pub async fn try_acquire(pool: &DbPool, key: i64) -> Result<Option<Self>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(key)
            .fetch_one(&mut *conn)
            .await?;
        if acquired {
            Ok(Some(Self { conn, key }))
        } else {
            Ok(None)
        }
    }

    /// Release the lock and return the connection to the pool.
    pub async fn release(mut self) -> Result<(), sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
            .bind(self.key)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(())
    }
}
