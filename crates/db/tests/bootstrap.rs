use sqlx::PgPool;

use chainpulse_db::repositories::{EpochRepo, QueueRepo};

/// Full bootstrap: connect, migrate, verify the pipeline tables exist.
#[sqlx::test(migrations = "./migrations")]
async fn test_full_bootstrap(pool: PgPool) {
    chainpulse_db::health_check(&pool).await.unwrap();

    let tables = [
        "epochs",
        "epochs_notified",
        "attestation_duties",
        "block_proposals",
        "subscriptions",
        "notification_queue",
        "user_webhooks",
    ];
    for table in tables {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("{table} query failed: {e}"));
        assert_eq!(count.0, 0, "{table} should exist and start empty");
    }
}

/// The epoch marker is the duplicate-collection guard: a second insert for
/// the same epoch must fail on the primary key.
#[sqlx::test(migrations = "./migrations")]
async fn test_epoch_marker_is_idempotence_guard(pool: PgPool) {
    EpochRepo::mark_epoch_notified(&pool, 101).await.unwrap();

    let err = EpochRepo::mark_epoch_notified(&pool, 101)
        .await
        .unwrap_err();
    match err {
        sqlx::Error::Database(db_err) => {
            assert!(db_err.is_unique_violation(), "expected unique violation");
        }
        other => panic!("expected database error, got {other:?}"),
    }

    assert_eq!(
        EpochRepo::last_notified_epoch(&pool).await.unwrap(),
        Some(101)
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn test_latest_finalized_ignores_unfinalized_head(pool: PgPool) {
    for (epoch, finalized) in [(100i64, true), (101, true), (102, false)] {
        sqlx::query("INSERT INTO epochs (epoch, finalized) VALUES ($1, $2)")
            .bind(epoch)
            .bind(finalized)
            .execute(&pool)
            .await
            .unwrap();
    }

    assert_eq!(
        EpochRepo::latest_finalized_epoch(&pool).await.unwrap(),
        Some(101)
    );
    assert_eq!(EpochRepo::latest_epoch(&pool).await.unwrap(), Some(102));
    assert_eq!(
        EpochRepo::recent_epochs(&pool, 2).await.unwrap(),
        vec![102, 101]
    );
}

/// Garbage collection drops rows sent more than 30 minutes ago or created
/// more than an hour ago, and keeps everything else.
#[sqlx::test(migrations = "./migrations")]
async fn test_queue_garbage_collection(pool: PgPool) {
    let content = serde_json::json!({"k": "v"});

    // Fresh unsent row: kept.
    QueueRepo::enqueue(&pool, "email", &content).await.unwrap();
    // Sent 45 minutes ago: collected.
    sqlx::query(
        "INSERT INTO notification_queue (created, sent, channel, content) \
         VALUES (NOW() - INTERVAL '50 minutes', NOW() - INTERVAL '45 minutes', 'email', $1)",
    )
    .bind(&content)
    .execute(&pool)
    .await
    .unwrap();
    // Created two hours ago, never sent: collected.
    sqlx::query(
        "INSERT INTO notification_queue (created, channel, content) \
         VALUES (NOW() - INTERVAL '2 hours', 'push', $1)",
    )
    .bind(&content)
    .execute(&pool)
    .await
    .unwrap();

    let collected = QueueRepo::garbage_collect(&pool).await.unwrap();
    assert_eq!(collected, 2);

    let remaining: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notification_queue")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining.0, 1);
}
