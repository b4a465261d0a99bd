//! End-to-end pipeline tests against a real database: collect an epoch,
//! queue the result, and drain the queue with faked delivery seams.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::Mutex;

use chainpulse_db::metrics::NullMetricsStore;
use chainpulse_db::repositories::EpochRepo;
use chainpulse_notify::delivery::{EmailError, EmailTransport};
use chainpulse_notify::queuing::{self, EmailContent, WebhookContent, WebhookEvent};
use chainpulse_notify::{CollectError, NotificationCollector, NotificationSender, NotifyConfig};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_epochs(pool: &PgPool, range: std::ops::RangeInclusive<i64>) {
    for epoch in range {
        sqlx::query("INSERT INTO epochs (epoch, finalized) VALUES ($1, true)")
            .bind(epoch)
            .execute(pool)
            .await
            .unwrap();
    }
}

async fn seed_validators(pool: &PgPool, count: i64) {
    for index in 1..=count {
        sqlx::query("INSERT INTO validators (validator_index, pubkey) VALUES ($1, $2)")
            .bind(index)
            .bind(format!("0xpub{index:02}"))
            .execute(pool)
            .await
            .unwrap();
    }
}

async fn seed_duty(pool: &PgPool, epoch: i64, validator: i64, attested: bool) {
    sqlx::query(
        "INSERT INTO attestation_duties (epoch, validator_index, attested) VALUES ($1, $2, $3)",
    )
    .bind(epoch)
    .bind(validator)
    .bind(attested)
    .execute(pool)
    .await
    .unwrap();
}

async fn seed_user(pool: &PgPool, email: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO users (email) VALUES ($1) RETURNING id")
        .bind(email)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn seed_subscription(
    pool: &PgPool,
    user_id: i64,
    event_name: &str,
    event_filter: &str,
    created_epoch: i64,
) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO subscriptions (user_id, event_name, event_filter, created_epoch) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(user_id)
    .bind(event_name)
    .bind(event_filter)
    .bind(created_epoch)
    .fetch_one(pool)
    .await
    .unwrap()
}

fn collector(pool: &PgPool, config: NotifyConfig) -> NotificationCollector {
    NotificationCollector::new(pool.clone(), config, Arc::new(NullMetricsStore))
}

/// Healthy participation for every validator across a window, except the
/// given `(epoch, validator)` misses.
async fn seed_participation(
    pool: &PgPool,
    epochs: std::ops::RangeInclusive<i64>,
    validators: i64,
    misses: &[(i64, i64)],
) {
    for epoch in epochs {
        for validator in 1..=validators {
            let attested = !misses.contains(&(epoch, validator));
            seed_duty(pool, epoch, validator, attested).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// The end-to-end scenario: a subscription created at epoch 100 for a
/// missed attestation at epoch 101 yields one queued email digest and the
/// subscription's cooldown is advanced to 101.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_missed_attestation_collects_and_queues(pool: PgPool) {
    seed_epochs(&pool, 95..=101).await;
    seed_validators(&pool, 10).await;
    seed_participation(&pool, 98..=101, 10, &[(101, 1)]).await;

    let user = seed_user(&pool, "watcher@example.com").await;
    let sub_id =
        seed_subscription(&pool, user, "validator_attestation_missed", "0xpub01", 100).await;

    let mut collector = collector(&pool, NotifyConfig::default());
    let acc = collector.collect(101).await.unwrap();
    assert_eq!(acc.total(), 1);
    assert_eq!(acc.user_ids(), vec![user]);

    queuing::queue_notifications(&pool, &acc, 101).await.unwrap();

    // One email row, addressed to the user, naming the event.
    let rows: Vec<(String, serde_json::Value)> =
        sqlx::query_as("SELECT channel, content FROM notification_queue")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "email");
    let content: EmailContent = serde_json::from_value(rows[0].1.clone()).unwrap();
    assert_eq!(content.to, "watcher@example.com");
    assert!(content.subject.contains("Missed Attestation"));
    assert!(content.body_html.contains("epoch 101"));

    // Cooldown advanced and the epoch marker written, atomically.
    let last_sent: Option<i64> =
        sqlx::query_scalar("SELECT last_sent_epoch FROM subscriptions WHERE id = $1")
            .bind(sub_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(last_sent, Some(101));
    assert_eq!(EpochRepo::last_notified_epoch(&pool).await.unwrap(), Some(101));

    // Re-queuing the same epoch trips the duplicate guard.
    let err = queuing::queue_notifications(&pool, &acc, 101).await.unwrap_err();
    assert_matches!(err, CollectError::Store(_));
}

/// Offline detection: attested at epoch-3, missed since, exactly one
/// notification with the latest state pinned to the first missed epoch.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_offline_validator_detected_once(pool: PgPool) {
    seed_epochs(&pool, 95..=101).await;
    seed_validators(&pool, 10).await;
    seed_participation(&pool, 98..=101, 10, &[(99, 1), (100, 1), (101, 1)]).await;

    let user = seed_user(&pool, "watcher@example.com").await;
    seed_subscription(&pool, user, "validator_is_offline", "0xpub01", 90).await;

    let mut collector = collector(&pool, NotifyConfig::default());
    let acc = collector.collect(101).await.unwrap();
    assert_eq!(acc.total(), 1);

    queuing::queue_notifications(&pool, &acc, 101).await.unwrap();
    let content: serde_json::Value =
        sqlx::query_scalar("SELECT content FROM notification_queue WHERE channel = 'email'")
            .fetch_one(&pool)
            .await
            .unwrap();
    let email: EmailContent = serde_json::from_value(content).unwrap();
    // Offline is reported as of epoch-2, the first epoch without an
    // attestation.
    assert!(email.body_html.contains("stopped attesting in epoch 99"));
}

/// Back-online detection is the inverse pattern, on the same subscription.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_online_validator_detected(pool: PgPool) {
    seed_epochs(&pool, 95..=101).await;
    seed_validators(&pool, 10).await;
    seed_participation(&pool, 98..=101, 10, &[(98, 1), (99, 1), (100, 1)]).await;

    let user = seed_user(&pool, "watcher@example.com").await;
    seed_subscription(&pool, user, "validator_is_offline", "0xpub01", 90).await;

    let mut collector = collector(&pool, NotifyConfig::default());
    let acc = collector.collect(101).await.unwrap();
    assert_eq!(acc.total(), 1);
}

/// A mass offline transition is data corruption, not an outage: the pass
/// fails and nothing is emitted.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_mass_offline_trips_circuit_breaker(pool: PgPool) {
    seed_epochs(&pool, 95..=101).await;
    seed_validators(&pool, 10).await;
    // Validators 1 and 2 both go offline; participation stays at 80%.
    seed_participation(
        &pool,
        98..=101,
        10,
        &[(99, 1), (100, 1), (101, 1), (99, 2), (100, 2), (101, 2)],
    )
    .await;

    let user = seed_user(&pool, "watcher@example.com").await;
    seed_subscription(&pool, user, "validator_is_offline", "0xpub01", 90).await;

    let config = NotifyConfig {
        offline_breaker_limit: 1,
        ..NotifyConfig::default()
    };
    let mut collector = collector(&pool, config);
    let err = collector.collect(101).await.unwrap_err();
    assert_matches!(err, CollectError::CircuitBreaker { count: 2, limit: 1, .. });
}

/// Missing attestation data for the four-epoch window aborts the pass
/// instead of emitting possibly-false offline notifications.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_incomplete_window_is_a_consistency_error(pool: PgPool) {
    seed_epochs(&pool, 95..=101).await;
    seed_validators(&pool, 10).await;
    // Only the newest two epochs have data.
    seed_participation(&pool, 100..=101, 10, &[]).await;

    let mut collector = collector(&pool, NotifyConfig::default());
    let err = collector.collect(101).await.unwrap_err();
    assert_matches!(err, CollectError::Consistency(_));
}

/// A gap at the head of the epoch ledger blocks collection entirely.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_epoch_gap_is_a_consistency_error(pool: PgPool) {
    seed_epochs(&pool, 95..=99).await;
    seed_epochs(&pool, 101..=101).await;

    let mut collector = collector(&pool, NotifyConfig::default());
    let err = collector.collect(101).await.unwrap_err();
    assert_matches!(err, CollectError::Consistency(_));
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

struct RecordingMailer {
    sent: Mutex<Vec<EmailContent>>,
    rate_limit_after: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl EmailTransport for RecordingMailer {
    async fn send(&self, email: &EmailContent) -> Result<(), EmailError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.rate_limit_after {
            return Err(EmailError::RateLimited);
        }
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}

fn queued_email(user_id: i64, to: &str) -> serde_json::Value {
    serde_json::to_value(EmailContent {
        user_id,
        to: to.to_string(),
        subject: "[Chainpulse] Missed Attestation".to_string(),
        body_html: "<p>1 &times; Missed Attestation</p>".to_string(),
        attachments: vec![],
    })
    .unwrap()
}

/// Email rows are marked sent even when the transport rate-limits them:
/// at-most-once, no re-queue.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_email_rows_marked_sent_even_when_rate_limited(pool: PgPool) {
    for i in 0..3 {
        sqlx::query("INSERT INTO notification_queue (channel, content) VALUES ('email', $1)")
            .bind(queued_email(i, &format!("u{i}@example.com")))
            .execute(&pool)
            .await
            .unwrap();
    }

    let mailer = Arc::new(RecordingMailer {
        sent: Mutex::new(Vec::new()),
        rate_limit_after: 2,
        calls: AtomicUsize::new(0),
    });
    let sender = NotificationSender::new(
        pool.clone(),
        NotifyConfig::default(),
        Some(mailer.clone()),
        None,
    );
    sender.dispatch_once().await.unwrap();

    assert_eq!(mailer.sent.lock().await.len(), 2);
    let unsent: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM notification_queue WHERE sent IS NULL")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(unsent.0, 0);
}

/// A webhook target past the retry limit has its queued row deleted
/// without any HTTP attempt, while the target row stays configured.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_exhausted_webhook_row_is_purged(pool: PgPool) {
    let user = seed_user(&pool, "hooked@example.com").await;
    let webhook_id: i64 = sqlx::query_scalar(
        "INSERT INTO user_webhooks (user_id, url, retries, destination, event_names) \
         VALUES ($1, 'http://127.0.0.1:1/unreachable', 6, 'webhook', \
                 ARRAY['validator_attestation_missed']) \
         RETURNING id",
    )
    .bind(user)
    .fetch_one(&pool)
    .await
    .unwrap();

    let target: chainpulse_db::models::webhook::WebhookTarget = sqlx::query_as(
        "SELECT id, user_id, url, retries, last_sent, destination, event_names \
         FROM user_webhooks WHERE id = $1",
    )
    .bind(webhook_id)
    .fetch_one(&pool)
    .await
    .unwrap();

    let content = WebhookContent {
        target,
        event: WebhookEvent {
            event: "validator_attestation_missed".to_string(),
            epoch: 101,
            title: "Attestation Missed".to_string(),
            description: "validator 1 missed an attestation in epoch 101".to_string(),
            target_filter: "0xpub01".to_string(),
        },
    };
    sqlx::query("INSERT INTO notification_queue (channel, content) VALUES ('webhook', $1)")
        .bind(serde_json::to_value(&content).unwrap())
        .execute(&pool)
        .await
        .unwrap();

    let sender = NotificationSender::new(pool.clone(), NotifyConfig::default(), None, None);
    sender.dispatch_once().await.unwrap();

    let remaining: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notification_queue")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining.0, 0, "exhausted row should be deleted");

    // The target configuration is untouched.
    let retries: i32 = sqlx::query_scalar("SELECT retries FROM user_webhooks WHERE id = $1")
        .bind(webhook_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(retries, 6);
}
