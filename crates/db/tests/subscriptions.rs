//! Integration tests for the subscription and recipient repositories:
//! filter-indexed lookups, last-sent monotonicity, and channel opt-outs.

use chrono::Utc;
use sqlx::PgPool;

use chainpulse_db::repositories::{RecipientRepo, SubscriptionRepo};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn new_user(pool: &PgPool, email: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO users (email) VALUES ($1) RETURNING id")
        .bind(email)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn new_subscription(
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

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_filtered_lookup_only_returns_matching_filters(pool: PgPool) {
    let user = new_user(&pool, "a@example.com").await;
    new_subscription(&pool, user, "validator_attestation_missed", "0xaa", 100).await;
    new_subscription(&pool, user, "validator_attestation_missed", "0xbb", 100).await;
    new_subscription(&pool, user, "validator_got_slashed", "0xaa", 100).await;

    let subs = SubscriptionRepo::list_for_event_filtered(
        &pool,
        "validator_attestation_missed",
        &["0xaa".to_string()],
    )
    .await
    .unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].event_filter, "0xaa");
    assert_eq!(subs[0].event_name, "validator_attestation_missed");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_update_last_sent_advances_cooldown_state(pool: PgPool) {
    let user = new_user(&pool, "a@example.com").await;
    let sub_id =
        new_subscription(&pool, user, "validator_attestation_missed", "0xaa", 100).await;

    let updated = SubscriptionRepo::update_last_sent(&pool, &[sub_id], Utc::now(), 101)
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let subs = SubscriptionRepo::list_for_event(&pool, "validator_attestation_missed")
        .await
        .unwrap();
    assert_eq!(subs[0].last_sent_epoch, Some(101));
    assert!(subs[0].last_sent_ts.is_some());
    // The cooldown now suppresses the epoch just sent.
    assert!(subs[0].should_suppress_for_epoch(101));
    assert!(!subs[0].should_suppress_for_epoch(102));
}

// ---------------------------------------------------------------------------
// Recipients
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_disabled_email_channel_excludes_user(pool: PgPool) {
    let subscribed = new_user(&pool, "on@example.com").await;
    let opted_out = new_user(&pool, "off@example.com").await;
    sqlx::query(
        "INSERT INTO user_notification_channels (user_id, channel, active) \
         VALUES ($1, 'email', false)",
    )
    .bind(opted_out)
    .execute(&pool)
    .await
    .unwrap();

    let emails = RecipientRepo::emails_by_user_ids(&pool, &[subscribed, opted_out])
        .await
        .unwrap();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[&subscribed], "on@example.com");
    assert!(!emails.contains_key(&opted_out));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_push_tokens_exclude_inactive_devices(pool: PgPool) {
    let user = new_user(&pool, "a@example.com").await;
    for (token, active) in [("tok-live", true), ("tok-stale", false)] {
        sqlx::query(
            "INSERT INTO user_devices (user_id, push_token, active) VALUES ($1, $2, $3)",
        )
        .bind(user)
        .bind(token)
        .bind(active)
        .execute(&pool)
        .await
        .unwrap();
    }

    let tokens = RecipientRepo::push_tokens_by_user_ids(&pool, &[user])
        .await
        .unwrap();
    assert_eq!(tokens[&user], vec!["tok-live".to_string()]);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_webhooks_grouped_by_user(pool: PgPool) {
    let user = new_user(&pool, "a@example.com").await;
    sqlx::query(
        "INSERT INTO user_webhooks (user_id, url, destination, event_names) \
         VALUES ($1, 'https://example.com/hook', 'webhook', \
                 ARRAY['validator_attestation_missed'])",
    )
    .bind(user)
    .execute(&pool)
    .await
    .unwrap();

    let webhooks = RecipientRepo::webhooks_by_user_ids(&pool, &[user]).await.unwrap();
    let target = &webhooks[&user][0];
    assert!(target.wants_event("validator_attestation_missed"));
    assert!(!target.wants_event("validator_got_slashed"));
    assert!(!target.is_discord());
    assert_eq!(target.retries, 0);
}
