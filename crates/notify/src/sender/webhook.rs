//! Plain webhook channel dispatch.
//!
//! One row per (target, notification). A row whose target already
//! exhausted its retries is deleted without an HTTP attempt; otherwise the
//! JSON body is POSTed once, the target's retry counter is persisted, and
//! the row is marked sent either way. Retries therefore come from fresh
//! collection passes re-queuing, not from re-reading the same row.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use chainpulse_core::channels::CHANNEL_WEBHOOK;
use chainpulse_core::types::DbId;
use chainpulse_db::repositories::{QueueRepo, WebhookRepo};
use chainpulse_db::DbPool;

use crate::queuing::WebhookContent;

use super::DEQUEUE_LIMIT;

/// A target whose counter exceeds this is given up on.
pub(super) const WEBHOOK_RETRY_LIMIT: i32 = 5;

pub(super) async fn dispatch(
    pool: &DbPool,
    http: &reqwest::Client,
    concurrency: usize,
) -> Result<(), sqlx::Error> {
    let rows = QueueRepo::unsent_for_channel(pool, CHANNEL_WEBHOOK, DEQUEUE_LIMIT).await?;
    if rows.is_empty() {
        return Ok(());
    }

    let mut give_up: Vec<DbId> = Vec::new();
    let mut attempted: Vec<DbId> = Vec::new();
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks: JoinSet<()> = JoinSet::new();

    for row in rows {
        let content: WebhookContent = match serde_json::from_value(row.content.clone()) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(row = row.id, error = %e, "Malformed webhook queue row");
                attempted.push(row.id);
                continue;
            }
        };
        if content.target.retries > WEBHOOK_RETRY_LIMIT {
            // Give up on the payload; the target configuration stays.
            give_up.push(row.id);
            continue;
        }
        attempted.push(row.id);

        let pool = pool.clone();
        let http = http.clone();
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            deliver(&pool, &http, content).await;
        });
    }

    // Await every delivery before the cycle (and the advisory lock) ends.
    while tasks.join_next().await.is_some() {}

    QueueRepo::delete(pool, &give_up).await?;
    QueueRepo::mark_sent(pool, &attempted, Utc::now()).await?;
    tracing::info!(
        attempted = attempted.len(),
        dropped = give_up.len(),
        "Webhook dispatch cycle done"
    );
    Ok(())
}

/// One POST attempt; persists the target's retry bookkeeping.
async fn deliver(pool: &DbPool, http: &reqwest::Client, content: WebhookContent) {
    let request_body = match serde_json::to_value(&content.event) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(target = content.target.id, error = %e, "Webhook body encode failed");
            return;
        }
    };

    let result = http
        .post(&content.target.url)
        .json(&content.event)
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => {
            if let Err(e) = WebhookRepo::record_success(pool, content.target.id, Utc::now()).await
            {
                tracing::error!(target = content.target.id, error = %e, "Webhook bookkeeping failed");
            }
        }
        Ok(response) => {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let response_json = serde_json::json!({ "status": status, "body": body });
            tracing::warn!(target = content.target.id, status, "Webhook returned error status");
            if let Err(e) =
                WebhookRepo::record_failure(pool, content.target.id, &request_body, Some(&response_json))
                    .await
            {
                tracing::error!(target = content.target.id, error = %e, "Webhook bookkeeping failed");
            }
        }
        Err(e) => {
            tracing::warn!(target = content.target.id, error = %e, "Webhook request failed");
            if let Err(e) =
                WebhookRepo::record_failure(pool, content.target.id, &request_body, None).await
            {
                tracing::error!(target = content.target.id, error = %e, "Webhook bookkeeping failed");
            }
        }
    }
}
