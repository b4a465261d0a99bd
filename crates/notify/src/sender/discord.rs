//! Discord webhook channel dispatch.
//!
//! Rows are grouped by webhook target and delivered by one worker per
//! target, so a target's retry counter is never updated concurrently.
//! Each attempt waits `retries` seconds first; once the counter passes the
//! limit the remaining requests for that target are abandoned. All grouped
//! rows are marked sent in one pass and the final counter is persisted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use chainpulse_core::channels::CHANNEL_WEBHOOK_DISCORD;
use chainpulse_core::types::{DbId, Timestamp};
use chainpulse_db::models::webhook::WebhookTarget;
use chainpulse_db::repositories::{QueueRepo, WebhookRepo};
use chainpulse_db::DbPool;

use crate::queuing::{DiscordContent, DiscordRequest};

use super::webhook::WEBHOOK_RETRY_LIMIT;
use super::DEQUEUE_LIMIT;

pub(super) async fn dispatch(
    pool: &DbPool,
    http: &reqwest::Client,
    concurrency: usize,
) -> Result<(), sqlx::Error> {
    let rows =
        QueueRepo::unsent_for_channel(pool, CHANNEL_WEBHOOK_DISCORD, DEQUEUE_LIMIT).await?;
    if rows.is_empty() {
        return Ok(());
    }

    // Group all requests by webhook target; one worker per target keeps
    // the per-target retry sequence serialized.
    let mut by_target: HashMap<DbId, (WebhookTarget, Vec<DiscordRequest>)> = HashMap::new();
    let mut row_ids: Vec<DbId> = Vec::new();
    for row in rows {
        row_ids.push(row.id);
        let content: DiscordContent = match serde_json::from_value(row.content.clone()) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(row = row.id, error = %e, "Malformed Discord queue row");
                continue;
            }
        };
        let entry = by_target
            .entry(content.target.id)
            .or_insert_with(|| (content.target.clone(), Vec::new()));
        entry.1.extend(content.requests);
    }

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks: JoinSet<()> = JoinSet::new();
    for (_, (target, requests)) in by_target {
        let pool = pool.clone();
        let http = http.clone();
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            deliver_target(&pool, &http, target, requests).await;
        });
    }
    while tasks.join_next().await.is_some() {}

    QueueRepo::mark_sent(pool, &row_ids, Utc::now()).await?;
    tracing::info!(rows = row_ids.len(), "Discord dispatch cycle done");
    Ok(())
}

/// Sequentially deliver every request for one target.
async fn deliver_target(
    pool: &DbPool,
    http: &reqwest::Client,
    target: WebhookTarget,
    requests: Vec<DiscordRequest>,
) {
    let mut retries = target.retries;
    let mut last_sent: Option<Timestamp> = None;

    for request in &requests {
        if retries > WEBHOOK_RETRY_LIMIT {
            tracing::warn!(
                target = target.id,
                retries,
                "Discord target exhausted retries, abandoning remaining requests"
            );
            break;
        }
        if retries > 0 {
            tokio::time::sleep(Duration::from_secs(retries as u64)).await;
        }

        match http.post(&target.url).json(request).send().await {
            Ok(response) if response.status().is_success() => {
                retries = 0;
                last_sent = Some(Utc::now());
            }
            Ok(response) => {
                retries += 1;
                tracing::warn!(
                    target = target.id,
                    status = response.status().as_u16(),
                    "Discord webhook returned error status"
                );
            }
            Err(e) => {
                retries += 1;
                tracing::warn!(target = target.id, error = %e, "Discord webhook request failed");
            }
        }
    }

    if let Err(e) = WebhookRepo::set_retries(pool, target.id, retries, last_sent).await {
        tracing::error!(target = target.id, error = %e, "Discord bookkeeping failed");
    }
}
