//! Push channel dispatch.
//!
//! Messages are sent in batches with a fixed backoff schedule. Between
//! attempts, only messages that failed with a retryable error are carried
//! forward; unregistered tokens are dropped immediately. The queue row is
//! marked sent after the attempt sequence regardless of residual failures.

use std::time::Duration;

use chrono::Utc;

use chainpulse_core::channels::CHANNEL_PUSH;
use chainpulse_core::types::DbId;
use chainpulse_db::repositories::QueueRepo;
use chainpulse_db::DbPool;

use crate::delivery::{PushClient, PushMessage, PushOutcome};
use crate::queuing::PushContent;

use super::DEQUEUE_LIMIT;

/// Max messages per provider call.
const PUSH_BATCH_SIZE: usize = 500;

/// Backoff schedule in seconds; one entry per attempt.
const BACKOFF_SECS: [u64; 5] = [0, 2, 4, 8, 16];

pub(super) async fn dispatch(pool: &DbPool, client: &dyn PushClient) -> Result<(), sqlx::Error> {
    let rows = QueueRepo::unsent_for_channel(pool, CHANNEL_PUSH, DEQUEUE_LIMIT).await?;
    if rows.is_empty() {
        return Ok(());
    }

    let ids: Vec<DbId> = rows.iter().map(|r| r.id).collect();
    for row in &rows {
        let content: PushContent = match serde_json::from_value(row.content.clone()) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(row = row.id, error = %e, "Malformed push queue row");
                continue;
            }
        };
        let messages: Vec<PushMessage> = content
            .tokens
            .iter()
            .map(|token| PushMessage {
                token: token.clone(),
                title: content.title.clone(),
                body: content.body.clone(),
            })
            .collect();
        send_with_backoff(client, messages).await;
    }

    QueueRepo::mark_sent(pool, &ids, Utc::now()).await?;
    tracing::info!(rows = ids.len(), "Push dispatch cycle done");
    Ok(())
}

/// Run the attempt sequence for one queue row's messages.
async fn send_with_backoff(client: &dyn PushClient, messages: Vec<PushMessage>) {
    let mut pending = messages;
    for delay_secs in BACKOFF_SECS {
        if pending.is_empty() {
            return;
        }
        if delay_secs > 0 {
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        }

        let mut next: Vec<PushMessage> = Vec::new();
        for chunk in pending.chunks(PUSH_BATCH_SIZE) {
            match client.send_batch(chunk).await {
                Ok(outcomes) => next.extend(retryable_messages(chunk, &outcomes)),
                Err(e) => {
                    // Transport-level failure: the whole chunk is retryable.
                    tracing::warn!(error = %e, "Push batch failed, will retry");
                    next.extend(chunk.iter().cloned());
                }
            }
        }
        pending = next;
    }
    if !pending.is_empty() {
        tracing::error!(
            residual = pending.len(),
            "Push messages still failing after all attempts, dropping"
        );
    }
}

/// Messages from `chunk` whose outcome failed with a retryable error.
fn retryable_messages(chunk: &[PushMessage], outcomes: &[PushOutcome]) -> Vec<PushMessage> {
    chunk
        .iter()
        .zip(outcomes.iter())
        .filter(|(_, outcome)| outcome.is_retryable())
        .map(|(message, _)| message.clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::delivery::push::PushFailure;

    use super::*;

    fn message(token: &str) -> PushMessage {
        PushMessage {
            token: token.to_string(),
            title: "Chainpulse".to_string(),
            body: "1x Missed Attestation".to_string(),
        }
    }

    fn outcome(token: &str, failure: Option<(&str, bool)>) -> PushOutcome {
        PushOutcome {
            token: token.to_string(),
            failure: failure.map(|(error, retryable)| PushFailure {
                error: error.to_string(),
                retryable,
            }),
        }
    }

    #[test]
    fn only_transient_failures_are_retried() {
        let chunk = vec![message("dead"), message("flaky"), message("ok")];
        let outcomes = vec![
            outcome("dead", Some(("NotRegistered", false))),
            outcome("flaky", Some(("Unavailable", true))),
            outcome("ok", None),
        ];
        let retry = retryable_messages(&chunk, &outcomes);
        assert_eq!(retry.len(), 1);
        assert_eq!(retry[0].token, "flaky");
    }

    #[test]
    fn nothing_to_retry_when_all_succeed() {
        let chunk = vec![message("a"), message("b")];
        let outcomes = vec![outcome("a", None), outcome("b", None)];
        assert!(retryable_messages(&chunk, &outcomes).is_empty());
    }
}
