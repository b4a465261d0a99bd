//! Email channel dispatch.
//!
//! At-most-once delivery: every dequeued row is marked sent regardless of
//! the send outcome. Rate-limit rejections are expected and only counted;
//! other failures are logged.

use chrono::Utc;

use chainpulse_core::channels::CHANNEL_EMAIL;
use chainpulse_core::types::DbId;
use chainpulse_db::repositories::QueueRepo;
use chainpulse_db::DbPool;

use crate::delivery::{EmailError, EmailTransport};
use crate::queuing::EmailContent;

use super::DEQUEUE_LIMIT;

pub(super) async fn dispatch(
    pool: &DbPool,
    transport: &dyn EmailTransport,
) -> Result<(), sqlx::Error> {
    let rows = QueueRepo::unsent_for_channel(pool, CHANNEL_EMAIL, DEQUEUE_LIMIT).await?;
    if rows.is_empty() {
        return Ok(());
    }

    let ids: Vec<DbId> = rows.iter().map(|r| r.id).collect();
    let mut sent = 0usize;
    let mut rate_limited = 0usize;
    let mut failed = 0usize;

    for row in &rows {
        let content: EmailContent = match serde_json::from_value(row.content.clone()) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(row = row.id, error = %e, "Malformed email queue row");
                failed += 1;
                continue;
            }
        };
        match transport.send(&content).await {
            Ok(()) => sent += 1,
            Err(EmailError::RateLimited) => rate_limited += 1,
            Err(e) => {
                failed += 1;
                tracing::error!(row = row.id, to = %content.to, error = %e, "Email send failed");
            }
        }
    }

    // Mark everything sent, including failures: email is never re-queued.
    QueueRepo::mark_sent(pool, &ids, Utc::now()).await?;
    tracing::info!(sent, rate_limited, failed, "Email dispatch cycle done");
    Ok(())
}
