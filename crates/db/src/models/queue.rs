//! Notification queue entity model.

use serde::Serialize;
use sqlx::FromRow;

use chainpulse_core::types::{DbId, Timestamp};

/// A row from the `notification_queue` table.
///
/// `content` is a channel-specific JSON document: a rendered email or push
/// digest, or a webhook/Discord request with its delivery metadata.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QueuedNotification {
    pub id: DbId,
    pub created: Timestamp,
    pub sent: Option<Timestamp>,
    pub channel: String,
    pub content: serde_json::Value,
}
