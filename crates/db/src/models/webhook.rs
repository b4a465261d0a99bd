//! Webhook target entity model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use chainpulse_core::types::{DbId, Timestamp};

/// Destination value for plain JSON webhooks.
pub const WEBHOOK_DESTINATION_GENERIC: &str = "webhook";

/// Destination value for Discord-formatted webhooks.
pub const WEBHOOK_DESTINATION_DISCORD: &str = "webhook_discord";

/// A row from the `user_webhooks` table.
///
/// `retries` is a saturating failure counter: reset to zero on a successful
/// delivery, incremented on failure, and once it exceeds the retry limit the
/// queued notification is purged while this configuration row stays intact.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookTarget {
    pub id: DbId,
    pub user_id: DbId,
    pub url: String,
    pub retries: i32,
    pub last_sent: Option<Timestamp>,
    /// Either [`WEBHOOK_DESTINATION_GENERIC`] or
    /// [`WEBHOOK_DESTINATION_DISCORD`].
    pub destination: String,
    /// Wire names of the events this target wants to receive.
    pub event_names: Vec<String>,
}

impl WebhookTarget {
    /// Whether this target is configured to receive `event_name`.
    pub fn wants_event(&self, event_name: &str) -> bool {
        self.event_names.iter().any(|e| e == event_name)
    }

    /// Whether this target posts Discord-formatted payloads.
    pub fn is_discord(&self) -> bool {
        self.destination == WEBHOOK_DESTINATION_DISCORD
    }
}
