//! Well-known notification channel name constants.
//!
//! These must match the channel values stored in the
//! `notification_queue.channel` column and referenced by the queuing
//! renderer and the per-channel dispatchers.

/// Email notification delivered via SMTP.
pub const CHANNEL_EMAIL: &str = "email";

/// Mobile push notification delivered via the device-token batch sender.
pub const CHANNEL_PUSH: &str = "push";

/// Generic webhook notification delivered to an external HTTP endpoint.
pub const CHANNEL_WEBHOOK: &str = "webhook";

/// Discord webhook notification delivered as embed batches.
pub const CHANNEL_WEBHOOK_DISCORD: &str = "webhook_discord";
