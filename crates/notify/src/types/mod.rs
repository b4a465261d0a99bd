//! Typed notification variants.
//!
//! Each event family has one concrete struct implementing
//! [`NotificationBody`]; per-format rendering lives on the variant so
//! event-specific formatting stays colocated and independently testable.

use std::sync::Arc;

use chainpulse_core::events::EventName;
use chainpulse_core::types::DbId;

pub mod machine;
pub mod network;
pub mod rocketpool;
pub mod tax;
pub mod validator;

/// Base URL for explorer deep links in HTML and Markdown renderings.
pub const SITE_BASE_URL: &str = "https://chainpulse.io";

/// Output format requested by a delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationFormat {
    /// Plain text (push digests, generic webhook payloads).
    Plain,
    /// HTML (email digests).
    Html,
    /// Markdown (Discord embeds).
    Markdown,
}

/// Fields shared by every notification variant.
#[derive(Debug, Clone)]
pub struct NotificationMetadata {
    pub subscription_id: DbId,
    pub user_id: DbId,
    pub epoch: u64,
    pub event_name: EventName,
    pub event_filter: String,
    pub dashboard_id: Option<DbId>,
    pub dashboard_name: Option<String>,
    pub group_id: Option<DbId>,
    pub group_name: Option<String>,
}

/// A file attached to the email rendering of a notification.
#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content: Vec<u8>,
}

/// One detected event addressed to one subscription.
pub trait NotificationBody: Send + Sync {
    /// Shared routing metadata.
    fn metadata(&self) -> &NotificationMetadata;

    /// Short single-line summary.
    fn title(&self) -> String;

    /// Event detail in the requested format.
    fn info(&self, format: NotificationFormat) -> String;

    /// Optional file carried into the email digest.
    fn email_attachment(&self) -> Option<EmailAttachment> {
        None
    }
}

/// Notifications are shared between the accumulator and several rendered
/// channel payloads of one pass.
pub type Notification = Arc<dyn NotificationBody>;

/// Render a gwei amount as a trimmed ETH string.
pub fn format_gwei(gwei: i64) -> String {
    let eth = gwei as f64 / 1e9;
    let s = format!("{eth:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    format!("{s} ETH")
}

/// Render a validator reference in the requested format, linking to the
/// explorer where the format supports it.
pub fn validator_ref(format: NotificationFormat, validator_index: i64) -> String {
    match format {
        NotificationFormat::Plain => format!("validator {validator_index}"),
        NotificationFormat::Html => format!(
            "<a href=\"{SITE_BASE_URL}/validator/{validator_index}\">validator {validator_index}</a>"
        ),
        NotificationFormat::Markdown => format!(
            "[validator {validator_index}]({SITE_BASE_URL}/validator/{validator_index})"
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_gwei_trims_trailing_zeros() {
        assert_eq!(format_gwei(1_000_000_000), "1 ETH");
        assert_eq!(format_gwei(1_500_000_000), "1.5 ETH");
        assert_eq!(format_gwei(32_123_456), "0.032123 ETH");
        assert_eq!(format_gwei(0), "0 ETH");
    }

    #[test]
    fn validator_ref_formats() {
        assert_eq!(
            validator_ref(NotificationFormat::Plain, 42),
            "validator 42"
        );
        assert!(validator_ref(NotificationFormat::Html, 42).starts_with("<a href="));
        assert!(validator_ref(NotificationFormat::Markdown, 42).starts_with("[validator 42]("));
    }
}
