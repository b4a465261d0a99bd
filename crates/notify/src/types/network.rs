//! Network-wide notification variants: client releases and finality delay.

use super::{NotificationBody, NotificationFormat, NotificationMetadata, SITE_BASE_URL};

/// A new Ethereum client release was published.
#[derive(Debug, Clone)]
pub struct ClientUpdateNotification {
    pub meta: NotificationMetadata,
    pub client: String,
    pub version: String,
}

impl NotificationBody for ClientUpdateNotification {
    fn metadata(&self) -> &NotificationMetadata {
        &self.meta
    }

    fn title(&self) -> String {
        format!("New {} Release", self.client)
    }

    fn info(&self, format: NotificationFormat) -> String {
        match format {
            NotificationFormat::Plain => {
                format!("{} version {} is available", self.client, self.version)
            }
            NotificationFormat::Html => format!(
                "<a href=\"{SITE_BASE_URL}/ethClients\">{} version {}</a> is available",
                self.client, self.version
            ),
            NotificationFormat::Markdown => format!(
                "[{} version {}]({SITE_BASE_URL}/ethClients) is available",
                self.client, self.version
            ),
        }
    }
}

/// Finality is delayed beyond the liveness threshold.
#[derive(Debug, Clone)]
pub struct NetworkLivenessNotification {
    pub meta: NotificationMetadata,
    pub finality_delay: u64,
}

impl NotificationBody for NetworkLivenessNotification {
    fn metadata(&self) -> &NotificationMetadata {
        &self.meta
    }

    fn title(&self) -> String {
        "Finality Delayed".to_string()
    }

    fn info(&self, _format: NotificationFormat) -> String {
        format!(
            "The network has not finalized for {} epochs",
            self.finality_delay
        )
    }
}
