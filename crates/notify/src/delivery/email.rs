//! Email delivery via SMTP.
//!
//! [`SmtpMailer`] wraps the `lettre` async SMTP transport behind the
//! [`EmailTransport`] seam. Configuration is loaded from environment
//! variables; if `SMTP_HOST` is not set, [`SmtpConfig::from_env`] returns
//! `None` and no mailer should be constructed. Sends are rate-limited
//! client-side; a send arriving inside the minimum interval fails with
//! [`EmailError::RateLimited`], which the dispatcher counts silently.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::queuing::EmailContent;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// The client-side rate limit rejected the send. Expected under
    /// load; the queue row is still marked sent.
    #[error("Email send rate limited")]
    RateLimited,

    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

// ---------------------------------------------------------------------------
// SmtpConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "noreply@chainpulse.io";

/// Default minimum interval between two sends, in milliseconds.
const DEFAULT_RATE_LIMIT_MS: u64 = 500;

/// Configuration for the SMTP email delivery service.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
    /// Minimum interval between two sends.
    pub min_send_interval: Duration,
}

impl SmtpConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set, signalling that email
    /// delivery is not configured and should be skipped.
    ///
    /// | Variable             | Required | Default                 |
    /// |----------------------|----------|-------------------------|
    /// | `SMTP_HOST`          | yes      | —                       |
    /// | `SMTP_PORT`          | no       | `587`                   |
    /// | `SMTP_FROM`          | no       | `noreply@chainpulse.io` |
    /// | `SMTP_USER`          | no       | —                       |
    /// | `SMTP_PASSWORD`      | no       | —                       |
    /// | `SMTP_RATE_LIMIT_MS` | no       | `500`                   |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
            min_send_interval: Duration::from_millis(
                std::env::var("SMTP_RATE_LIMIT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_RATE_LIMIT_MS),
            ),
        })
    }
}

// ---------------------------------------------------------------------------
// EmailTransport
// ---------------------------------------------------------------------------

/// Seam for the rate-limited SMTP sender.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Send one rendered digest email.
    async fn send(&self, email: &EmailContent) -> Result<(), EmailError>;
}

/// Sends digest emails via SMTP with a client-side rate limit.
pub struct SmtpMailer {
    config: SmtpConfig,
    last_send: Mutex<Option<Instant>>,
}

impl SmtpMailer {
    /// Create a new mailer with the given configuration.
    pub fn new(config: SmtpConfig) -> Self {
        Self {
            config,
            last_send: Mutex::new(None),
        }
    }

    /// Reject the send if the previous one was inside the minimum
    /// interval; otherwise claim the slot.
    async fn check_rate_limit(&self) -> Result<(), EmailError> {
        let mut last = self.last_send.lock().await;
        let now = Instant::now();
        if let Some(prev) = *last {
            if now.duration_since(prev) < self.config.min_send_interval {
                return Err(EmailError::RateLimited);
            }
        }
        *last = Some(now);
        Ok(())
    }
}

#[async_trait]
impl EmailTransport for SmtpMailer {
    async fn send(&self, email: &EmailContent) -> Result<(), EmailError> {
        use lettre::message::header::ContentType;
        use lettre::message::{Attachment, MultiPart, SinglePart};
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

        self.check_rate_limit().await?;

        let mut multipart = MultiPart::mixed().singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_HTML)
                .body(email.body_html.clone()),
        );
        for attachment in &email.attachments {
            let content_type = ContentType::parse("application/pdf")
                .map_err(|e| EmailError::Build(e.to_string()))?;
            multipart = multipart.singlepart(
                Attachment::new(attachment.filename.clone())
                    .body(attachment.content.clone(), content_type),
            );
        }

        let message = Message::builder()
            .from(self.config.from_address.parse()?)
            .to(email.to.parse()?)
            .subject(&email.subject)
            .multipart(multipart)
            .map_err(|e| EmailError::Build(e.to_string()))?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
                .port(self.config.smtp_port);

        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let mailer = transport_builder.build();
        mailer.send(message).await?;

        tracing::info!(to = %email.to, subject = %email.subject, "Notification email sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_returns_none_without_smtp_host() {
        std::env::remove_var("SMTP_HOST");
        assert!(SmtpConfig::from_env().is_none());
    }

    #[test]
    fn email_error_display_build() {
        let err = EmailError::Build("missing body".to_string());
        assert_eq!(err.to_string(), "Email build error: missing body");
    }

    #[tokio::test]
    async fn rate_limit_rejects_back_to_back_sends() {
        let mailer = SmtpMailer::new(SmtpConfig {
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            from_address: "noreply@chainpulse.io".to_string(),
            smtp_user: None,
            smtp_password: None,
            min_send_interval: Duration::from_secs(60),
        });
        assert!(mailer.check_rate_limit().await.is_ok());
        assert!(matches!(
            mailer.check_rate_limit().await,
            Err(EmailError::RateLimited)
        ));
    }
}
