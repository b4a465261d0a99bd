//! Mobile push delivery via the FCM HTTP API.
//!
//! [`FcmClient`] implements the [`PushClient`] seam over `reqwest`. The
//! dispatcher batches messages and decides per-message retries based on
//! the [`PushOutcome`]s returned here; the only permanent failure is an
//! unregistered device token.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// FCM error code for a token that is no longer registered. Messages
/// failing with it are never retried.
const ERROR_NOT_REGISTERED: &str = "NotRegistered";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for a whole push batch failing (transport level).
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The push backend returned a non-2xx status code.
    #[error("Push backend returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// Messages and outcomes
// ---------------------------------------------------------------------------

/// One rendered push message addressed to one device token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushMessage {
    pub token: String,
    pub title: String,
    pub body: String,
}

/// Per-message delivery outcome within a batch.
#[derive(Debug, Clone)]
pub struct PushOutcome {
    pub token: String,
    /// `None` on success; otherwise the provider error and whether the
    /// message may be retried.
    pub failure: Option<PushFailure>,
}

/// A failed message and its retry classification.
#[derive(Debug, Clone)]
pub struct PushFailure {
    pub error: String,
    pub retryable: bool,
}

impl PushOutcome {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn is_retryable(&self) -> bool {
        self.failure.as_ref().is_some_and(|f| f.retryable)
    }
}

// ---------------------------------------------------------------------------
// PushClient
// ---------------------------------------------------------------------------

/// Seam for the token-based batch push sender.
#[async_trait]
pub trait PushClient: Send + Sync {
    /// Send a batch of messages, returning one outcome per message in
    /// input order.
    async fn send_batch(&self, messages: &[PushMessage]) -> Result<Vec<PushOutcome>, PushError>;
}

// ---------------------------------------------------------------------------
// FcmConfig
// ---------------------------------------------------------------------------

/// Default FCM legacy HTTP endpoint.
const DEFAULT_FCM_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";

/// Configuration for the FCM push client.
#[derive(Debug, Clone)]
pub struct FcmConfig {
    pub server_key: String,
    pub endpoint: String,
}

impl FcmConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `FCM_SERVER_KEY` is not set, signalling that
    /// push delivery is not configured and should be skipped.
    ///
    /// | Variable         | Required | Default                               |
    /// |------------------|----------|---------------------------------------|
    /// | `FCM_SERVER_KEY` | yes      | —                                     |
    /// | `FCM_ENDPOINT`   | no       | `https://fcm.googleapis.com/fcm/send` |
    pub fn from_env() -> Option<Self> {
        let server_key = std::env::var("FCM_SERVER_KEY").ok()?;
        Some(Self {
            server_key,
            endpoint: std::env::var("FCM_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_FCM_ENDPOINT.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// FcmClient
// ---------------------------------------------------------------------------

/// HTTP request timeout for a single batch.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct FcmBatchRequest<'a> {
    registration_ids: Vec<&'a str>,
    notification: FcmNotification<'a>,
}

#[derive(Debug, Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct FcmBatchResponse {
    results: Vec<FcmResult>,
}

#[derive(Debug, Deserialize)]
struct FcmResult {
    error: Option<String>,
}

/// Sends push batches to FCM.
pub struct FcmClient {
    config: FcmConfig,
    client: reqwest::Client,
}

impl FcmClient {
    /// Create a new client with a pre-configured HTTP client.
    pub fn new(config: FcmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { config, client }
    }
}

#[async_trait]
impl PushClient for FcmClient {
    async fn send_batch(&self, messages: &[PushMessage]) -> Result<Vec<PushOutcome>, PushError> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }
        // All messages of one queue row share title and body; FCM takes
        // the token list in one request.
        let request = FcmBatchRequest {
            registration_ids: messages.iter().map(|m| m.token.as_str()).collect(),
            notification: FcmNotification {
                title: &messages[0].title,
                body: &messages[0].body,
            },
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("key={}", self.config.server_key))
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PushError::HttpStatus(response.status().as_u16()));
        }

        let parsed: FcmBatchResponse = response.json().await?;
        Ok(messages
            .iter()
            .zip(parsed.results.into_iter())
            .map(|(message, result)| PushOutcome {
                token: message.token.clone(),
                failure: result.error.map(|error| {
                    let retryable = error != ERROR_NOT_REGISTERED;
                    PushFailure { error, retryable }
                }),
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_token_is_not_retryable() {
        let outcome = PushOutcome {
            token: "t".to_string(),
            failure: Some(PushFailure {
                error: ERROR_NOT_REGISTERED.to_string(),
                retryable: false,
            }),
        };
        assert!(!outcome.is_success());
        assert!(!outcome.is_retryable());
    }

    #[test]
    fn from_env_returns_none_without_server_key() {
        std::env::remove_var("FCM_SERVER_KEY");
        assert!(FcmConfig::from_env().is_none());
    }
}
