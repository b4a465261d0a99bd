//! Queue dispatcher.
//!
//! Drains the durable notification queue on a fixed cadence with
//! channel-specific delivery, retry, and garbage-collection policies. A
//! cluster-wide advisory lock guarantees a single dispatch runs at a time;
//! the whole cycle is bounded by a timeout, and all delivery tasks are
//! awaited before the lock is released.

mod discord;
mod email;
mod push;
mod webhook;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use chainpulse_db::repositories::QueueRepo;
use chainpulse_db::{AdvisoryLock, DbPool};

use crate::config::NotifyConfig;
use crate::delivery::{EmailTransport, PushClient};

/// Advisory lock key shared by every sender instance.
const SENDER_LOCK_KEY: i64 = 5429;

/// Max queue rows dequeued per channel per cycle.
const DEQUEUE_LIMIT: i64 = 5000;

/// User agent sent on webhook and Discord requests.
const HTTP_USER_AGENT: &str = "chainpulse-notify/0.1";

/// HTTP request timeout for webhook and Discord posts.
const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Drains the durable queue across all four channels.
pub struct NotificationSender {
    pool: DbPool,
    config: NotifyConfig,
    email: Option<Arc<dyn EmailTransport>>,
    push: Option<Arc<dyn PushClient>>,
    http: reqwest::Client,
}

impl NotificationSender {
    /// Create a sender. Channels whose collaborator is not configured
    /// (`None`) are skipped; their rows age out via garbage collection.
    pub fn new(
        pool: DbPool,
        config: NotifyConfig,
        email: Option<Arc<dyn EmailTransport>>,
        push: Option<Arc<dyn PushClient>>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(HTTP_USER_AGENT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            pool,
            config,
            email,
            push,
            http,
        }
    }

    /// Run the dispatch loop until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.sender_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Notification sender cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.dispatch_once().await {
                        tracing::error!(error = %e, "Dispatch cycle failed");
                    }
                }
            }
        }
    }

    /// One dispatch cycle: take the cluster-wide lock, drain every
    /// channel within the timeout, garbage-collect, release.
    pub async fn dispatch_once(&self) -> Result<(), sqlx::Error> {
        let Some(lock) = AdvisoryLock::try_acquire(&self.pool, SENDER_LOCK_KEY).await? else {
            tracing::debug!("Dispatch lock held elsewhere, skipping cycle");
            return Ok(());
        };

        let outcome =
            tokio::time::timeout(self.config.dispatch_timeout, self.dispatch_channels()).await;
        lock.release().await?;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.config.dispatch_timeout.as_secs(),
                    "Dispatch cycle exceeded its timeout"
                );
                Ok(())
            }
        }
    }

    async fn dispatch_channels(&self) -> Result<(), sqlx::Error> {
        if let Some(email) = &self.email {
            email::dispatch(&self.pool, email.as_ref()).await?;
        }
        if let Some(push) = &self.push {
            push::dispatch(&self.pool, push.as_ref()).await?;
        }
        webhook::dispatch(
            &self.pool,
            &self.http,
            self.config.dispatch_concurrency,
        )
        .await?;
        discord::dispatch(
            &self.pool,
            &self.http,
            self.config.dispatch_concurrency,
        )
        .await?;

        let collected = QueueRepo::garbage_collect(&self.pool).await?;
        if collected > 0 {
            tracing::debug!(rows = collected, "Garbage collected queue rows");
        }
        Ok(())
    }
}
