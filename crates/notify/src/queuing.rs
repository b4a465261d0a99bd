//! Queuing renderer: converts the per-pass accumulator into channel
//! payloads and persists them durably.
//!
//! All channels of one pass are written in a single transaction that also
//! advances `last_sent_epoch`/`last_sent_ts` for every queued subscription
//! and inserts the epoch-notified marker. "Sent" at this stage means
//! "durably queued", not "delivered".

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use chainpulse_core::channels::{
    CHANNEL_EMAIL, CHANNEL_PUSH, CHANNEL_WEBHOOK, CHANNEL_WEBHOOK_DISCORD,
};
use chainpulse_core::events::EventName;
use chainpulse_core::types::DbId;
use chainpulse_db::models::webhook::WebhookTarget;
use chainpulse_db::repositories::{EpochRepo, QueueRepo, RecipientRepo, SubscriptionRepo};
use chainpulse_db::DbPool;

use crate::accumulator::NotificationsPerUserId;
use crate::error::CollectError;
use crate::types::{Notification, NotificationFormat};

/// At most this many event types are named in an email subject.
const SUBJECT_MAX_EVENTS: usize = 2;

/// At most this many detail lines per event type in the email body.
const EMAIL_DETAIL_LINES: usize = 11;

/// Platform limit on the push notification body.
const PUSH_BODY_MAX_CHARS: usize = 1000;

/// Discord caps embeds per webhook request.
pub const DISCORD_EMBEDS_PER_REQUEST: usize = 10;

// ---------------------------------------------------------------------------
// Channel payloads
// ---------------------------------------------------------------------------

/// An attachment carried inside a queued email payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentContent {
    pub filename: String,
    pub content: Vec<u8>,
}

/// Queue payload for one user's email digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailContent {
    pub user_id: DbId,
    pub to: String,
    pub subject: String,
    pub body_html: String,
    pub attachments: Vec<AttachmentContent>,
}

/// Queue payload for one user's push digest, fanned out to every
/// registered device token by the sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushContent {
    pub user_id: DbId,
    pub title: String,
    pub body: String,
    pub tokens: Vec<String>,
}

/// The JSON body POSTed to a plain webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub epoch: u64,
    pub title: String,
    pub description: String,
    pub target_filter: String,
}

/// Queue payload for one (webhook target, notification) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookContent {
    pub target: WebhookTarget,
    pub event: WebhookEvent,
}

/// One embed inside a Discord webhook request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordEmbed {
    pub title: String,
    pub description: String,
}

/// One Discord webhook HTTP request (at most
/// [`DISCORD_EMBEDS_PER_REQUEST`] embeds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordRequest {
    pub username: String,
    pub embeds: Vec<DiscordEmbed>,
}

/// Queue payload for one Discord webhook target: the batched requests for
/// every notification of the pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordContent {
    pub target: WebhookTarget,
    pub requests: Vec<DiscordRequest>,
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// Render and persist the accumulator.
///
/// The epoch marker is inserted on the same transaction, so a failed queue
/// write leaves the epoch unmarked and the pass is re-collected on the
/// next tick. A duplicate marker insert fails the transaction, which is
/// the duplicate-collection guard.
pub async fn queue_notifications(
    pool: &DbPool,
    acc: &NotificationsPerUserId,
    epoch: u64,
) -> Result<(), CollectError> {
    let user_ids = acc.user_ids();
    let emails = RecipientRepo::emails_by_user_ids(pool, &user_ids).await?;
    let push_tokens = RecipientRepo::push_tokens_by_user_ids(pool, &user_ids).await?;
    let webhooks = RecipientRepo::webhooks_by_user_ids(pool, &user_ids).await?;

    let now = Utc::now();
    let mut tx = pool.begin().await?;
    let mut queued_sub_ids: Vec<DbId> = Vec::new();

    for user_id in user_ids {
        let events = acc.events_for_user(user_id);
        if events.is_empty() {
            continue;
        }
        let counts = counts_by_event(&events);
        let mut queued_any = false;

        if let Some(to) = emails.get(&user_id) {
            let content = EmailContent {
                user_id,
                to: to.clone(),
                subject: render_email_subject(&counts),
                body_html: render_email_body(&counts, &events),
                attachments: collect_attachments(&events),
            };
            QueueRepo::enqueue(&mut *tx, CHANNEL_EMAIL, &serde_json::to_value(&content)?).await?;
            queued_any = true;
        }

        if let Some(tokens) = push_tokens.get(&user_id).filter(|t| !t.is_empty()) {
            let content = PushContent {
                user_id,
                title: "Chainpulse".to_string(),
                body: render_push_digest(&counts),
                tokens: tokens.clone(),
            };
            QueueRepo::enqueue(&mut *tx, CHANNEL_PUSH, &serde_json::to_value(&content)?).await?;
            queued_any = true;
        }

        for target in webhooks.get(&user_id).map(Vec::as_slice).unwrap_or(&[]) {
            let wanted: Vec<&Notification> = events
                .iter()
                .filter(|(event, _)| target.wants_event(event.as_str()))
                .flat_map(|(_, ns)| ns.iter())
                .collect();
            if wanted.is_empty() {
                continue;
            }
            if target.is_discord() {
                let content = DiscordContent {
                    target: target.clone(),
                    requests: build_discord_requests(&wanted),
                };
                QueueRepo::enqueue(
                    &mut *tx,
                    CHANNEL_WEBHOOK_DISCORD,
                    &serde_json::to_value(&content)?,
                )
                .await?;
                for n in &wanted {
                    queued_sub_ids.push(n.metadata().subscription_id);
                }
            } else {
                for n in &wanted {
                    let content = WebhookContent {
                        target: target.clone(),
                        event: webhook_event(n),
                    };
                    QueueRepo::enqueue(
                        &mut *tx,
                        CHANNEL_WEBHOOK,
                        &serde_json::to_value(&content)?,
                    )
                    .await?;
                    queued_sub_ids.push(n.metadata().subscription_id);
                }
            }
        }

        if queued_any {
            for notifications in events.values() {
                for n in notifications {
                    queued_sub_ids.push(n.metadata().subscription_id);
                }
            }
        }
    }

    queued_sub_ids.sort_unstable();
    queued_sub_ids.dedup();
    SubscriptionRepo::update_last_sent(&mut *tx, &queued_sub_ids, now, epoch as i64).await?;
    EpochRepo::mark_epoch_notified(&mut *tx, epoch as i64).await?;
    tx.commit().await?;

    tracing::info!(
        epoch,
        subscriptions = queued_sub_ids.len(),
        "Queued notifications and marked epoch"
    );
    Ok(())
}

impl From<serde_json::Error> for CollectError {
    fn from(e: serde_json::Error) -> Self {
        CollectError::Store(sqlx::Error::Encode(Box::new(e)))
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn counts_by_event(
    events: &BTreeMap<EventName, Vec<Notification>>,
) -> BTreeMap<EventName, usize> {
    events.iter().map(|(e, ns)| (*e, ns.len())).collect()
}

/// Email subject naming up to two event types, then a count of the rest.
pub fn render_email_subject(counts: &BTreeMap<EventName, usize>) -> String {
    let labels: Vec<&str> = counts.keys().map(|e| e.label()).collect();
    let body = match labels.len() {
        0 => "Notifications".to_string(),
        1 => labels[0].to_string(),
        2 => format!("{} and {}", labels[0], labels[1]),
        _ => {
            let rest: usize = counts
                .iter()
                .skip(SUBJECT_MAX_EVENTS)
                .map(|(_, c)| c)
                .sum();
            format!(
                "{}, {} and {} other notifications",
                labels[0], labels[1], rest
            )
        }
    };
    format!("[Chainpulse] {body}")
}

/// Two-part email digest: counts-by-type summary, then up to
/// [`EMAIL_DETAIL_LINES`] detail lines per event type.
pub fn render_email_body(
    counts: &BTreeMap<EventName, usize>,
    events: &BTreeMap<EventName, Vec<Notification>>,
) -> String {
    let mut body = String::from("<h2>Your notifications</h2>\n<p>");
    for (event, count) in counts {
        body.push_str(&format!("{count} &times; {}<br>\n", event.label()));
    }
    body.push_str("</p>\n");

    for (event, notifications) in events {
        body.push_str(&format!("<h3>{}</h3>\n<ul>\n", event.label()));
        for n in notifications.iter().take(EMAIL_DETAIL_LINES) {
            body.push_str(&format!("<li>{}</li>\n", n.info(NotificationFormat::Html)));
        }
        if notifications.len() > EMAIL_DETAIL_LINES {
            body.push_str(&format!(
                "<li>... and {} more events</li>\n",
                notifications.len() - EMAIL_DETAIL_LINES
            ));
        }
        body.push_str("</ul>\n");
    }
    body
}

/// Newline counts-by-type digest for push, truncated to the platform
/// limit.
pub fn render_push_digest(counts: &BTreeMap<EventName, usize>) -> String {
    let body = counts
        .iter()
        .map(|(event, count)| format!("{count}x {}", event.label()))
        .collect::<Vec<_>>()
        .join("\n");
    truncate_chars(&body, PUSH_BODY_MAX_CHARS)
}

/// Batch notifications into Discord requests of at most ten embeds each.
pub fn build_discord_requests(notifications: &[&Notification]) -> Vec<DiscordRequest> {
    notifications
        .chunks(DISCORD_EMBEDS_PER_REQUEST)
        .map(|chunk| DiscordRequest {
            username: "Chainpulse".to_string(),
            embeds: chunk
                .iter()
                .map(|n| DiscordEmbed {
                    title: n.title(),
                    description: n.info(NotificationFormat::Markdown),
                })
                .collect(),
        })
        .collect()
}

fn webhook_event(n: &Notification) -> WebhookEvent {
    let meta = n.metadata();
    WebhookEvent {
        event: meta.event_name.as_str().to_string(),
        epoch: meta.epoch,
        title: n.title(),
        description: n.info(NotificationFormat::Plain),
        target_filter: meta.event_filter.clone(),
    }
}

fn collect_attachments(
    events: &BTreeMap<EventName, Vec<Notification>>,
) -> Vec<AttachmentContent> {
    events
        .values()
        .flatten()
        .filter_map(|n| n.email_attachment())
        .map(|a| AttachmentContent {
            filename: a.filename,
            content: a.content,
        })
        .collect()
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::types::validator::AttestationMissedNotification;
    use crate::types::NotificationMetadata;

    use super::*;

    fn notification(event: EventName, index: i64) -> Notification {
        Arc::new(AttestationMissedNotification {
            meta: NotificationMetadata {
                subscription_id: index,
                user_id: 1,
                epoch: 101,
                event_name: event,
                event_filter: format!("0x{index:02x}"),
                dashboard_id: None,
                dashboard_name: None,
                group_id: None,
                group_name: None,
            },
            validator_index: index,
        })
    }

    fn counts(entries: &[(EventName, usize)]) -> BTreeMap<EventName, usize> {
        entries.iter().copied().collect()
    }

    #[test]
    fn subject_names_one_event() {
        let c = counts(&[(EventName::ValidatorAttestationMissed, 3)]);
        assert_eq!(render_email_subject(&c), "[Chainpulse] Missed Attestation");
    }

    #[test]
    fn subject_names_two_events() {
        let c = counts(&[
            (EventName::ValidatorProposalSubmitted, 1),
            (EventName::ValidatorAttestationMissed, 3),
        ]);
        let subject = render_email_subject(&c);
        assert!(subject.contains(" and "));
        assert!(subject.contains("Block Proposal"));
        assert!(subject.contains("Missed Attestation"));
    }

    #[test]
    fn subject_folds_extra_events_into_a_count() {
        let c = counts(&[
            (EventName::ValidatorProposalSubmitted, 1),
            (EventName::ValidatorAttestationMissed, 3),
            (EventName::ValidatorGotSlashed, 2),
            (EventName::ValidatorReceivedWithdrawal, 4),
        ]);
        let subject = render_email_subject(&c);
        assert!(subject.ends_with("and 6 other notifications"), "{subject}");
    }

    #[test]
    fn email_body_truncates_detail_lines() {
        let notifications: Vec<Notification> = (0..15)
            .map(|i| notification(EventName::ValidatorAttestationMissed, i))
            .collect();
        let mut events = BTreeMap::new();
        events.insert(EventName::ValidatorAttestationMissed, notifications);
        let c = counts(&[(EventName::ValidatorAttestationMissed, 15)]);

        let body = render_email_body(&c, &events);
        assert_eq!(body.matches("<li>").count(), EMAIL_DETAIL_LINES + 1);
        assert!(body.contains("... and 4 more events"));
    }

    #[test]
    fn push_digest_is_capped_at_platform_limit() {
        let c = counts(&[
            (EventName::ValidatorAttestationMissed, 12),
            (EventName::ValidatorProposalMissed, 1),
        ]);
        let digest = render_push_digest(&c);
        assert!(digest.contains("12x Missed Attestation"));
        assert!(digest.contains('\n'));

        let long = "x".repeat(2000);
        assert_eq!(truncate_chars(&long, PUSH_BODY_MAX_CHARS).len(), 1000);
    }

    #[test]
    fn discord_requests_hold_at_most_ten_embeds() {
        let owned: Vec<Notification> = (0..23)
            .map(|i| notification(EventName::ValidatorAttestationMissed, i))
            .collect();
        let refs: Vec<&Notification> = owned.iter().collect();
        let requests = build_discord_requests(&refs);
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].embeds.len(), 10);
        assert_eq!(requests[2].embeds.len(), 3);
    }
}
