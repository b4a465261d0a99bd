//! Per-pass notification accumulator.

use std::collections::{BTreeMap, HashMap};

use chainpulse_core::events::EventName;
use chainpulse_core::types::DbId;

use crate::types::Notification;

type PerFilter = BTreeMap<String, Vec<Notification>>;
type PerEvent = BTreeMap<EventName, PerFilter>;
type PerGroup = BTreeMap<Option<DbId>, PerEvent>;
type PerDashboard = BTreeMap<Option<DbId>, PerGroup>;

/// All notifications of one collection pass, grouped
/// `user → dashboard → group → event → filter`.
///
/// Pure data structure: no validation happens here. Callers are
/// responsible for the cooldown check; if it is bypassed, the map will
/// happily accumulate duplicates for the same `(subscription, epoch)`.
#[derive(Default)]
pub struct NotificationsPerUserId {
    by_user: HashMap<DbId, PerDashboard>,
}

impl std::fmt::Debug for NotificationsPerUserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationsPerUserId")
            .field("users", &self.by_user.len())
            .field("total", &self.total())
            .finish()
    }
}

impl NotificationsPerUserId {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a notification under its own metadata keys.
    pub fn add(&mut self, notification: Notification) {
        let meta = notification.metadata();
        self.by_user
            .entry(meta.user_id)
            .or_default()
            .entry(meta.dashboard_id)
            .or_default()
            .entry(meta.group_id)
            .or_default()
            .entry(meta.event_name)
            .or_default()
            .entry(meta.event_filter.clone())
            .or_default()
            .push(notification);
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }

    /// Total number of accumulated notifications.
    pub fn total(&self) -> usize {
        self.iter_all().count()
    }

    /// All user ids with at least one notification, sorted.
    pub fn user_ids(&self) -> Vec<DbId> {
        let mut ids: Vec<DbId> = self.by_user.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// One user's notifications flattened to `event → notifications`,
    /// preserving dashboard/group/filter iteration order.
    pub fn events_for_user(&self, user_id: DbId) -> BTreeMap<EventName, Vec<Notification>> {
        let mut by_event: BTreeMap<EventName, Vec<Notification>> = BTreeMap::new();
        if let Some(dashboards) = self.by_user.get(&user_id) {
            for groups in dashboards.values() {
                for events in groups.values() {
                    for (event, filters) in events {
                        let bucket = by_event.entry(*event).or_default();
                        for notifications in filters.values() {
                            bucket.extend(notifications.iter().cloned());
                        }
                    }
                }
            }
        }
        by_event
    }

    /// Every accumulated notification, in unspecified user order.
    pub fn iter_all(&self) -> impl Iterator<Item = &Notification> {
        self.by_user
            .values()
            .flat_map(|d| d.values())
            .flat_map(|g| g.values())
            .flat_map(|e| e.values())
            .flat_map(|f| f.values())
            .flatten()
    }
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

    fn notification(user_id: DbId, subscription_id: DbId, epoch: u64) -> Notification {
        Arc::new(AttestationMissedNotification {
            meta: NotificationMetadata {
                subscription_id,
                user_id,
                epoch,
                event_name: EventName::ValidatorAttestationMissed,
                event_filter: "0xabc".to_string(),
                dashboard_id: None,
                dashboard_name: None,
                group_id: None,
                group_name: None,
            },
            validator_index: 42,
        })
    }

    #[test]
    fn add_groups_by_user_and_event() {
        let mut acc = NotificationsPerUserId::new();
        acc.add(notification(1, 10, 101));
        acc.add(notification(2, 11, 101));

        assert_eq!(acc.user_ids(), vec![1, 2]);
        assert_eq!(acc.total(), 2);
        let events = acc.events_for_user(1);
        assert_eq!(
            events[&EventName::ValidatorAttestationMissed].len(),
            1
        );
    }

    #[test]
    fn map_does_not_deduplicate_on_its_own() {
        // The at-most-once guarantee lives in the upstream cooldown filter;
        // bypassing it must be observable here.
        let mut acc = NotificationsPerUserId::new();
        acc.add(notification(1, 10, 101));
        acc.add(notification(1, 10, 101));
        assert_eq!(acc.total(), 2);
    }

    #[test]
    fn empty_accumulator() {
        let acc = NotificationsPerUserId::new();
        assert!(acc.is_empty());
        assert_eq!(acc.total(), 0);
        assert!(acc.events_for_user(1).is_empty());
    }
}
