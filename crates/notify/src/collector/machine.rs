//! Monitoring-machine sub-collector.
//!
//! All four machine alerts share one generic driver: load the event's
//! subscriptions, fetch current + 5-minute-old metrics for every
//! subscribed machine, apply the event's predicate, and emit — unless the
//! would-notify ratio looks like a false-positive flood.

use std::sync::Arc;

use chrono::Utc;

use chainpulse_core::events::EventName;
use chainpulse_db::metrics::{MachineKey, MachineMetricsStore, MetricsPair};
use chainpulse_db::models::subscription::Subscription;
use chainpulse_db::repositories::SubscriptionRepo;

use crate::accumulator::NotificationsPerUserId;
use crate::error::CollectError;
use crate::types::machine::MachineEventNotification;

use super::CollectContext;

/// A machine is offline once it has not reported for this long.
const OFFLINE_CUTOFF_MINUTES: i64 = 10;

/// Per-event epoch cooldowns: a machine alert does not repeat until this
/// many epochs have passed since the subscription last fired.
const COOLDOWN_OFFLINE: u64 = 10;
const COOLDOWN_DISK: u64 = 750;
const COOLDOWN_CPU: u64 = 10;
const COOLDOWN_MEMORY: u64 = 10;

/// Default thresholds applied when the subscription carries none.
const DEFAULT_DISK_USAGE: f64 = 0.9;
const DEFAULT_CPU_LOAD: f64 = 0.6;
const DEFAULT_MEMORY_USAGE: f64 = 0.8;

/// Stateful driver for the four machine events.
///
/// Carries the breaker state explicitly: after the machine-offline ratio
/// breaker trips, the next check runs with the lower first-check ratio to
/// catch early flapping, then reverts to the normal ratio.
pub struct MachineCollector {
    offline_breaker_tripped: bool,
}

impl MachineCollector {
    pub fn new() -> Self {
        Self {
            offline_breaker_tripped: false,
        }
    }

    /// Run all four machine events for this pass.
    pub(super) async fn collect(
        &mut self,
        ctx: &CollectContext<'_>,
        store: &dyn MachineMetricsStore,
        acc: &mut NotificationsPerUserId,
    ) -> Result<(), CollectError> {
        self.collect_event(
            ctx,
            store,
            acc,
            EventName::MonitoringMachineOffline,
            COOLDOWN_OFFLINE,
            offline_predicate,
        )
        .await?;
        self.collect_event(
            ctx,
            store,
            acc,
            EventName::MonitoringMachineDiskAlmostFull,
            COOLDOWN_DISK,
            disk_predicate,
        )
        .await?;
        self.collect_event(
            ctx,
            store,
            acc,
            EventName::MonitoringMachineCpuLoad,
            COOLDOWN_CPU,
            cpu_predicate,
        )
        .await?;
        self.collect_event(
            ctx,
            store,
            acc,
            EventName::MonitoringMachineMemoryUsage,
            COOLDOWN_MEMORY,
            memory_predicate,
        )
        .await?;
        Ok(())
    }

    /// Generic machine event driver.
    async fn collect_event(
        &mut self,
        ctx: &CollectContext<'_>,
        store: &dyn MachineMetricsStore,
        acc: &mut NotificationsPerUserId,
        event: EventName,
        cooldown_epochs: u64,
        predicate: fn(&MetricsPair, f64) -> bool,
    ) -> Result<(), CollectError> {
        let subs = SubscriptionRepo::list_for_event(ctx.pool, event.as_str()).await?;
        if subs.is_empty() {
            return Ok(());
        }

        let keys: Vec<MachineKey> = subs
            .iter()
            .map(|s| MachineKey {
                user_id: s.user_id,
                machine: s.event_filter.clone(),
            })
            .collect();
        let metrics = store.machine_metrics(&keys).await?;

        let candidates: Vec<&Subscription> = subs
            .iter()
            .filter(|sub| {
                let key = MachineKey {
                    user_id: sub.user_id,
                    machine: sub.event_filter.clone(),
                };
                metrics
                    .get(&key)
                    .map(|pair| predicate(pair, sub.event_threshold))
                    .unwrap_or(false)
            })
            .collect();

        let ratio_limit = self.ratio_limit_for(ctx, event);
        if ratio_breaker_trips(
            subs.len(),
            candidates.len(),
            ctx.config.machine_breaker_min_subs,
            ratio_limit,
        ) {
            if event == EventName::MonitoringMachineOffline {
                self.offline_breaker_tripped = true;
            }
            tracing::warn!(
                event = %event,
                subscribed = subs.len(),
                would_notify = candidates.len(),
                ratio_limit,
                "Machine event ratio breaker tripped, skipping event for this pass"
            );
            return Ok(());
        }
        if event == EventName::MonitoringMachineOffline {
            self.offline_breaker_tripped = false;
        }

        for sub in candidates {
            if suppressed_by_cooldown(sub, ctx.epoch, cooldown_epochs) {
                continue;
            }
            acc.add(Arc::new(MachineEventNotification {
                meta: ctx.metadata_for(sub, event),
                machine: sub.event_filter.clone(),
            }));
        }
        Ok(())
    }

    /// The ratio limit for this event on this pass: machine-offline uses
    /// the lower first-check ratio right after a trip.
    fn ratio_limit_for(&self, ctx: &CollectContext<'_>, event: EventName) -> f64 {
        if event == EventName::MonitoringMachineOffline && self.offline_breaker_tripped {
            ctx.config.machine_offline_first_ratio
        } else {
            ctx.config.machine_breaker_ratio
        }
    }
}

impl Default for MachineCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the would-notify volume looks anomalous.
pub(super) fn ratio_breaker_trips(
    subscribed: usize,
    would_notify: usize,
    min_subs: usize,
    ratio_limit: f64,
) -> bool {
    subscribed >= min_subs && would_notify as f64 / subscribed as f64 > ratio_limit
}

/// Machine-event cooldown: suppress until `cooldown_epochs` epochs have
/// passed since the last send (and never before the subscription existed).
pub(super) fn suppressed_by_cooldown(sub: &Subscription, epoch: u64, cooldown_epochs: u64) -> bool {
    let epoch = epoch as i64;
    if epoch < sub.created_epoch {
        return true;
    }
    matches!(sub.last_sent_epoch, Some(last) if last + cooldown_epochs as i64 > epoch)
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

fn offline_predicate(pair: &MetricsPair, _threshold: f64) -> bool {
    match pair.current.timestamp {
        Some(ts) => Utc::now() - ts > chrono::Duration::minutes(OFFLINE_CUTOFF_MINUTES),
        None => false,
    }
}

fn disk_predicate(pair: &MetricsPair, threshold: f64) -> bool {
    let m = &pair.current;
    if m.disk_node_bytes_total <= 0 {
        return false;
    }
    let usage = 1.0 - m.disk_node_bytes_free as f64 / m.disk_node_bytes_total as f64;
    usage >= effective_threshold(threshold, DEFAULT_DISK_USAGE)
}

fn cpu_predicate(pair: &MetricsPair, threshold: f64) -> bool {
    let Some(old) = &pair.five_minutes_ago else {
        return false;
    };
    let m = &pair.current;
    let system_delta = m.cpu_node_system_seconds_total - old.cpu_node_system_seconds_total;
    let idle_delta = m.cpu_node_idle_seconds_total - old.cpu_node_idle_seconds_total;
    if system_delta <= 0 || idle_delta < 0 {
        return false;
    }
    let load = 1.0 - idle_delta as f64 / system_delta as f64;
    load >= effective_threshold(threshold, DEFAULT_CPU_LOAD)
}

fn memory_predicate(pair: &MetricsPair, threshold: f64) -> bool {
    let m = &pair.current;
    if m.memory_node_bytes_total <= 0 {
        return false;
    }
    let available =
        m.memory_node_bytes_free + m.memory_node_bytes_cached + m.memory_node_bytes_buffers;
    let usage = 1.0 - available as f64 / m.memory_node_bytes_total as f64;
    usage >= effective_threshold(threshold, DEFAULT_MEMORY_USAGE)
}

/// Subscriptions carry `0` when the user never set a threshold.
fn effective_threshold(threshold: f64, default: f64) -> f64 {
    if threshold > 0.0 {
        threshold
    } else {
        default
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chainpulse_db::metrics::SystemMetrics;

    use super::*;

    fn sub(created_epoch: i64, last_sent_epoch: Option<i64>, threshold: f64) -> Subscription {
        Subscription {
            id: 1,
            user_id: 1,
            event_name: "monitoring_machine_offline".to_string(),
            event_filter: "rpi-01".to_string(),
            dashboard_id: None,
            group_id: None,
            event_threshold: threshold,
            created_ts: Utc::now(),
            created_epoch,
            last_sent_ts: None,
            last_sent_epoch,
            internal_state: None,
        }
    }

    #[test]
    fn ratio_breaker_requires_minimum_subscribers() {
        // 9 subscribed, all would notify: below the activation floor.
        assert!(!ratio_breaker_trips(9, 9, 10, 0.9));
        // 10 subscribed, all would notify: 100% > 90%.
        assert!(ratio_breaker_trips(10, 10, 10, 0.9));
        // 10 subscribed, 9 would notify: exactly 90% is allowed.
        assert!(!ratio_breaker_trips(10, 9, 10, 0.9));
        // First check after a trip uses the lower ratio.
        assert!(ratio_breaker_trips(10, 4, 10, 0.3));
    }

    #[test]
    fn machine_cooldown_spans_multiple_epochs() {
        let s = sub(100, Some(100), 0.0);
        // Cooldown of 10 epochs: suppressed until epoch 110.
        assert!(suppressed_by_cooldown(&s, 105, 10));
        assert!(suppressed_by_cooldown(&s, 109, 10));
        assert!(!suppressed_by_cooldown(&s, 110, 10));
    }

    #[test]
    fn offline_predicate_uses_report_age() {
        let fresh = MetricsPair {
            current: SystemMetrics {
                timestamp: Some(Utc::now()),
                ..Default::default()
            },
            five_minutes_ago: None,
        };
        assert!(!offline_predicate(&fresh, 0.0));

        let stale = MetricsPair {
            current: SystemMetrics {
                timestamp: Some(Utc::now() - chrono::Duration::minutes(30)),
                ..Default::default()
            },
            five_minutes_ago: None,
        };
        assert!(offline_predicate(&stale, 0.0));
    }

    #[test]
    fn disk_predicate_fires_on_near_full_disk() {
        let pair = MetricsPair {
            current: SystemMetrics {
                disk_node_bytes_total: 100,
                disk_node_bytes_free: 5,
                ..Default::default()
            },
            five_minutes_ago: None,
        };
        assert!(disk_predicate(&pair, 0.0));
        // An explicit 99% threshold tolerates 95% usage.
        assert!(!disk_predicate(&pair, 0.99));
    }

    #[test]
    fn cpu_predicate_needs_the_five_minute_sample() {
        let pair = MetricsPair {
            current: SystemMetrics {
                cpu_node_system_seconds_total: 1000,
                cpu_node_idle_seconds_total: 100,
                ..Default::default()
            },
            five_minutes_ago: None,
        };
        assert!(!cpu_predicate(&pair, 0.0));

        let pair = MetricsPair {
            current: SystemMetrics {
                cpu_node_system_seconds_total: 1300,
                cpu_node_idle_seconds_total: 130,
                ..Default::default()
            },
            five_minutes_ago: Some(SystemMetrics {
                cpu_node_system_seconds_total: 1000,
                cpu_node_idle_seconds_total: 100,
                ..Default::default()
            }),
        };
        // 300s window, 30s idle: 90% load.
        assert!(cpu_predicate(&pair, 0.0));
        assert!(!cpu_predicate(&pair, 0.95));
    }

    #[test]
    fn memory_predicate_counts_cache_as_available() {
        let pair = MetricsPair {
            current: SystemMetrics {
                memory_node_bytes_total: 100,
                memory_node_bytes_free: 5,
                memory_node_bytes_cached: 40,
                memory_node_bytes_buffers: 5,
                ..Default::default()
            },
            five_minutes_ago: None,
        };
        // 50% usage: under the 80% default.
        assert!(!memory_predicate(&pair, 0.0));

        let pair = MetricsPair {
            current: SystemMetrics {
                memory_node_bytes_total: 100,
                memory_node_bytes_free: 5,
                memory_node_bytes_cached: 5,
                memory_node_bytes_buffers: 0,
                ..Default::default()
            },
            five_minutes_ago: None,
        };
        assert!(memory_predicate(&pair, 0.0));
    }
}
