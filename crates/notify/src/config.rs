//! Pipeline configuration loaded from environment variables.

use std::time::Duration;

/// Tunable parameters for the collector and sender loops.
///
/// Loaded once at startup via [`NotifyConfig::from_env`]; every variable
/// has a default so an empty environment yields a working configuration.
///
/// | Variable                            | Default | Meaning                                        |
/// |-------------------------------------|---------|------------------------------------------------|
/// | `NOTIF_COLLECTOR_INTERVAL_SECS`     | `60`    | Collector loop tick                            |
/// | `NOTIF_SENDER_INTERVAL_SECS`        | `30`    | Sender loop tick                               |
/// | `NOTIF_EPOCH_LOOKBACK`              | `5`     | Max epochs of catch-up per loop iteration      |
/// | `NOTIF_OFFLINE_BREAKER_LIMIT`       | `5000`  | Max newly-offline/online validators per pass   |
/// | `NOTIF_MACHINE_BREAKER_MIN_SUBS`    | `10`    | Machine-event ratio breaker activation floor   |
/// | `NOTIF_MACHINE_BREAKER_RATIO`       | `0.9`   | Machine-event would-notify ratio limit         |
/// | `NOTIF_MACHINE_OFFLINE_FIRST_RATIO` | `0.3`   | Lower ratio for the first check after a trip   |
/// | `NOTIF_FINALITY_DELAY_THRESHOLD`    | `4`     | Epochs of finality delay before alerting       |
/// | `NOTIF_SYNC_LOOKAHEAD_EPOCHS`       | `225`   | Epochs ahead of a sync period to notify        |
/// | `NOTIF_DISPATCH_TIMEOUT_SECS`       | `300`   | Overall bound on one dispatch cycle            |
/// | `NOTIF_DISPATCH_CONCURRENCY`        | `16`    | Concurrent webhook/Discord delivery tasks      |
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub collector_interval: Duration,
    pub sender_interval: Duration,
    pub epoch_lookback: u64,
    pub offline_breaker_limit: usize,
    pub machine_breaker_min_subs: usize,
    pub machine_breaker_ratio: f64,
    pub machine_offline_first_ratio: f64,
    pub finality_delay_threshold: u64,
    pub sync_lookahead_epochs: u64,
    pub dispatch_timeout: Duration,
    pub dispatch_concurrency: usize,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl NotifyConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            collector_interval: Duration::from_secs(env_parse(
                "NOTIF_COLLECTOR_INTERVAL_SECS",
                60,
            )),
            sender_interval: Duration::from_secs(env_parse("NOTIF_SENDER_INTERVAL_SECS", 30)),
            epoch_lookback: env_parse("NOTIF_EPOCH_LOOKBACK", 5),
            offline_breaker_limit: env_parse("NOTIF_OFFLINE_BREAKER_LIMIT", 5000),
            machine_breaker_min_subs: env_parse("NOTIF_MACHINE_BREAKER_MIN_SUBS", 10),
            machine_breaker_ratio: env_parse("NOTIF_MACHINE_BREAKER_RATIO", 0.9),
            machine_offline_first_ratio: env_parse("NOTIF_MACHINE_OFFLINE_FIRST_RATIO", 0.3),
            finality_delay_threshold: env_parse("NOTIF_FINALITY_DELAY_THRESHOLD", 4),
            sync_lookahead_epochs: env_parse("NOTIF_SYNC_LOOKAHEAD_EPOCHS", 225),
            dispatch_timeout: Duration::from_secs(env_parse("NOTIF_DISPATCH_TIMEOUT_SECS", 300)),
            dispatch_concurrency: env_parse("NOTIF_DISPATCH_CONCURRENCY", 16),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            collector_interval: Duration::from_secs(60),
            sender_interval: Duration::from_secs(30),
            epoch_lookback: 5,
            offline_breaker_limit: 5000,
            machine_breaker_min_subs: 10,
            machine_breaker_ratio: 0.9,
            machine_offline_first_ratio: 0.3,
            finality_delay_threshold: 4,
            sync_lookahead_epochs: 225,
            dispatch_timeout: Duration::from_secs(300),
            dispatch_concurrency: 16,
        }
    }
}
