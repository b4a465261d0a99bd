//! Chainpulse notification pipeline.
//!
//! Watches chain state advance one finalized epoch at a time, detects
//! validator/machine/network events, and fans them out across four delivery
//! channels with per-channel retry and backoff. Three stages form one
//! pipeline:
//!
//! - [`collector`] — turns raw per-epoch chain/DB state into a typed,
//!   deduplicated notification set per user.
//! - [`queuing`] — renders that set into channel payloads and persists
//!   them durably, in one transaction with the epoch marker and the
//!   per-subscription cooldown update.
//! - [`sender`] — drains the durable queue with channel-specific delivery,
//!   retry, and garbage-collection policies, under a cluster-wide advisory
//!   lock.

pub mod accumulator;
pub mod collector;
pub mod config;
pub mod delivery;
pub mod error;
pub mod queuing;
pub mod sender;
pub mod types;

pub use accumulator::NotificationsPerUserId;
pub use collector::NotificationCollector;
pub use config::NotifyConfig;
pub use error::CollectError;
pub use sender::NotificationSender;
