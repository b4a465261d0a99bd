//! Repository layer: typed queries over the chain-fact and notification
//! tables. Repositories are stateless unit structs with static async
//! methods over `&PgPool` (or a transaction executor where a write must
//! join the queuing transaction).

mod chain_repo;
mod client_release_repo;
mod dashboard_repo;
mod epoch_repo;
mod queue_repo;
mod recipient_repo;
mod rocketpool_repo;
mod subscription_repo;
mod tax_report_repo;
mod webhook_repo;

pub use chain_repo::ChainRepo;
pub use client_release_repo::ClientReleaseRepo;
pub use dashboard_repo::DashboardRepo;
pub use epoch_repo::EpochRepo;
pub use queue_repo::QueueRepo;
pub use recipient_repo::RecipientRepo;
pub use rocketpool_repo::RocketpoolRepo;
pub use subscription_repo::SubscriptionRepo;
pub use tax_report_repo::TaxReportRepo;
pub use webhook_repo::WebhookRepo;
