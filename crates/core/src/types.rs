/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Beacon chain epoch number.
///
/// Stored as BIGINT in the database; epochs are monotonically increasing
/// and small enough that the `i64`/`u64` distinction never matters in
/// practice.
pub type Epoch = u64;

/// Number of consecutive slots per epoch (mainnet).
pub const SLOTS_PER_EPOCH: u64 = 32;

/// Number of epochs per sync committee period (mainnet).
pub const EPOCHS_PER_SYNC_PERIOD: u64 = 256;
