//! Recipient row types.

use sqlx::FromRow;

use chainpulse_core::types::DbId;

/// A user's email address, for digest delivery.
#[derive(Debug, Clone, FromRow)]
pub struct UserEmail {
    pub user_id: DbId,
    pub email: String,
}

/// A registered mobile device push token.
#[derive(Debug, Clone, FromRow)]
pub struct UserPushToken {
    pub user_id: DbId,
    pub push_token: String,
}

/// A row from the `tax_reports` table.
#[derive(Debug, Clone, FromRow)]
pub struct TaxReportRow {
    pub id: DbId,
    pub user_id: DbId,
    pub month: chrono::NaiveDate,
    pub report: Vec<u8>,
}
