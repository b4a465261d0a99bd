//! Repository for the `tax_reports` table.

use sqlx::PgPool;

use chainpulse_core::types::DbId;

use crate::models::user::TaxReportRow;

/// Provides the generated-report lookup for tax-report notifications.
pub struct TaxReportRepo;

impl TaxReportRepo {
    /// The report generated for a user for the given month, if present.
    pub async fn report_for_month(
        pool: &PgPool,
        user_id: DbId,
        month: chrono::NaiveDate,
    ) -> Result<Option<TaxReportRow>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, user_id, month, report FROM tax_reports \
             WHERE user_id = $1 AND month = $2",
        )
        .bind(user_id)
        .bind(month)
        .fetch_optional(pool)
        .await
    }
}
