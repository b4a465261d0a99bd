//! User-scoped sub-collectors: monthly tax reports.

use std::sync::Arc;

use chrono::Datelike;

use chainpulse_core::events::EventName;
use chainpulse_db::repositories::{EpochRepo, SubscriptionRepo, TaxReportRepo};

use crate::accumulator::NotificationsPerUserId;
use crate::error::CollectError;
use crate::types::tax::TaxReportNotification;

use super::CollectContext;

/// Tax reports fire on the first epoch of a new month, carrying the
/// previous month's PDF as an attachment.
pub(super) async fn collect_tax_reports(
    ctx: &CollectContext<'_>,
    acc: &mut NotificationsPerUserId,
) -> Result<(), CollectError> {
    let epoch = ctx.epoch as i64;
    if epoch == 0 {
        return Ok(());
    }
    let Some(current_ts) = EpochRepo::epoch_timestamp(ctx.pool, epoch).await? else {
        return Ok(());
    };
    let Some(previous_ts) = EpochRepo::epoch_timestamp(ctx.pool, epoch - 1).await? else {
        return Ok(());
    };
    if !month_rolled_over(previous_ts.date_naive(), current_ts.date_naive()) {
        return Ok(());
    }

    let report_month = first_of_month(previous_ts.date_naive());
    let subs =
        SubscriptionRepo::list_for_event(ctx.pool, EventName::UserTaxReport.as_str()).await?;
    for sub in &subs {
        if sub.should_suppress_for_epoch(ctx.epoch) {
            continue;
        }
        let Some(report) =
            TaxReportRepo::report_for_month(ctx.pool, sub.user_id, report_month).await?
        else {
            continue;
        };
        acc.add(Arc::new(TaxReportNotification {
            meta: ctx.metadata_for(sub, EventName::UserTaxReport),
            month: report_month,
            report_pdf: report.report,
        }));
    }
    Ok(())
}

fn month_rolled_over(previous: chrono::NaiveDate, current: chrono::NaiveDate) -> bool {
    (previous.year(), previous.month()) != (current.year(), current.month())
}

fn first_of_month(date: chrono::NaiveDate) -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> chrono::NaiveDate {
        chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rollover_detects_month_boundary() {
        assert!(month_rolled_over(date(2024, 3, 31), date(2024, 4, 1)));
        assert!(month_rolled_over(date(2024, 12, 31), date(2025, 1, 1)));
        assert!(!month_rolled_over(date(2024, 3, 30), date(2024, 3, 31)));
    }

    #[test]
    fn report_month_is_the_month_that_ended() {
        assert_eq!(first_of_month(date(2024, 3, 31)), date(2024, 3, 1));
    }
}
