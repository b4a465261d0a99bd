//! Monthly tax report notification variant.

use super::{EmailAttachment, NotificationBody, NotificationFormat, NotificationMetadata};

/// The monthly tax report is ready; the PDF rides along as an email
/// attachment.
#[derive(Debug, Clone)]
pub struct TaxReportNotification {
    pub meta: NotificationMetadata,
    pub month: chrono::NaiveDate,
    pub report_pdf: Vec<u8>,
}

impl NotificationBody for TaxReportNotification {
    fn metadata(&self) -> &NotificationMetadata {
        &self.meta
    }

    fn title(&self) -> String {
        "Tax Report Ready".to_string()
    }

    fn info(&self, _format: NotificationFormat) -> String {
        format!(
            "Your tax report for {} is attached",
            self.month.format("%B %Y")
        )
    }

    fn email_attachment(&self) -> Option<EmailAttachment> {
        Some(EmailAttachment {
            filename: format!("tax_report_{}.pdf", self.month.format("%Y_%m")),
            content: self.report_pdf.clone(),
        })
    }
}
