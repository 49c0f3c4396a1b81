use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewReport, Report},
    traits::{ReportApiError, ReportManagement},
};

/// The number of reports returned by [`ReportSink::list`] when no limit is given.
pub const DEFAULT_REPORT_LIMIT: i64 = 100;

/// Append-only fault and audit log.
///
/// Recording is best-effort. A report that cannot be stored is logged and dropped, and the caller carries on.
#[derive(Clone)]
pub struct ReportSink<B> {
    db: B,
}

impl<B> Debug for ReportSink<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReportSink")
    }
}

impl<B> ReportSink<B>
where B: ReportManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Stores a report. Returns the stored entry, or `None` if it could not be written.
    pub async fn record(&self, report: NewReport) -> Option<Report> {
        let summary = format!("{} on {}: {}", report.report_type, report.machine_id, report.description);
        match self.db.insert_report(report).await {
            Ok(r) => {
                info!("📝️ Report #{} filed. {summary}", r.id);
                Some(r)
            },
            Err(e) => {
                error!("📝️ Could not store report ({summary}). {e}");
                None
            },
        }
    }

    /// Stores all of the given reports, returning the ones that were written.
    pub async fn record_all(&self, reports: Vec<NewReport>) -> Vec<Report> {
        let mut stored = Vec::with_capacity(reports.len());
        for report in reports {
            if let Some(r) = self.record(report).await {
                stored.push(r);
            }
        }
        stored
    }

    /// The most recent reports, newest first.
    pub async fn list(&self, limit: Option<i64>) -> Result<Vec<Report>, ReportApiError> {
        self.db.fetch_reports(limit.unwrap_or(DEFAULT_REPORT_LIMIT)).await
    }
}
