use thiserror::Error;

use crate::db_types::{NewReport, Report};

#[derive(Debug, Clone, Error)]
pub enum ReportApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for ReportApiError {
    fn from(e: sqlx::Error) -> Self {
        ReportApiError::DatabaseError(e.to_string())
    }
}

/// Storage contract for the append-only fault and audit trail.
#[allow(async_fn_in_trait)]
pub trait ReportManagement {
    async fn insert_report(&self, report: NewReport) -> Result<Report, ReportApiError>;

    /// Most recent first.
    async fn fetch_reports(&self, limit: i64) -> Result<Vec<Report>, ReportApiError>;
}
