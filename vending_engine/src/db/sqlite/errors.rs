use thiserror::Error;

use crate::traits::{InventoryApiError, ReportApiError, SalesApiError};

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Database query error: {0}")]
    QueryError(String),
    #[error("A product already occupies slot {0}")]
    DuplicatePosition(String),
}

impl From<SqliteDatabaseError> for InventoryApiError {
    fn from(e: SqliteDatabaseError) -> Self {
        match e {
            SqliteDatabaseError::QueryError(s) => Self::QueryError(s),
            SqliteDatabaseError::DuplicatePosition(p) => Self::PositionTaken(p),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

impl From<SqliteDatabaseError> for SalesApiError {
    fn from(e: SqliteDatabaseError) -> Self {
        match e {
            SqliteDatabaseError::QueryError(s) => Self::QueryError(s),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

impl From<SqliteDatabaseError> for ReportApiError {
    fn from(e: SqliteDatabaseError) -> Self {
        Self::DatabaseError(e.to_string())
    }
}
