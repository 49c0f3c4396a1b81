use thiserror::Error;

use crate::db_types::{NewSale, Sale, SaleStatus};

#[derive(Debug, Clone, Error)]
pub enum SalesApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
}

impl From<sqlx::Error> for SalesApiError {
    fn from(e: sqlx::Error) -> Self {
        SalesApiError::DatabaseError(e.to_string())
    }
}

/// Storage contract for the sales journal. Sales are only ever inserted or have their status changed.
#[allow(async_fn_in_trait)]
pub trait SalesManagement {
    async fn insert_sale(&self, sale: NewSale) -> Result<Sale, SalesApiError>;

    async fn fetch_sale(&self, sale_id: i64) -> Result<Option<Sale>, SalesApiError>;

    /// Most recent first.
    async fn fetch_sales(&self, limit: i64) -> Result<Vec<Sale>, SalesApiError>;

    /// Moves the sale to `new_status`, but only if it currently has status `expected`. This makes status changes safe
    /// to repeat: a second call finds the sale in the new state and returns `None`.
    async fn update_sale_status(
        &self,
        sale_id: i64,
        expected: SaleStatus,
        new_status: SaleStatus,
    ) -> Result<Option<Sale>, SalesApiError>;
}
