use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{Cents, NewProduct, Product, ProductStatus};

#[derive(Debug, Clone, Error)]
pub enum InventoryApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
    #[error("A product already occupies slot {0}")]
    PositionTaken(String),
}

impl From<sqlx::Error> for InventoryApiError {
    fn from(e: sqlx::Error) -> Self {
        InventoryApiError::DatabaseError(e.to_string())
    }
}

/// The `InventoryManagement` trait defines the storage contract for products.
///
/// Backends must make [`reserve_one`](InventoryManagement::reserve_one) a single conditional write: the decrement
/// only happens if stock is still positive at the moment of the write. The ledger adds a per-product critical section
/// on top, but the backend guarantee is what keeps stock from ever going negative when several processes share a
/// database.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, InventoryApiError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, InventoryApiError>;

    async fn fetch_product_by_position(&self, position: &str) -> Result<Option<Product>, InventoryApiError>;

    async fn fetch_products(&self) -> Result<Vec<Product>, InventoryApiError>;

    /// Decrements stock by one, recomputes the status and stamps `last_sold`, but only if stock is positive.
    /// Returns `None` if the product does not exist or has no stock left.
    async fn reserve_one(&self, product_id: i64, sold_at: DateTime<Utc>) -> Result<Option<Product>, InventoryApiError>;

    /// Increments stock by one and recomputes the status. `last_sold` is not touched.
    /// Returns `None` if the product does not exist.
    async fn restore_one(&self, product_id: i64) -> Result<Option<Product>, InventoryApiError>;

    /// The cheapest sellable product costing at most `max_price`, ignoring the ids in `exclude`. Ties are broken by
    /// ascending id.
    async fn fetch_cheapest_alternative(
        &self,
        max_price: Cents,
        exclude: &[i64],
    ) -> Result<Option<Product>, InventoryApiError>;

    /// Overwrites the stock level and status of a product. Returns `None` if the product does not exist.
    async fn update_stock(
        &self,
        product_id: i64,
        stock: i64,
        status: ProductStatus,
    ) -> Result<Option<Product>, InventoryApiError>;
}
