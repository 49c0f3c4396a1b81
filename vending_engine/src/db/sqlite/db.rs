use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::{db_url, new_pool, products, reports, sales, SqliteDatabaseError};
use crate::{
    db_types::{Cents, NewProduct, NewReport, NewSale, Product, ProductStatus, Report, Sale, SaleStatus},
    traits::{
        InventoryApiError,
        InventoryManagement,
        ReportApiError,
        ReportManagement,
        SalesApiError,
        SalesManagement,
        VendingDatabase,
    },
};

/// Every write is committed in its own transaction before its connection goes back to the pool.
#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl VendingDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, InventoryApiError> {
        let mut tx = self.pool.begin().await?;
        let product = products::insert_product(product, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, InventoryApiError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_product_by_position(&self, position: &str) -> Result<Option<Product>, InventoryApiError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product_by_position(position, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_products(&self) -> Result<Vec<Product>, InventoryApiError> {
        let mut conn = self.pool.acquire().await?;
        let products = products::fetch_products(&mut conn).await?;
        Ok(products)
    }

    async fn reserve_one(&self, product_id: i64, sold_at: DateTime<Utc>) -> Result<Option<Product>, InventoryApiError> {
        let mut tx = self.pool.begin().await?;
        let product = products::reserve_one(product_id, sold_at, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn restore_one(&self, product_id: i64) -> Result<Option<Product>, InventoryApiError> {
        let mut tx = self.pool.begin().await?;
        let product = products::restore_one(product_id, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn fetch_cheapest_alternative(
        &self,
        max_price: Cents,
        exclude: &[i64],
    ) -> Result<Option<Product>, InventoryApiError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_cheapest_alternative(max_price, exclude, &mut conn).await?;
        Ok(product)
    }

    async fn update_stock(
        &self,
        product_id: i64,
        stock: i64,
        status: ProductStatus,
    ) -> Result<Option<Product>, InventoryApiError> {
        let mut tx = self.pool.begin().await?;
        let product = products::update_stock(product_id, stock, status, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }
}

impl SalesManagement for SqliteDatabase {
    async fn insert_sale(&self, sale: NewSale) -> Result<Sale, SalesApiError> {
        let mut tx = self.pool.begin().await?;
        let sale = sales::insert_sale(sale, &mut tx).await?;
        tx.commit().await?;
        Ok(sale)
    }

    async fn fetch_sale(&self, sale_id: i64) -> Result<Option<Sale>, SalesApiError> {
        let mut conn = self.pool.acquire().await?;
        let sale = sales::fetch_sale(sale_id, &mut conn).await?;
        Ok(sale)
    }

    async fn fetch_sales(&self, limit: i64) -> Result<Vec<Sale>, SalesApiError> {
        let mut conn = self.pool.acquire().await?;
        let sales = sales::fetch_sales(limit, &mut conn).await?;
        Ok(sales)
    }

    async fn update_sale_status(
        &self,
        sale_id: i64,
        expected: SaleStatus,
        new_status: SaleStatus,
    ) -> Result<Option<Sale>, SalesApiError> {
        let mut tx = self.pool.begin().await?;
        let sale = sales::update_sale_status(sale_id, expected, new_status, &mut tx).await?;
        tx.commit().await?;
        Ok(sale)
    }
}

impl ReportManagement for SqliteDatabase {
    async fn insert_report(&self, report: NewReport) -> Result<Report, ReportApiError> {
        let mut tx = self.pool.begin().await?;
        let report = reports::insert_report(report, &mut tx).await?;
        tx.commit().await?;
        Ok(report)
    }

    async fn fetch_reports(&self, limit: i64) -> Result<Vec<Report>, ReportApiError> {
        let mut conn = self.pool.acquire().await?;
        let reports = reports::fetch_reports(limit, &mut conn).await?;
        Ok(reports)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `VMS_DATABASE_URL`
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
