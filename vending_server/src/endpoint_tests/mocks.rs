use chrono::{DateTime, Utc};
use mockall::mock;
use vending_engine::{
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

mock! {
    pub VendingBackend {}
    impl InventoryManagement for VendingBackend {
        async fn insert_product(&self, product: NewProduct) -> Result<Product, InventoryApiError>;
        async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, InventoryApiError>;
        async fn fetch_product_by_position(&self, position: &str) -> Result<Option<Product>, InventoryApiError>;
        async fn fetch_products(&self) -> Result<Vec<Product>, InventoryApiError>;
        async fn reserve_one(&self, product_id: i64, sold_at: DateTime<Utc>) -> Result<Option<Product>, InventoryApiError>;
        async fn restore_one(&self, product_id: i64) -> Result<Option<Product>, InventoryApiError>;
        async fn fetch_cheapest_alternative(&self, max_price: Cents, exclude: &[i64]) -> Result<Option<Product>, InventoryApiError>;
        async fn update_stock(&self, product_id: i64, stock: i64, status: ProductStatus) -> Result<Option<Product>, InventoryApiError>;
    }
    impl SalesManagement for VendingBackend {
        async fn insert_sale(&self, sale: NewSale) -> Result<Sale, SalesApiError>;
        async fn fetch_sale(&self, sale_id: i64) -> Result<Option<Sale>, SalesApiError>;
        async fn fetch_sales(&self, limit: i64) -> Result<Vec<Sale>, SalesApiError>;
        async fn update_sale_status(&self, sale_id: i64, expected: SaleStatus, new_status: SaleStatus) -> Result<Option<Sale>, SalesApiError>;
    }
    impl ReportManagement for VendingBackend {
        async fn insert_report(&self, report: NewReport) -> Result<Report, ReportApiError>;
        async fn fetch_reports(&self, limit: i64) -> Result<Vec<Report>, ReportApiError>;
    }
    impl VendingDatabase for VendingBackend {
        fn url(&self) -> &str;
    }
    impl Clone for VendingBackend {
        fn clone(&self) -> Self;
    }
}

/// A mock backend whose clones carry the same expectations. The engine clones its backend into every component.
pub fn mock_backend(configure: fn(&mut MockVendingBackend)) -> MockVendingBackend {
    let mut backend = MockVendingBackend::new();
    configure(&mut backend);
    backend.expect_clone().returning(move || mock_backend(configure));
    backend
}
