use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use vending_engine::{
    db_types::{Cents, NewProduct, PaymentMethod, Product},
    traits::{InventoryManagement, VendingDatabase},
    PaymentSession,
    Reconciler,
    SessionConfig,
    SessionStore,
    SqliteDatabase,
};

pub const MACHINE: &str = "vm-1";

pub fn random_db_path() -> String {
    format!("sqlite://../data/test_vending_{}.db", rand::random::<u64>())
}

pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    std::fs::create_dir_all("../data").expect("Error creating test data directory");
    if Sqlite::database_exists(url).await.unwrap_or(false) {
        Sqlite::drop_database(url).await.expect("Error dropping old test database");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    debug!("🚀️ Test database ready at {url}");
    db
}

pub async fn tear_down(db: SqliteDatabase) {
    let url = db.url().to_string();
    db.close().await;
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Could not drop test database {url}: {e}");
    }
}

pub async fn seed(db: &SqliteDatabase, products: Vec<NewProduct>) -> Vec<Product> {
    let mut result = Vec::with_capacity(products.len());
    for p in products {
        result.push(db.insert_product(p).await.expect("Error seeding product"));
    }
    result
}

pub fn product(name: &str, price: i64, stock: i64, position: &str) -> NewProduct {
    NewProduct::new(name, Cents::from(price), stock, position).with_minimum_stock(2)
}

/// A reconciler over a fresh database stocked with `products`.
pub async fn setup(products: Vec<NewProduct>) -> (Reconciler<SqliteDatabase>, Vec<Product>) {
    setup_with_config(products, SessionConfig::default()).await
}

pub async fn setup_with_config(
    products: Vec<NewProduct>,
    config: SessionConfig,
) -> (Reconciler<SqliteDatabase>, Vec<Product>) {
    let db = prepare_test_env(&random_db_path()).await;
    let products = seed(&db, products).await;
    (Reconciler::new(db, SessionStore::new(config)), products)
}

/// Opens a session on `machine` and pays it through the web flow.
pub async fn paid_session(reconciler: &Reconciler<SqliteDatabase>, amount: i64, machine: &str) -> PaymentSession {
    let session = reconciler.create_session(Cents::from(amount), Some(machine)).expect("Error creating session");
    reconciler.pay_session(&session.session_id, Some(PaymentMethod::Web)).await.expect("Error paying session")
}

pub async fn stock_of(reconciler: &Reconciler<SqliteDatabase>, product_id: i64) -> i64 {
    reconciler.ledger().find(product_id).await.expect("Error fetching product").expect("Product not found").stock
}
