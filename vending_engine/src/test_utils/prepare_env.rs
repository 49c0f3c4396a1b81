use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::{
    db_types::{NewProduct, Product},
    traits::InventoryManagement,
    SqliteDatabase,
};

const TEST_DATA_DIR: &str = "../data";

pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await
}

pub fn random_db_path() -> String {
    format!("sqlite://{TEST_DATA_DIR}/test_vending_{}.db", rand::random::<u64>())
}

pub async fn run_migrations(url: &str) -> SqliteDatabase {
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
    db
}

pub async fn create_database(url: &str) {
    std::fs::create_dir_all(TEST_DATA_DIR).expect("Error creating test data directory");
    if Sqlite::database_exists(url).await.unwrap_or(false) {
        if let Err(e) = Sqlite::drop_database(url).await {
            warn!("🚀️ Error dropping database {url}: {e:?}");
        }
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    info!("🚀️ Created Sqlite database {url}");
}

/// Stocks the machine with the given products, in order.
pub async fn seed_products(db: &SqliteDatabase, products: Vec<NewProduct>) -> Vec<Product> {
    let mut result = Vec::with_capacity(products.len());
    for p in products {
        result.push(db.insert_product(p).await.expect("Error seeding product"));
    }
    result
}
