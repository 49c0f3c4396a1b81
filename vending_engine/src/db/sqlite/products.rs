use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{Cents, NewProduct, Product, ProductStatus},
};

/// Inserts a new product. Slot labels are unique, so a second product in an occupied slot is rejected.
pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, SqliteDatabaseError> {
    let now = Utc::now();
    let status = product.initial_status();
    let result = sqlx::query_as::<_, Product>(
        r#"
            INSERT INTO products (name, price, stock, position, minimum_stock, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *;
        "#,
    )
    .bind(&product.name)
    .bind(product.price)
    .bind(product.stock)
    .bind(&product.position)
    .bind(product.minimum_stock)
    .bind(status)
    .bind(now)
    .fetch_one(conn)
    .await;
    match result {
        Ok(p) => {
            debug!("🗃️ Product #{} '{}' stocked in slot {}", p.id, p.name, p.position);
            Ok(p)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(SqliteDatabaseError::DuplicatePosition(product.position))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, SqliteDatabaseError> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

pub async fn fetch_product_by_position(
    position: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, SqliteDatabaseError> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE position = $1")
        .bind(position)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

pub async fn fetch_products(conn: &mut SqliteConnection) -> Result<Vec<Product>, SqliteDatabaseError> {
    let products = sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY position ASC").fetch_all(conn).await?;
    Ok(products)
}

/// Takes one unit out of stock in a single conditional statement. If another writer took the last unit first, no row
/// matches and `None` is returned.
pub async fn reserve_one(
    product_id: i64,
    sold_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, SqliteDatabaseError> {
    let product = sqlx::query_as::<_, Product>(
        r#"
            UPDATE products SET
                stock = stock - 1,
                status = CASE
                    WHEN status = 'inactive' THEN 'inactive'
                    WHEN stock - 1 <= minimum_stock THEN 'low_stock'
                    ELSE 'active'
                END,
                last_sold = $2,
                updated_at = $2
            WHERE id = $1 AND stock > 0
            RETURNING *;
        "#,
    )
    .bind(product_id)
    .bind(sold_at)
    .fetch_optional(conn)
    .await?;
    trace!("🗃️ Reserve on product #{product_id} matched: {}", product.is_some());
    Ok(product)
}

pub async fn restore_one(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, SqliteDatabaseError> {
    let product = sqlx::query_as::<_, Product>(
        r#"
            UPDATE products SET
                stock = stock + 1,
                status = CASE
                    WHEN status = 'inactive' THEN 'inactive'
                    WHEN stock + 1 <= minimum_stock THEN 'low_stock'
                    ELSE 'active'
                END,
                updated_at = $2
            WHERE id = $1
            RETURNING *;
        "#,
    )
    .bind(product_id)
    .bind(Utc::now())
    .fetch_optional(conn)
    .await?;
    Ok(product)
}

pub async fn fetch_cheapest_alternative(
    max_price: Cents,
    exclude: &[i64],
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT * FROM products WHERE stock > 0 AND status != 'inactive' AND price <= ",
    );
    builder.push_bind(max_price);
    if !exclude.is_empty() {
        builder.push(" AND id NOT IN (");
        let mut ids = builder.separated(", ");
        for id in exclude {
            ids.push_bind(*id);
        }
        ids.push_unseparated(")");
    }
    builder.push(" ORDER BY price ASC, id ASC LIMIT 1");
    trace!("🗃️ Executing query: {}", builder.sql());
    let product = builder.build_query_as::<Product>().fetch_optional(conn).await?;
    Ok(product)
}

pub async fn update_stock(
    product_id: i64,
    stock: i64,
    status: ProductStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, SqliteDatabaseError> {
    if stock < 0 {
        return Err(SqliteDatabaseError::QueryError(format!("Stock cannot be negative ({stock})")));
    }
    let product = sqlx::query_as::<_, Product>(
        "UPDATE products SET stock = $2, status = $3, updated_at = $4 WHERE id = $1 RETURNING *;",
    )
    .bind(product_id)
    .bind(stock)
    .bind(status)
    .bind(Utc::now())
    .fetch_optional(conn)
    .await?;
    Ok(product)
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use crate::{
        db::sqlite::{products::fetch_product, sales::fetch_sales},
        db_types::{Cents, NewProduct, NewSale, PaymentMethod, ProductStatus},
        test_utils::prepare_env::{prepare_test_env, random_db_path, seed_products},
        traits::{InventoryApiError, InventoryManagement, SalesManagement},
    };

    fn stock(name: &str, price: i64, stock: i64, position: &str) -> NewProduct {
        NewProduct::new(name, Cents::from(price), stock, position).with_minimum_stock(1)
    }

    #[tokio::test]
    async fn reserve_stops_at_zero() {
        let db = prepare_test_env(&random_db_path()).await;
        let products = seed_products(&db, vec![stock("Water", 100, 2, "A1")]).await;
        let id = products[0].id;
        let first = db.reserve_one(id, Utc::now()).await.unwrap().unwrap();
        assert_eq!(first.stock, 1);
        assert_eq!(first.status, ProductStatus::LowStock);
        assert!(first.last_sold.is_some());
        let second = db.reserve_one(id, Utc::now()).await.unwrap().unwrap();
        assert_eq!(second.stock, 0);
        assert!(db.reserve_one(id, Utc::now()).await.unwrap().is_none());
        let restored = db.restore_one(id).await.unwrap().unwrap();
        assert_eq!(restored.stock, 1);
        db.close().await;
    }

    #[tokio::test]
    async fn writes_are_visible_on_every_pooled_connection() {
        let db = prepare_test_env(&random_db_path()).await;
        let products = seed_products(&db, vec![stock("Water", 100, 3, "A1")]).await;
        let water = db.reserve_one(products[0].id, Utc::now()).await.unwrap().unwrap();
        let sale = db.insert_sale(NewSale::completed(&water, Cents::from(100), PaymentMethod::Cash, "vm-1")).await.unwrap();
        // Hold two connections at once so the reads cannot share the connection that did the writes.
        let mut first = db.pool().acquire().await.unwrap();
        let mut second = db.pool().acquire().await.unwrap();
        for conn in [&mut first, &mut second] {
            let product = fetch_product(water.id, conn).await.unwrap().expect("product should be visible");
            assert_eq!(product.stock, 2);
            let sales = fetch_sales(10, conn).await.unwrap();
            assert_eq!(sales.len(), 1);
            assert_eq!(sales[0].id, sale.id);
        }
        drop(first);
        drop(second);
        db.close().await;
    }

    #[tokio::test]
    async fn slots_hold_one_product() {
        let db = prepare_test_env(&random_db_path()).await;
        seed_products(&db, vec![stock("Water", 100, 2, "A1")]).await;
        let err = db.insert_product(stock("Juice", 120, 2, "A1")).await.unwrap_err();
        assert!(matches!(err, InventoryApiError::PositionTaken(p) if p == "A1"));
        db.close().await;
    }

    #[tokio::test]
    async fn cheapest_alternative_skips_excluded_and_unavailable() {
        let db = prepare_test_env(&random_db_path()).await;
        let products = seed_products(&db, vec![
            stock("Cola", 150, 0, "A1"),
            stock("Chips", 120, 4, "A2"),
            stock("Gum", 50, 3, "A3").inactive(),
            stock("Water", 100, 5, "A4"),
            stock("Juice", 250, 5, "A5"),
        ])
        .await;
        let alt = db.fetch_cheapest_alternative(Cents::from(200), &[products[3].id]).await.unwrap().unwrap();
        assert_eq!(alt.name, "Chips");
        let alt = db.fetch_cheapest_alternative(Cents::from(200), &[]).await.unwrap().unwrap();
        assert_eq!(alt.name, "Water");
        let none = db.fetch_cheapest_alternative(Cents::from(90), &[]).await.unwrap();
        assert!(none.is_none());
        db.close().await;
    }

    #[tokio::test]
    async fn stock_cannot_go_negative() {
        let db = prepare_test_env(&random_db_path()).await;
        let products = seed_products(&db, vec![stock("Water", 100, 2, "A1")]).await;
        let err = db.update_stock(products[0].id, -1, ProductStatus::Active).await.unwrap_err();
        assert!(matches!(err, InventoryApiError::QueryError(_)));
        let updated = db.update_stock(products[0].id, 9, ProductStatus::Active).await.unwrap().unwrap();
        assert_eq!(updated.stock, 9);
        db.close().await;
    }
}
