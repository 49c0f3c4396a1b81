use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{NewSale, Sale, SaleStatus},
};

/// Inserts a new sale into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_sale(sale: NewSale, conn: &mut SqliteConnection) -> Result<Sale, SqliteDatabaseError> {
    let now = Utc::now();
    let sale = sqlx::query_as::<_, Sale>(
        r#"
            INSERT INTO sales (product_id, amount, payment_method, machine_id, status, change_given, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *;
        "#,
    )
    .bind(sale.product_id)
    .bind(sale.amount)
    .bind(sale.payment_method)
    .bind(&sale.machine_id)
    .bind(sale.status)
    .bind(sale.change_given)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Sale #{} of product #{} for {} recorded", sale.id, sale.product_id, sale.amount);
    Ok(sale)
}

pub async fn fetch_sale(sale_id: i64, conn: &mut SqliteConnection) -> Result<Option<Sale>, SqliteDatabaseError> {
    let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = $1").bind(sale_id).fetch_optional(conn).await?;
    Ok(sale)
}

pub async fn fetch_sales(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<Sale>, SqliteDatabaseError> {
    let sales = sqlx::query_as::<_, Sale>("SELECT * FROM sales ORDER BY id DESC LIMIT $1")
        .bind(limit)
        .fetch_all(conn)
        .await?;
    Ok(sales)
}

pub async fn update_sale_status(
    sale_id: i64,
    expected: SaleStatus,
    new_status: SaleStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Sale>, SqliteDatabaseError> {
    let sale = sqlx::query_as::<_, Sale>(
        "UPDATE sales SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2 RETURNING *;",
    )
    .bind(sale_id)
    .bind(expected)
    .bind(new_status)
    .bind(Utc::now())
    .fetch_optional(conn)
    .await?;
    if let Some(s) = &sale {
        debug!("🗃️ Sale #{} moved from {expected} to {}", s.id, s.status);
    }
    Ok(sale)
}
