use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{NewReport, Report},
};

pub async fn insert_report(report: NewReport, conn: &mut SqliteConnection) -> Result<Report, SqliteDatabaseError> {
    let report = sqlx::query_as::<_, Report>(
        r#"
            INSERT INTO reports (report_type, description, product_id, machine_id, reported_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(report.report_type)
    .bind(&report.description)
    .bind(report.product_id)
    .bind(&report.machine_id)
    .bind(&report.reported_by)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(report)
}

pub async fn fetch_reports(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<Report>, SqliteDatabaseError> {
    let reports = sqlx::query_as::<_, Report>("SELECT * FROM reports ORDER BY id DESC LIMIT $1")
        .bind(limit)
        .fetch_all(conn)
        .await?;
    Ok(reports)
}
