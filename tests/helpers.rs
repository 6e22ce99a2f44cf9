// Shared test helpers for database setup and test data creation.
//
// This module provides common utilities used across multiple test files to reduce duplication.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use futures::StreamExt;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use report_exporter::{
    run_migrations, ExportError, ExportOptions, ReportExporter, ReportFeeDetail, ReportStream,
    SqliteReportStore,
};

/// Creates a test database pool with migrations applied.
/// Uses an in-memory database on a single long-lived connection, since every
/// SQLite in-memory connection is a separate database.
#[allow(dead_code)] // Used by other test files
pub async fn create_test_pool() -> Arc<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    Arc::new(pool)
}

/// Midnight UTC on the given day.
#[allow(dead_code)] // Used by other test files
pub fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

/// A fee detail with amounts derived from its ids.
#[allow(dead_code)] // Used by other test files
pub fn fee_detail(order_detail_id: i64, product_id: i64) -> ReportFeeDetail {
    ReportFeeDetail {
        order_detail_id,
        category_id: 10,
        product_id,
        product_price_amount: 100.0 + product_id as f64,
        promo_amount: 5.0,
        fee_base_amount: 95.0 + product_id as f64,
        fee_final_amount: 2.5,
    }
}

/// Inserts a report row and returns its id.
#[allow(dead_code)] // Used by other test files
pub async fn insert_report(
    pool: &SqlitePool,
    shop_id: i64,
    order_id: i64,
    settled_at: DateTime<Utc>,
    details: &[ReportFeeDetail],
) -> i64 {
    let settled_ms = settled_at.timestamp_millis();
    sqlx::query(
        "INSERT INTO report (
            shop_id, order_id, order_creation_time_ms, order_payment_time_ms,
            order_settlement_time_ms, fee_id, details, creation_time_ms, update_time_ms
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id",
    )
    .bind(shop_id)
    .bind(order_id)
    .bind(settled_ms - 86_400_000)
    .bind(settled_ms - 3_600_000)
    .bind(settled_ms)
    .bind(1i64)
    .bind(serde_json::to_string(details).expect("Failed to encode details"))
    .bind(settled_ms)
    .bind(settled_ms)
    .fetch_one(pool)
    .await
    .expect("Failed to insert test report")
    .get::<i64, _>(0)
}

/// Exporter over `pool` with the given pool size and chunk size.
#[allow(dead_code)] // Used by other test files
pub fn create_exporter(pool: &Arc<SqlitePool>, pool_size: usize, chunk_bytes: usize) -> ReportExporter {
    ReportExporter::new(
        Arc::new(SqliteReportStore::new(Arc::clone(pool))),
        ExportOptions {
            pool_size,
            chunk_bytes,
            ..ExportOptions::default()
        },
    )
}

/// Reads a stream to the end; returns the text, or the error it ended with.
#[allow(dead_code)] // Used by other test files
pub async fn collect_csv(mut stream: ReportStream) -> Result<String, ExportError> {
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk?);
    }
    Ok(String::from_utf8(body).expect("CSV output should be UTF-8"))
}

/// Parses CSV text into its header and data rows.
#[allow(dead_code)] // Used by other test files
pub fn parse_csv(text: &str) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let header = reader
        .headers()
        .expect("CSV should have a header")
        .iter()
        .map(str::to_string)
        .collect();
    let rows = reader
        .records()
        .map(|r| r.expect("CSV row should parse").iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}
