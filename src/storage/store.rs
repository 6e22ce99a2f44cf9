//! Report storage access.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error_handling::ExportError;
use crate::models::{Report, ReportFeeDetail};
use crate::storage::query::ReportQuery;

/// Source of reports for an export.
///
/// Implementations return a lazy cursor: rows are read as the stream is
/// polled, and dropping the stream releases the underlying resources.
/// Cursor failures surface as [`ExportError::UpstreamFetch`] and undecodable
/// rows as [`ExportError::Transform`].
pub trait ReportStore: Send + Sync {
    fn query_reports<'a>(
        &'a self,
        query: &'a ReportQuery,
    ) -> BoxStream<'a, Result<Report, ExportError>>;
}

/// [`ReportStore`] backed by the SQLite `report` table.
#[derive(Clone)]
pub struct SqliteReportStore {
    pool: Arc<SqlitePool>,
}

impl SqliteReportStore {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }
}

impl ReportStore for SqliteReportStore {
    fn query_reports<'a>(
        &'a self,
        query: &'a ReportQuery,
    ) -> BoxStream<'a, Result<Report, ExportError>> {
        let mut statement = sqlx::query(query.sql());
        for value in query.binds() {
            statement = statement.bind(*value);
        }

        statement
            .fetch(self.pool.as_ref())
            .map(|row| match row {
                Ok(row) => decode_report(&row),
                Err(e) => Err(ExportError::from(e)),
            })
            .boxed()
    }
}

/// Decodes one `report` row, including its JSON `details` column.
pub fn decode_report(row: &SqliteRow) -> Result<Report, ExportError> {
    let details: String = column(row, "details")?;
    let details: Vec<ReportFeeDetail> = serde_json::from_str(&details).map_err(|e| {
        ExportError::Transform(format!("invalid details in report row: {e}"))
    })?;

    Ok(Report {
        id: column(row, "id")?,
        shop_id: column(row, "shop_id")?,
        order_id: column(row, "order_id")?,
        order_creation_time: timestamp(row, "order_creation_time_ms")?,
        order_payment_time: timestamp(row, "order_payment_time_ms")?,
        order_settlement_time: timestamp(row, "order_settlement_time_ms")?,
        fee_id: column(row, "fee_id")?,
        details,
        creation_time: timestamp(row, "creation_time_ms")?,
        update_time: timestamp(row, "update_time_ms")?,
    })
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, ExportError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| ExportError::Transform(format!("failed to decode column {name}: {e}")))
}

fn timestamp(row: &SqliteRow, name: &str) -> Result<DateTime<Utc>, ExportError> {
    let millis: i64 = column(row, name)?;
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        ExportError::Transform(format!("timestamp out of range in column {name}: {millis}"))
    })
}
