//! report_exporter library: streaming CSV exports of shop fee reports
//!
//! Reports are read from SQLite through a lazy cursor, flattened into one line
//! per fee detail by a bounded worker pool, and encoded as CSV by a single
//! sink. The CSV reaches the caller as an incremental byte stream, so memory
//! use does not grow with the size of the export.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use chrono::{TimeZone, Utc};
//! use futures::StreamExt;
//! use report_exporter::{
//!     init_db_pool_with_path, run_migrations, ExportOptions, ExportRequest, ReportExporter,
//!     SqliteReportStore,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = init_db_pool_with_path(std::path::Path::new("reports.db"), 5).await?;
//! run_migrations(&pool).await?;
//!
//! let exporter = ReportExporter::new(
//!     Arc::new(SqliteReportStore::new(pool)),
//!     ExportOptions::default(),
//! );
//! let request = ExportRequest::new(
//!     42,
//!     Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
//!     Utc.with_ymd_and_hms(2023, 1, 31, 0, 0, 0).unwrap(),
//! );
//!
//! let mut export = exporter.export(&request, &CancellationToken::new())?;
//! while let Some(chunk) = export.stream.next().await {
//!     print!("{}", String::from_utf8_lossy(&chunk?));
//! }
//! let summary = export.handle.wait().await?;
//! eprintln!("{}: {} rows", export.file_name, summary.rows);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

mod app;
pub mod config;
mod error_handling;
pub mod export;
pub mod initialization;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod storage;

// Re-export public API
pub use app::{export_once, run, RunOutcome};
pub use config::{Command, Config, LogFormat, LogLevel};
pub use error_handling::{
    DatabaseError, ErrorKind, ExportError, ExportStats, InitializationError, Stage,
    ValidationError,
};
pub use export::{
    ExportHandle, ExportOptions, ExportRequest, ExportResult, ExportSummary, ReportExporter,
    ValidatedRequest,
};
pub use models::{Report, ReportFeeDetail, ReportLine};
pub use pipeline::{ReportStream, CSV_HEADER};
pub use storage::{
    init_db_pool_with_path, run_migrations, ReportFilter, ReportQuery, ReportStore,
    SqliteReportStore, TimeRange,
};
