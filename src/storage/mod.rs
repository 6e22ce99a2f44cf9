// storage/mod.rs
// Database access: pool, migrations, report queries

pub mod migrations;
pub mod pool;
pub mod query;
pub mod store;

// Re-export commonly used items
pub use migrations::run_migrations;
pub use pool::init_db_pool_with_path;
pub use query::{ReportFilter, ReportQuery, TimeRange};
pub use store::{decode_report, ReportStore, SqliteReportStore};
