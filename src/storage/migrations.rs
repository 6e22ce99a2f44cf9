// storage/migrations.rs
// Database migration management

use sqlx::migrate::Migrator;
use sqlx::{Pool, Sqlite};

use crate::error_handling::DatabaseError;

/// Migrations from `migrations/`, embedded into the binary at build time.
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Applies the embedded migrations.
///
/// Creates the `report` table and its shop/settlement-time index.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<(), DatabaseError> {
    MIGRATOR.run(pool).await?;
    log::debug!("Applied {} migration(s)", MIGRATOR.iter().count());
    Ok(())
}
