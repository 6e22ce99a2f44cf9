//! Configuration constants.
//!
//! Defaults for the CLI flags and the hard limits `Config::validate` enforces.

/// Default SQLite database path.
pub const DB_PATH: &str = "./report_exporter.db";

/// Default HTTP listen address for `serve`.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// Default number of fan-out workers per export.
pub const DEFAULT_POOL_SIZE: usize = 32;

/// Upper bound on fan-out workers per export.
pub const MAX_POOL_SIZE: usize = 256;

/// Default maximum export window in days.
pub const DEFAULT_MAX_WINDOW_DAYS: u32 = 365;

/// Default output chunk size in bytes (64 KiB).
pub const DEFAULT_CHUNK_BYTES: usize = 64 * 1024;

/// Default SQLite pool size. Each running export holds one connection.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
