//! Configuration types and CLI options.
//!
//! This module defines enums and structs used for command-line argument parsing
//! and configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};

use crate::config::constants::{
    DB_PATH, DEFAULT_CHUNK_BYTES, DEFAULT_LISTEN_ADDR, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_WINDOW_DAYS,
    DEFAULT_POOL_SIZE, MAX_POOL_SIZE,
};
use crate::error_handling::InitializationError;
use crate::export::ExportOptions;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted:
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Command-line options and configuration.
///
/// # Examples
///
/// ```bash
/// # Serve exports over HTTP
/// report_exporter serve --listen 127.0.0.1:8080
///
/// # One-shot export to a file
/// report_exporter export --shop-id 42 \
///     --start-time 2023-01-01T00:00:00Z --end-time 2023-01-31T00:00:00Z \
///     --output reports.csv
/// ```
#[derive(Debug, Parser)]
#[command(
    name = "report_exporter",
    about = "Streams shop fee reports out of SQLite as CSV."
)]
pub struct Config {
    /// Log level: error|warn|info|debug|trace
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Database path (SQLite file)
    #[arg(long, global = true, env = "REPORT_EXPORTER_DB_PATH", default_value = DB_PATH)]
    pub db_path: PathBuf,

    /// Fan-out workers per export (1-256)
    #[arg(long, global = true, default_value_t = DEFAULT_POOL_SIZE)]
    pub pool_size: usize,

    /// Longest accepted export window, in days
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_WINDOW_DAYS)]
    pub max_window_days: u32,

    /// Target size of each streamed output chunk, in bytes
    #[arg(long, global = true, default_value_t = DEFAULT_CHUNK_BYTES)]
    pub chunk_bytes: usize,

    /// SQLite connection pool size
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,

    #[command(subcommand)]
    pub command: Command,
}

/// What to run.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve exports over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, env = "REPORT_EXPORTER_LISTEN", default_value = DEFAULT_LISTEN_ADDR)]
        listen: SocketAddr,
    },
    /// Run a single export and write it to a file or stdout
    Export {
        /// Shop to export
        #[arg(long)]
        shop_id: i64,

        /// Window start (RFC 3339)
        #[arg(long)]
        start_time: DateTime<Utc>,

        /// Window end (RFC 3339)
        #[arg(long)]
        end_time: DateTime<Utc>,

        /// Output file; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

impl Config {
    /// Checks the limits clap cannot express.
    pub fn validate(&self) -> Result<(), InitializationError> {
        if self.pool_size == 0 || self.pool_size > MAX_POOL_SIZE {
            return Err(InitializationError::ConfigError(format!(
                "pool_size must be between 1 and {MAX_POOL_SIZE}, got {}",
                self.pool_size
            )));
        }
        if self.max_window_days == 0 {
            return Err(InitializationError::ConfigError(
                "max_window_days must be at least 1".to_string(),
            ));
        }
        if self.chunk_bytes == 0 {
            return Err(InitializationError::ConfigError(
                "chunk_bytes must be at least 1".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(InitializationError::ConfigError(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Pipeline settings for the exporter.
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            pool_size: self.pool_size,
            max_window_days: self.max_window_days,
            chunk_bytes: self.chunk_bytes,
        }
    }
}
