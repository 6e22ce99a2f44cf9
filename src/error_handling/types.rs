//! Error type definitions.
//!
//! This module defines the startup errors (logger, database) and the errors
//! that flow through the export pipeline.

use log::SetLoggerError;
use strum_macros::{EnumIter as EnumIterMacro, IntoStaticStr};
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// The configuration failed validation.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

/// Error types for database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error creating the database file.
    #[error("Database file creation error: {0}")]
    FileCreationError(String),

    /// SQL execution error.
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
}

/// Reasons an export request is rejected before the pipeline starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `shop_id` is missing, zero or negative.
    #[error("shop_id is required")]
    MissingShopId,

    /// `start_time` is missing or zero.
    #[error("start_time is required")]
    MissingStartTime,

    /// `end_time` is missing or zero.
    #[error("end_time is required")]
    MissingEndTime,

    /// The window is inverted.
    #[error("start time is after end time")]
    StartAfterEnd,

    /// The window is longer than the configured limit.
    #[error("time range exceeds duration limit (limit = {limit_days} days)")]
    WindowTooLong {
        /// Configured limit in days.
        limit_days: u32,
    },
}

/// Errors carried through the export pipeline.
///
/// The type is `Clone` because a channel closed with an error hands the same
/// error to every receiver, so foreign errors are captured as messages.
#[derive(Error, Debug, Clone)]
pub enum ExportError {
    /// The request was rejected; the pipeline never started.
    #[error("invalid export request: {0}")]
    Validation(#[from] ValidationError),

    /// The storage cursor failed.
    #[error("failed to fetch reports: {0}")]
    UpstreamFetch(String),

    /// A row could not be decoded or flattened.
    #[error("failed to transform report: {0}")]
    Transform(String),

    /// Serialization or the write to the output stream failed.
    #[error("failed to encode report: {0}")]
    Encoding(String),

    /// The caller withdrew the request.
    #[error("export cancelled")]
    Cancelled,

    /// A send was attempted on a channel that was closed normally.
    #[error("pipe closed")]
    PipeClosed,
}

impl From<sqlx::Error> for ExportError {
    fn from(e: sqlx::Error) -> Self {
        ExportError::UpstreamFetch(e.to_string())
    }
}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        ExportError::Encoding(e.to_string())
    }
}

impl ExportError {
    /// Returns the category this error is counted under.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExportError::Validation(_) => ErrorKind::Validation,
            ExportError::UpstreamFetch(_) => ErrorKind::UpstreamFetch,
            ExportError::Transform(_) => ErrorKind::Transform,
            ExportError::Encoding(_) => ErrorKind::Encoding,
            ExportError::Cancelled => ErrorKind::Cancelled,
            ExportError::PipeClosed => ErrorKind::Internal,
        }
    }

    /// True when the error only reflects a teardown already in progress.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExportError::Cancelled)
    }
}

/// Error categories used for statistics and log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Request rejected before start
    Validation,
    /// Storage cursor failure
    UpstreamFetch,
    /// Decode or fan-out failure
    Transform,
    /// Serialization or transport write failure
    Encoding,
    /// Caller withdrew the request
    Cancelled,
    /// Pipeline misuse (send on a closed pipe)
    Internal,
}

impl ErrorKind {
    /// Returns the snake_case name used in logs and `/status`.
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stages, used to attribute recovered panics and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    /// Storage cursor reader
    Source,
    /// Worker pool
    FanOut,
    /// CSV encoder
    Sink,
}

impl Stage {
    /// Returns the snake_case stage name.
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }

    /// Converts a recovered panic into the error category owned by this stage.
    pub fn internal_fault(self, message: &str) -> ExportError {
        let message = format!("internal fault in {}: {message}", self.as_str());
        match self {
            Stage::Source => ExportError::UpstreamFetch(message),
            Stage::FanOut => ExportError::Transform(message),
            Stage::Sink => ExportError::Encoding(message),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
