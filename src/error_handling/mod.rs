//! Error handling and export statistics.
//!
//! This module provides:
//! - Error type definitions for startup and for the export pipeline
//! - Export statistics tracking (started, in flight, completed, failures by kind)
//!
//! Pipeline errors are categorized into:
//! - **Validation**: the request is rejected and nothing starts
//! - **UpstreamFetch**, **Transform**, **Encoding**: a stage failed
//! - **Cancelled**: the caller went away

mod stats;
mod types;

// Re-export public API
pub use stats::ExportStats;
pub use types::{
    DatabaseError, ErrorKind, ExportError, InitializationError, Stage, ValidationError,
};
