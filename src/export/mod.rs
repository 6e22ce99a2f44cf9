//! Report export entry points.
//!
//! This module validates export requests and runs them through the streaming
//! pipeline, returning the CSV as an incremental byte stream.

mod exporter;
mod request;

pub use exporter::{ExportHandle, ExportOptions, ExportResult, ExportSummary, ReportExporter};
pub use request::{ExportRequest, ValidatedRequest};
