//! Server state and wire types.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error_handling::ExportStats;
use crate::export::{ExportRequest, ReportExporter};

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub exporter: Arc<ReportExporter>,
    pub stats: Arc<ExportStats>,
    /// Parent of every export's cancellation scope; cancelled on shutdown.
    pub shutdown: CancellationToken,
    pub start_time: Arc<Instant>,
}

impl AppState {
    pub fn new(exporter: ReportExporter, shutdown: CancellationToken) -> Self {
        Self {
            exporter: Arc::new(exporter),
            stats: Arc::new(ExportStats::new()),
            shutdown,
            start_time: Arc::new(Instant::now()),
        }
    }
}

/// Form (or query string) fields of an export request.
///
/// Fields are taken as text so each one can be reported individually.
#[derive(Debug, Default, Deserialize)]
pub struct ExportForm {
    #[serde(default)]
    pub shop_id: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
}

impl ExportForm {
    /// Parses the fields; the error is the message returned to the client.
    pub fn parse(&self) -> Result<ExportRequest, &'static str> {
        let shop_id = self
            .shop_id
            .trim()
            .parse::<i64>()
            .map_err(|_| "invalid shop_id")?;
        let start_time = parse_time(&self.start_time).ok_or("invalid start time")?;
        let end_time = parse_time(&self.end_time).ok_or("invalid end time")?;
        Ok(ExportRequest::new(shop_id, start_time, end_time))
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// JSON response for `/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub uptime_seconds: f64,
    pub exports: ExportCounts,
    /// Failures by kind, rejected requests under `validation`.
    pub failures: BTreeMap<&'static str, usize>,
}

#[derive(Debug, Serialize)]
pub struct ExportCounts {
    pub started: usize,
    pub completed: usize,
    pub in_flight: usize,
    pub failed: usize,
}
