//! JSON status handler.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use strum::IntoEnumIterator;

use crate::error_handling::ErrorKind;
use crate::server::types::{AppState, ExportCounts, StatusResponse};

/// JSON status endpoint with export counters
pub async fn status_handler(State(state): State<AppState>) -> Response {
    let stats = &state.stats;
    let failures = ErrorKind::iter()
        .map(|kind| (kind.as_str(), stats.get_failure_count(kind)))
        .collect();

    let response = StatusResponse {
        uptime_seconds: state.start_time.elapsed().as_secs_f64(),
        exports: ExportCounts {
            started: stats.started(),
            completed: stats.completed(),
            in_flight: stats.in_flight(),
            failed: stats.total_failures() - stats.get_failure_count(ErrorKind::Validation),
        },
        failures,
    };

    (StatusCode::OK, Json(response)).into_response()
}

/// Liveness probe
pub async fn healthz_handler() -> &'static str {
    "ok"
}
