//! HTTP server for report exports.
//!
//! Provides three endpoints:
//! - `/v1/reports/export` - streamed CSV export (`POST` form or `GET` query)
//! - `/status` - JSON export counters
//! - `/healthz` - liveness probe

mod handlers;
mod types;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use handlers::{export_handler, healthz_handler, status_handler};
pub use types::{AppState, ErrorResponse, ExportForm};

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/reports/export",
            get(export_handler).post(export_handler),
        )
        .route("/status", get(status_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(state)
}

/// Serves until `state.shutdown` is cancelled.
///
/// Cancelling the shutdown token also cancels every running export, so open
/// downloads end promptly instead of holding the shutdown.
pub async fn start_server(listener: TcpListener, state: AppState) -> Result<(), anyhow::Error> {
    let shutdown = state.shutdown.clone();
    if let Ok(addr) = listener.local_addr() {
        log::info!("Report exporter listening on http://{}/", addr);
        log::info!("  - Export: http://{}/v1/reports/export", addr);
        log::info!("  - Status: http://{}/status", addr);
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    log::info!("Server stopped");
    Ok(())
}
