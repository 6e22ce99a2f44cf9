//! Streaming export handler.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::FormRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form,
};
use log::{debug, error};

use super::error_response;
use crate::error_handling::{ExportError, ExportStats};
use crate::export::ExportHandle;
use crate::server::types::{AppState, ExportForm};

/// Streams the CSV export described by the form (or query string).
///
/// Errors before the stream starts are answered with a JSON error body. Once
/// streaming has begun a failure can only truncate the body.
pub async fn export_handler(
    State(state): State<AppState>,
    form: Result<Form<ExportForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            state.stats.record_rejected();
            return error_response(rejection.status(), rejection.body_text());
        }
    };
    let request = match form.parse() {
        Ok(request) => request,
        Err(message) => {
            state.stats.record_rejected();
            return error_response(StatusCode::BAD_REQUEST, message);
        }
    };

    match state.exporter.export(&request, &state.shutdown) {
        Ok(result) => {
            state.stats.record_started();
            track_completion(result.handle, Arc::clone(&state.stats));

            let disposition = format!("attachment; filename=\"{}\"", result.file_name);
            (
                [
                    (header::CONTENT_DISPOSITION, disposition),
                    (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                ],
                Body::from_stream(result.stream),
            )
                .into_response()
        }
        Err(ExportError::Validation(e)) => {
            debug!("Rejected export request: {}", e);
            state.stats.record_rejected();
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => {
            error!("Failed to start export: {}", e);
            state.stats.record_started();
            state.stats.record_failed(e.kind());
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn track_completion(handle: ExportHandle, stats: Arc<ExportStats>) {
    tokio::spawn(async move {
        match handle.wait().await {
            Ok(_) => stats.record_completed(),
            Err(e) => stats.record_failed(e.kind()),
        }
    });
}
