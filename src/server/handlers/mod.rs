//! HTTP handlers.

mod export;
mod status;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::server::types::ErrorResponse;

pub use export::export_handler;
pub use status::{healthz_handler, status_handler};

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}
