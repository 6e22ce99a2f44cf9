use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use log::error;

use crate::error_handling::{ExportError, Stage};

/// Runs a stage body, converting a panic into the stage's error category.
///
/// The future is dropped after the panic is caught, so resources it owns
/// (cursors, channel handles) are released before the error is returned.
pub(crate) async fn guarded<F, T>(stage: Stage, body: F) -> Result<T, ExportError>
where
    F: Future<Output = Result<T, ExportError>>,
{
    match AssertUnwindSafe(body).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("Recovered panic in {} stage: {}", stage, message);
            Err(stage.internal_fault(&message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
