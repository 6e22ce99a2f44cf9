use std::sync::Arc;

use futures::TryStreamExt;
use log::debug;
use tokio_util::sync::CancellationToken;

use crate::error_handling::{ExportError, Stage};
use crate::models::Report;
use crate::pipeline::guard::guarded;
use crate::pipeline::pipe::Pipe;
use crate::storage::{ReportQuery, ReportStore};

/// Reads every report matching `query` into `reports`.
///
/// Closes `reports` normally once the cursor is exhausted, or with the error
/// that stopped it. The cursor is released before this returns, on every
/// path. Returns the number of reports handed on.
pub(crate) async fn run_source(
    store: Arc<dyn ReportStore>,
    query: ReportQuery,
    reports: Pipe<Report>,
    cancel: CancellationToken,
) -> Result<u64, ExportError> {
    let result = guarded(
        Stage::Source,
        read_reports(store.as_ref(), &query, &reports, &cancel),
    )
    .await;

    match &result {
        Ok(count) => {
            debug!("Source exhausted after {} reports", count);
            reports.close();
        }
        Err(e) => {
            debug!("Source stopped: {}", e);
            reports.close_with_error(e.clone());
        }
    }
    result
}

async fn read_reports(
    store: &dyn ReportStore,
    query: &ReportQuery,
    reports: &Pipe<Report>,
    cancel: &CancellationToken,
) -> Result<u64, ExportError> {
    let mut cursor = store.query_reports(query);
    let mut count = 0u64;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExportError::Cancelled),
            next = cursor.try_next() => next?,
        };
        let Some(report) = next else {
            break;
        };
        reports.send(cancel, report).await?;
        count += 1;
    }

    Ok(count)
}
