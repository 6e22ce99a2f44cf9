//! Bounded worker pool that flattens reports into lines.

use log::{debug, warn};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::MAX_POOL_SIZE;
use crate::error_handling::{ExportError, Stage};
use crate::models::{Report, ReportLine};
use crate::pipeline::guard::guarded;
use crate::pipeline::pipe::Pipe;

/// A fixed number of workers sharing one input and one output pipe.
///
/// Each worker takes a report, emits one line per detail, and repeats until
/// the input ends. Line order across reports is not preserved; lines of one
/// report keep their detail order.
#[derive(Debug, Clone, Copy)]
pub struct FanOutPool {
    size: usize,
}

impl FanOutPool {
    /// Creates a pool of `size` workers, clamped to `1..=MAX_POOL_SIZE`.
    pub fn new(size: usize) -> Self {
        Self {
            size: size.clamp(1, MAX_POOL_SIZE),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Runs the workers to completion.
    ///
    /// The first worker error cancels the remaining workers, closes `lines`
    /// with that error and is returned; later errors are discarded. Without
    /// errors `lines` is closed normally once every worker has finished, and
    /// the number of lines emitted is returned.
    pub(crate) async fn run(
        &self,
        reports: Pipe<Report>,
        lines: Pipe<ReportLine>,
        cancel: CancellationToken,
    ) -> Result<u64, ExportError> {
        self.run_with(reports, lines, cancel, Report::into_lines).await
    }

    /// Like [`FanOutPool::run`], with `flatten` turning each report into lines.
    async fn run_with<F, I>(
        &self,
        reports: Pipe<Report>,
        lines: Pipe<ReportLine>,
        cancel: CancellationToken,
        flatten: F,
    ) -> Result<u64, ExportError>
    where
        F: Fn(Report) -> I + Copy + Send + Sync + 'static,
        I: IntoIterator<Item = ReportLine> + Send + 'static,
        I::IntoIter: Send + 'static,
    {
        let pool_cancel = cancel.child_token();
        let mut workers = JoinSet::new();
        for worker_id in 0..self.size {
            workers.spawn(guarded(
                Stage::FanOut,
                flatten_reports(
                    worker_id,
                    reports.clone(),
                    lines.clone(),
                    pool_cancel.clone(),
                    flatten,
                ),
            ));
        }

        let mut emitted = 0u64;
        let mut first_error: Option<ExportError> = None;
        while let Some(joined) = workers.join_next().await {
            let outcome = joined.unwrap_or_else(|e| {
                Err(Stage::FanOut.internal_fault(&format!("worker task failed: {e}")))
            });
            match outcome {
                Ok(count) => emitted += count,
                Err(e) if first_error.is_none() => {
                    warn!("Fan-out worker failed, stopping pool: {}", e);
                    pool_cancel.cancel();
                    first_error = Some(e);
                }
                Err(e) => debug!("Discarding secondary fan-out error: {}", e),
            }
        }

        match first_error {
            Some(e) => {
                lines.close_with_error(e.clone());
                Err(e)
            }
            None => {
                lines.close();
                Ok(emitted)
            }
        }
    }
}

async fn flatten_reports<F, I>(
    worker_id: usize,
    reports: Pipe<Report>,
    lines: Pipe<ReportLine>,
    cancel: CancellationToken,
    flatten: F,
) -> Result<u64, ExportError>
where
    F: Fn(Report) -> I,
    I: IntoIterator<Item = ReportLine>,
{
    let mut emitted = 0u64;
    while let Some(report) = reports.recv(&cancel).await? {
        for line in flatten(report) {
            lines.send(&cancel, line).await?;
            emitted += 1;
        }
    }
    debug!("Fan-out worker {} done after {} lines", worker_id, emitted);
    Ok(emitted)
}
