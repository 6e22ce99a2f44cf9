//! Export orchestration.
//!
//! [`ReportExporter::export`] validates a request, wires the source, the
//! fan-out pool and the sink together under one cancellation scope, and hands
//! back the readable stream immediately. A supervisor task owns teardown: the
//! first stage error cancels the scope, closes every pipe with that error and,
//! once all stages have stopped, ends the output stream with it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::{DEFAULT_CHUNK_BYTES, DEFAULT_MAX_WINDOW_DAYS, DEFAULT_POOL_SIZE};
use crate::error_handling::{ExportError, Stage};
use crate::export::request::ExportRequest;
use crate::models::{Report, ReportLine};
use crate::pipeline::{
    output_stream, run_source, CsvSink, FanOutPool, OutputCloser, Pipe, ReportStream,
    SinkSummary,
};
use crate::storage::{ReportQuery, ReportStore};

/// Pipeline settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Fan-out workers per export.
    pub pool_size: usize,
    /// Longest accepted window, in days.
    pub max_window_days: u32,
    /// Target size of each output chunk.
    pub chunk_bytes: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            max_window_days: DEFAULT_MAX_WINDOW_DAYS,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }
}

/// Counters of a finished export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub reports: u64,
    pub lines: u64,
    pub rows: u64,
    pub bytes: u64,
    pub elapsed: Duration,
}

/// A started export.
#[derive(Debug)]
pub struct ExportResult {
    /// Suggested download name.
    pub file_name: String,
    /// The CSV bytes. Dropping it cancels the export.
    pub stream: ReportStream,
    /// Resolves once every stage has stopped.
    pub handle: ExportHandle,
}

/// Completion handle of a started export.
#[derive(Debug)]
pub struct ExportHandle {
    supervisor: JoinHandle<Result<ExportSummary, ExportError>>,
}

impl ExportHandle {
    /// Waits for the export to finish; returns its summary or first error.
    pub async fn wait(self) -> Result<ExportSummary, ExportError> {
        match self.supervisor.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ExportError::Cancelled),
            Err(e) => Err(ExportError::Encoding(format!("export supervisor failed: {e}"))),
        }
    }
}

/// Runs exports against a [`ReportStore`].
#[derive(Clone)]
pub struct ReportExporter {
    store: Arc<dyn ReportStore>,
    options: ExportOptions,
}

impl ReportExporter {
    pub fn new(store: Arc<dyn ReportStore>, options: ExportOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Starts an export and returns without waiting for any row.
    ///
    /// The export runs under a child of `cancel`; cancelling it (or dropping
    /// the returned stream) stops every stage. Must be called from within a
    /// Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Validation`] when the request is rejected. No
    /// query is issued and no task is spawned in that case.
    pub fn export(
        &self,
        request: &ExportRequest,
        cancel: &CancellationToken,
    ) -> Result<ExportResult, ExportError> {
        let validated = request.validate(self.options.max_window_days)?;
        let file_name = validated.file_name();
        let query = ReportQuery::build(&validated.filter());
        debug!("Starting export {}: {}", file_name, query.sql());

        let scope = cancel.child_token();
        let reports: Pipe<Report> = Pipe::new();
        let lines: Pipe<ReportLine> = Pipe::new();
        let (writer, closer, stream) = output_stream(scope.clone());

        let mut stages = JoinSet::new();
        {
            let (store, reports, scope) =
                (Arc::clone(&self.store), reports.clone(), scope.clone());
            stages.spawn(async move {
                let outcome = run_source(store, query, reports, scope).await;
                (Stage::Source, outcome.map(StageOutcome::Source))
            });
        }
        {
            let pool = FanOutPool::new(self.options.pool_size);
            let (reports, lines, scope) = (reports.clone(), lines.clone(), scope.clone());
            stages.spawn(async move {
                let outcome = pool.run(reports, lines, scope).await;
                (Stage::FanOut, outcome.map(StageOutcome::FanOut))
            });
        }
        {
            let sink = CsvSink::new(self.options.chunk_bytes);
            let (lines, scope) = (lines.clone(), scope.clone());
            stages.spawn(async move {
                let outcome = sink.run(lines, writer, scope).await;
                (Stage::Sink, outcome.map(StageOutcome::Sink))
            });
        }

        let supervisor = tokio::spawn(supervise(Supervision {
            file_name: file_name.clone(),
            stages,
            reports,
            lines,
            closer,
            scope,
            started: Instant::now(),
        }));

        Ok(ExportResult {
            file_name,
            stream,
            handle: ExportHandle { supervisor },
        })
    }
}

enum StageOutcome {
    Source(u64),
    FanOut(u64),
    Sink(SinkSummary),
}

struct Supervision {
    file_name: String,
    stages: JoinSet<(Stage, Result<StageOutcome, ExportError>)>,
    reports: Pipe<Report>,
    lines: Pipe<ReportLine>,
    closer: OutputCloser,
    scope: CancellationToken,
    started: Instant,
}

async fn supervise(mut s: Supervision) -> Result<ExportSummary, ExportError> {
    let mut summary = ExportSummary::default();
    let mut first_error: Option<ExportError> = None;

    while let Some(joined) = s.stages.join_next().await {
        let (stage, outcome) = match joined {
            Ok(finished) => finished,
            Err(e) if e.is_cancelled() => {
                record_failure(&mut first_error, &s, None, ExportError::Cancelled);
                continue;
            }
            Err(e) => {
                let err = ExportError::Encoding(format!("stage task failed: {e}"));
                record_failure(&mut first_error, &s, None, err);
                continue;
            }
        };

        match outcome {
            Ok(StageOutcome::Source(reports)) => summary.reports = reports,
            Ok(StageOutcome::FanOut(lines)) => summary.lines = lines,
            Ok(StageOutcome::Sink(sink)) => {
                summary.rows = sink.rows;
                summary.bytes = sink.bytes;
            }
            Err(e) => record_failure(&mut first_error, &s, Some(stage), e),
        }
    }
    summary.elapsed = s.started.elapsed();

    match first_error {
        None => {
            s.closer.close();
            info!(
                "Export {} finished: {} reports, {} rows, {} bytes in {:.2}s",
                s.file_name,
                summary.reports,
                summary.rows,
                summary.bytes,
                summary.elapsed.as_secs_f64()
            );
            Ok(summary)
        }
        Some(err) => {
            if err.is_cancelled() {
                info!("Export {} cancelled", s.file_name);
            } else {
                warn!("Export {} failed: {}", s.file_name, err);
            }
            s.closer.abort(err.clone());
            Err(err)
        }
    }
}

fn record_failure(
    first_error: &mut Option<ExportError>,
    s: &Supervision,
    stage: Option<Stage>,
    err: ExportError,
) {
    if first_error.is_some() {
        debug!("Discarding later error from {:?}: {}", stage, err);
        return;
    }
    debug!("First error from {:?}: {}", stage, err);
    s.scope.cancel();
    s.reports.close_with_error(err.clone());
    s.lines.close_with_error(err.clone());
    *first_error = Some(err);
}
