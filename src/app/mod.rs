//! Application entry points behind the CLI.
//!
//! Opens the database, then either serves exports over HTTP or runs a single
//! export to a file or stdout.

mod shutdown;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use log::info;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::config::{Command, Config};
use crate::export::{ExportRequest, ExportSummary, ReportExporter};
use crate::server::{start_server, AppState};
use crate::storage::{init_db_pool_with_path, run_migrations, SqliteReportStore};

use shutdown::cancel_on_signal;

/// What a finished run did.
#[derive(Debug)]
pub enum RunOutcome {
    /// The server shut down.
    Served,
    /// A one-shot export completed.
    Exported {
        file_name: String,
        output: Option<PathBuf>,
        summary: ExportSummary,
    },
}

/// Runs the command selected in `config`.
///
/// # Errors
///
/// Returns an error for invalid configuration, database setup failures, and
/// failed exports.
pub async fn run(config: Config) -> Result<RunOutcome> {
    config.validate()?;

    let pool = init_db_pool_with_path(&config.db_path, config.max_connections)
        .await
        .context("Failed to initialize database pool")?;
    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let store = Arc::new(SqliteReportStore::new(Arc::clone(&pool)));
    let exporter = ReportExporter::new(store, config.export_options());

    let outcome = match &config.command {
        Command::Serve { listen } => serve(*listen, exporter).await.map(|_| RunOutcome::Served),
        Command::Export {
            shop_id,
            start_time,
            end_time,
            output,
        } => {
            let request = ExportRequest::new(*shop_id, *start_time, *end_time);
            export_once(&exporter, &request, output.as_deref()).await
        }
    };

    pool.close().await;
    outcome
}

async fn serve(listen: SocketAddr, exporter: ReportExporter) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    start_server(listener, AppState::new(exporter, shutdown)).await
}

/// Runs one export and writes it to `output`, or stdout when `None`.
pub async fn export_once(
    exporter: &ReportExporter,
    request: &ExportRequest,
    output: Option<&Path>,
) -> Result<RunOutcome> {
    let cancel = CancellationToken::new();
    let signal_watcher = tokio::spawn(cancel_on_signal(cancel.clone()));

    let result = write_export(exporter, request, output, &cancel).await;

    cancel.cancel();
    let _ = signal_watcher.await;
    result
}

async fn write_export(
    exporter: &ReportExporter,
    request: &ExportRequest,
    output: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<RunOutcome> {
    let mut export = exporter.export(request, cancel)?;
    info!("Exporting {}", export.file_name);

    let mut sink: Box<dyn AsyncWrite + Unpin + Send> = match output {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };

    while let Some(chunk) = export.stream.next().await {
        let chunk = chunk?;
        sink.write_all(&chunk)
            .await
            .context("Failed to write export output")?;
    }
    sink.flush().await.context("Failed to flush export output")?;

    let summary = export.handle.wait().await?;
    Ok(RunOutcome::Exported {
        file_name: export.file_name,
        output: output.map(Path::to_path_buf),
        summary,
    })
}
