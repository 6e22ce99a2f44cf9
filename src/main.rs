//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `report_exporter` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use report_exporter::initialization::init_logger_with;
use report_exporter::{run, Config, RunOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    // Try loading from current directory first, then from the executable's directory
    if dotenvy::dotenv().is_err() {
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let env_path = exe_dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                }
            }
        }
    }

    let config = Config::parse();

    let log_level = config.log_level.clone();
    let log_format = config.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    match run(config).await {
        Ok(RunOutcome::Served) => Ok(()),
        Ok(RunOutcome::Exported {
            file_name,
            output,
            summary,
        }) => {
            // stdout may carry the CSV itself, so the summary goes to stderr
            eprintln!(
                "Exported {} row{} ({} bytes) from {} report{} in {:.1}s",
                summary.rows,
                if summary.rows == 1 { "" } else { "s" },
                summary.bytes,
                summary.reports,
                if summary.reports == 1 { "" } else { "s" },
                summary.elapsed.as_secs_f64()
            );
            match output {
                Some(path) => eprintln!("Saved {} as {}", file_name, path.display()),
                None => eprintln!("Wrote {} to stdout", file_name),
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("report_exporter error: {:#}", e);
            process::exit(1);
        }
    }
}
