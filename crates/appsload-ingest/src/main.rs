//! appsload - device app log loader

use anyhow::{Context, Result};
use appsload_common::logging::{init_logging, LogConfig, LogLevel};
use appsload_common::LoadError;
use appsload_ingest::batch::BatchDriver;
use appsload_ingest::cli::Cli;
use appsload_ingest::config::LoaderConfig;
use appsload_ingest::envelope;
use clap::Parser;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = LoaderConfig::from_cli(&cli)?;

    // Dry runs report every write at debug level
    let log_level = if cli.verbose || config.dry_run {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let mut log_config = LogConfig::builder()
        .level(log_level)
        .show_targets(cli.verbose);
    if let Some(ref path) = config.log_file {
        log_config = log_config.log_file(path);
    }

    // Environment variables take precedence
    let log_config = log_config.build().merge_env()?;
    let _guard = init_logging(&log_config).context("Failed to initialize logging")?;

    if cli.test {
        let checked = envelope::self_check().map_err(|e| LoadError::SelfCheck(e.to_string()))?;
        info!(records = checked, "Envelope self-check passed");
        return Ok(());
    }

    info!(
        pattern = %config.pattern,
        dry_run = config.dry_run,
        workers = config.workers,
        routes = config.routes.len(),
        "Memc loader started"
    );

    match BatchDriver::from_config(&config).run(&config.pattern).await {
        Ok(report) => {
            info!(
                files = report.files_seen(),
                successful = report.successful(),
                "Loading complete"
            );
            Ok(())
        },
        Err(e) => {
            error!(error = %e, "Unexpected error");
            Err(e.into())
        },
    }
}
