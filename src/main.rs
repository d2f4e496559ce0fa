//! sleet: decode CSV sources into NDJSON documents.
//!
//! Reads one or more CSV sources from the local filesystem, decodes them in
//! parallel chunks and writes one JSON object per row to a file or stdout.

use clap::Parser;
use snafu::prelude::*;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sleet::error::{ConfigSnafu, PipelineError};
use sleet::{Config, ImportJob, JobSummary, run_import};

/// CSV to NDJSON import tool.
#[derive(Parser, Debug)]
#[command(name = "sleet")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Override the configured output path ("-" for stdout).
    #[arg(short, long)]
    output: Option<String>,

    /// Dry run - validate configuration and headers and print the chunk plan.
    #[arg(long)]
    dry_run: bool,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    let args = Args::parse();

    // Logs go to stderr so NDJSON on stdout stays clean
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("sleet starting");

    let config = build_config(&args)?;

    if args.dry_run {
        return dry_run(config).await;
    }

    match run_import(config).await {
        Ok(summary) => {
            info!(
                "Import completed{}",
                if summary.cancelled { " (cancelled)" } else { "" }
            );
            log_summary(&summary);
            Ok(())
        }
        Err(e) => {
            if let Some(summary) = e.partial_summary() {
                error!("Import aborted");
                log_summary(summary);
            }
            Err(e)
        }
    }
}

fn log_summary(summary: &JobSummary) {
    info!("  Sources: {} ({} empty)", summary.sources, summary.empty_sources);
    info!("  Documents written: {}", summary.written);
    info!("  Rows skipped: {}", summary.skipped);
    info!(
        "  Chunks: {} succeeded, {} failed, {} cancelled",
        summary.chunks_succeeded, summary.chunks_failed, summary.chunks_cancelled
    );
    info!("  Bytes written: {}", summary.bytes_written);
    for failure in &summary.failures {
        info!(
            "  Failed chunk {} at line {}: [{}] {}",
            failure.chunk, failure.line, failure.kind, failure.message
        );
    }
}

/// Build configuration from arguments.
fn build_config(args: &Args) -> Result<Config, PipelineError> {
    let mut config = Config::from_file(&args.config).context(ConfigSnafu)?;
    if let Some(output) = &args.output {
        config.output.path = output.clone();
        config.validate().context(ConfigSnafu)?;
    }
    Ok(config)
}

/// Resolve every source header and log the chunk plan without decoding.
async fn dry_run(config: Config) -> Result<(), PipelineError> {
    info!("Dry run mode - validating configuration and headers");
    info!("Output: {}", config.output.path);
    info!("Arity policy: {}", config.csv.arity_policy);

    let paths = config.source.paths.clone();
    let job = ImportJob::new(config, CancellationToken::new())?;
    for path in &paths {
        match job.prepare_source(path).await? {
            Some(source) => {
                info!(
                    "{}: {} bytes, {} chunks, header: {}",
                    path,
                    source.len(),
                    source.chunks.len(),
                    source.header
                );
                for chunk in &source.chunks {
                    info!("  - {} (first line {})", chunk.id, chunk.first_line);
                }
            }
            None => info!("{}: empty source", path),
        }
    }

    info!("Configuration is valid");
    Ok(())
}
