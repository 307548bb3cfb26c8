//! consolidate - deduplicating file consolidation index
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use consolidate::config::{CliArgs, IngestConfig};
use consolidate::error::ConfigError;
use consolidate::progress::{print_header, print_summary};
use consolidate::repo::BackendRegistry;
use consolidate::walker::{Ingestor, LogConsumer, LogOptions};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = IngestConfig::from_args(args).context("Invalid configuration")?;

    // Select the backend by name; nothing else depends on which one it is
    let registry = BackendRegistry::new(&config.database);
    let repo = registry
        .create(&config.backend)
        .ok_or_else(|| ConfigError::UnknownBackend {
            name: config.backend.clone(),
            known: registry.names(),
        })
        .context("Invalid configuration")?;
    info!(backend = %config.backend, "Using backend");

    if config.show_progress {
        print_header(&config);
    }

    let (consumer, sink) = LogConsumer::spawn(LogOptions {
        verbose: config.verbose,
        progress: config.show_progress,
    })
    .context("Failed to start log consumer")?;

    let ingestor = Ingestor::new(repo.clone(), config.excludes.clone());
    let stats = ingestor.run(&config.sources, sink);

    // Every handle is gone once run returns
    let log_stats = consumer.finish();
    if log_stats.errors > 0 {
        info!(errors = log_stats.errors, "Ingestion completed with errors");
    }

    if config.verbose {
        let names = repo.all_names().context("Failed to list names")?;
        let tags = repo.all_tags().context("Failed to list tags")?;
        println!("\nNAMES: [{}]\n", names.join(" "));
        println!(" TAGS: [{}]\n", tags.join(" "));
    }

    let summary = repo.summary().context("Failed to read repository summary")?;
    print_summary(&summary, &stats);

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("consolidate=debug,warn")
    } else {
        EnvFilter::new("consolidate=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
