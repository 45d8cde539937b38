//! Rolls newline-delimited JSON events up into per-second metric points.
//!
//! Events are read from standard input, turned into samples by the configured metric definitions, and aggregated. Each
//! finalized point is written to standard output as a single line of JSON. Logs go to standard error.

#![deny(warnings)]
#![deny(missing_docs)]

use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser as _;
use rollup_app::prelude::*;
use rollup_config::{ConfigurationLoader, GenericConfiguration};
use rollup_core::{
    extract::{ExtractorConfiguration, SampleExtractor},
    sender::JsonLinesSender,
    Collector, CollectorConfiguration, GenericError,
};
use tokio::io::BufReader;
use tracing::{error, info, warn};

mod config;
use self::config::Cli;

mod ingest;
use self::ingest::ingest;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let configuration = match load_configuration(&cli) {
        Ok(configuration) => configuration,
        Err(e) => fatal_and_exit(format!("failed to load configuration: {:#}", e)),
    };

    let logging_config = LoggingConfiguration::from_configuration(&configuration)
        .unwrap_or_else(|e| fatal_and_exit(format!("invalid logging configuration: {}", e)));
    if let Err(e) = initialize_logging(&logging_config) {
        fatal_and_exit(format!("failed to initialize logging: {}", e));
    }

    match run(configuration).await {
        Ok(()) => info!("Rollup stopped."),
        Err(e) => {
            error!("{:?}", e);
            std::process::exit(1);
        }
    }
}

fn load_configuration(cli: &Cli) -> Result<GenericConfiguration, GenericError> {
    let mut loader = ConfigurationLoader::default();
    if let Some(path) = &cli.config_file {
        loader = loader
            .from_yaml(path)
            .with_context(|| format!("Failed to read configuration file '{}'.", path.display()))?;
    }

    Ok(loader.from_environment("rollup")?.into_generic())
}

async fn run(configuration: GenericConfiguration) -> Result<(), GenericError> {
    let collector_config =
        CollectorConfiguration::from_configuration(&configuration).context("Invalid collector configuration.")?;
    let extractor_config = configuration
        .as_typed::<ExtractorConfiguration>()
        .context("Invalid metric definitions.")?;
    let extractor = SampleExtractor::new(extractor_config).context("Invalid metric definitions.")?;
    if extractor.is_empty() {
        warn!("No metrics are configured. Events will be read but nothing will be emitted.");
    }

    info!(
        flush_interval = ?collector_config.flush_interval(),
        staleness_timeout = ?collector_config.staleness_timeout(),
        "Rollup starting..."
    );

    let sender = Arc::new(JsonLinesSender::new(tokio::io::stdout()));
    let (collector, shutdown) = Collector::start(collector_config, sender);

    let events = ingest(
        BufReader::new(tokio::io::stdin()),
        &extractor,
        &collector,
        tokio::signal::ctrl_c(),
    )
    .await;

    let drained = shutdown.drain().await;
    info!(events, drained, "Finished processing events.");

    Ok(())
}
