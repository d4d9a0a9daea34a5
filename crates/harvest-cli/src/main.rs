//! `harvest` binary
//!
//! Parses flags, sets up logging, and runs one harvest into the configured
//! CSV and JSON files. Ctrl-C stops the run after the record in flight.

use anyhow::{Context, Result};
use clap::Parser;
use harvest_core::{ExportSink, Harvester};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,harvest_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Cli::parse().into_config()?;
    tracing::info!(
        listing_url = %config.listing_url,
        max_campaigns = config.max_campaigns,
        max_pages = config.max_pages,
        "configuration loaded"
    );

    // Previous outputs survive until this run exports its first record.
    let mut sink = ExportSink::deferred(&config.csv_path, &config.json_path)
        .context("Failed to prepare output files")?;
    let harvester = Harvester::new(config).context("Failed to create harvester")?;

    let stop = harvester.stop_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current record");
            stop.stop();
        }
    });

    let summary = harvester.run(&mut sink).await.context("Harvest failed")?;
    sink.finish().context("Failed to write output files")?;
    tracing::info!(
        records = summary.records_exported,
        partial = summary.partial_records,
        csv = %sink.csv_path().display(),
        json = %sink.json_path().display(),
        "outputs written"
    );
    Ok(())
}
