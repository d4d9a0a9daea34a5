//! Command-line arguments and their merge into [`HarvestConfig`].

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use harvest_core::{BandRange, HarvestConfig};

#[derive(Debug, Parser)]
#[command(name = "harvest")]
#[command(about = "Crawl a paginated listing site and export records to CSV and JSON")]
#[command(version)]
pub struct Cli {
    /// JSON config file; flags given here override its values
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Listing URL template containing {page} (and optionally {category})
    #[arg(long, value_name = "TEMPLATE")]
    pub listing_url: Option<String>,

    /// Category substituted for {category}
    #[arg(long)]
    pub category: Option<String>,

    /// Stop after exporting this many records
    #[arg(long, value_name = "N")]
    pub max_campaigns: Option<u32>,

    /// Stop after visiting this many listing pages
    #[arg(long, value_name = "N")]
    pub max_pages: Option<u32>,

    /// CSV output path
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// JSON output path
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Wait before each card, in seconds
    #[arg(long, value_name = "MIN-MAX")]
    pub card_delay: Option<BandRange>,

    /// Wait before each detail request, in seconds
    #[arg(long, value_name = "MIN-MAX")]
    pub detail_delay: Option<BandRange>,

    /// Wait before each listing page request, in seconds
    #[arg(long, value_name = "MIN-MAX")]
    pub page_delay: Option<BandRange>,

    /// Attempts per request
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,
}

impl Cli {
    /// Defaults, then the config file, then flags. The result is validated.
    pub fn into_config(self) -> Result<HarvestConfig> {
        let mut config = match &self.config {
            Some(path) => HarvestConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?,
            None => HarvestConfig::default(),
        };

        if let Some(listing_url) = self.listing_url {
            config.listing_url = listing_url;
        }
        if let Some(category) = self.category {
            config.category = category;
        }
        if let Some(max_campaigns) = self.max_campaigns {
            config.max_campaigns = max_campaigns;
        }
        if let Some(max_pages) = self.max_pages {
            config.max_pages = max_pages;
        }
        if let Some(csv) = self.csv {
            config.csv_path = csv;
        }
        if let Some(json) = self.json {
            config.json_path = json;
        }
        if let Some(card) = self.card_delay {
            config.delays.card = card;
        }
        if let Some(detail) = self.detail_delay {
            config.delays.detail = detail;
        }
        if let Some(page) = self.page_delay {
            config.delays.page = page;
        }
        if let Some(retries) = self.retries {
            config.retry_attempts = retries;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}
