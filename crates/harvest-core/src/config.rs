//! Run configuration
//!
//! Defaults mirror the limits the pipeline was tuned for. A JSON file may
//! override any subset of keys; the CLI may override the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HarvestError, Result};
use crate::rate_limit::DelayBands;

/// Placeholder replaced with the 1-based page number
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// Placeholder replaced with the percent-encoded category
pub const CATEGORY_PLACEHOLDER: &str = "{category}";

/// Default listing template
const DEFAULT_LISTING_URL: &str = "https://www.gofundme.com/discover/{category}?page={page}";

/// Default listing category
const DEFAULT_CATEGORY: &str = "animal-fundraiser";

/// Configuration consumed by the [`Harvester`](crate::Harvester)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Listing URL template; must contain `{page}`
    pub listing_url: String,
    /// Value substituted for `{category}`
    pub category: String,
    /// Stop after exporting this many records
    pub max_campaigns: u32,
    /// Stop after visiting this many listing pages
    pub max_pages: u32,
    /// Stop after this many consecutive pages without cards
    pub empty_page_threshold: u32,
    /// Attempts per request before a fetch is reported as failed
    pub retry_attempts: u32,
    /// Per-request timeout
    pub request_timeout_secs: u64,
    /// Politeness delay bands
    pub delays: DelayBands,
    /// CSV output path
    pub csv_path: PathBuf,
    /// JSON output path
    pub json_path: PathBuf,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_LISTING_URL.to_string(),
            category: DEFAULT_CATEGORY.to_string(),
            max_campaigns: 100,
            max_pages: 25,
            empty_page_threshold: 2,
            retry_attempts: 3,
            request_timeout_secs: 15,
            delays: DelayBands::default(),
            csv_path: PathBuf::from("campaigns.csv"),
            json_path: PathBuf::from("campaigns.json"),
        }
    }
}

impl HarvestConfig {
    /// Load a config file; keys missing from the file keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_campaigns == 0 {
            return Err(HarvestError::Config("max_campaigns must be at least 1".into()));
        }
        if self.max_pages == 0 {
            return Err(HarvestError::Config("max_pages must be at least 1".into()));
        }
        if self.empty_page_threshold == 0 {
            return Err(HarvestError::Config(
                "empty_page_threshold must be at least 1".into(),
            ));
        }
        if self.retry_attempts == 0 {
            return Err(HarvestError::Config("retry_attempts must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(HarvestError::Config(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        if !self.listing_url.contains(PAGE_PLACEHOLDER) {
            return Err(HarvestError::Config(format!(
                "listing_url must contain {PAGE_PLACEHOLDER}"
            )));
        }
        if self.csv_path == self.json_path {
            return Err(HarvestError::Config(
                "csv_path and json_path must differ".into(),
            ));
        }
        self.delays.validate()?;
        self.listing_page_url(1)?;
        Ok(())
    }

    /// Absolute URL of listing page `page` (1-based).
    pub fn listing_page_url(&self, page: u32) -> Result<Url> {
        let category = urlencoding::encode(self.category.trim());
        let raw = self
            .listing_url
            .replace(CATEGORY_PLACEHOLDER, &category)
            .replace(PAGE_PLACEHOLDER, &page.to_string());
        Url::parse(&raw).map_err(|e| HarvestError::InvalidUrl(format!("{raw}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::BandRange;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = HarvestConfig::default();
        assert_eq!(config.max_campaigns, 100);
        assert_eq!(config.max_pages, 25);
        assert_eq!(config.empty_page_threshold, 2);
        assert_eq!(config.retry_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_listing_page_url() {
        let config = HarvestConfig::default();
        assert_eq!(
            config.listing_page_url(3).unwrap().as_str(),
            "https://www.gofundme.com/discover/animal-fundraiser?page=3"
        );
    }

    #[test]
    fn test_listing_page_url_encodes_category() {
        let config = HarvestConfig {
            category: "dogs & cats".to_string(),
            ..HarvestConfig::default()
        };
        assert_eq!(
            config.listing_page_url(1).unwrap().as_str(),
            "https://www.gofundme.com/discover/dogs%20%26%20cats?page=1"
        );
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let config = HarvestConfig {
            max_campaigns: 0,
            ..HarvestConfig::default()
        };
        assert!(matches!(config.validate(), Err(HarvestError::Config(_))));

        let config = HarvestConfig {
            max_pages: 0,
            ..HarvestConfig::default()
        };
        assert!(matches!(config.validate(), Err(HarvestError::Config(_))));

        let config = HarvestConfig {
            retry_attempts: 0,
            ..HarvestConfig::default()
        };
        assert!(matches!(config.validate(), Err(HarvestError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_missing_page_placeholder() {
        let config = HarvestConfig {
            listing_url: "https://example.test/list".to_string(),
            ..HarvestConfig::default()
        };
        match config.validate() {
            Err(HarvestError::Config(msg)) => assert!(msg.contains("{page}")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_unparseable_url() {
        let config = HarvestConfig {
            listing_url: "not a url {page}".to_string(),
            ..HarvestConfig::default()
        };
        assert!(matches!(config.validate(), Err(HarvestError::InvalidUrl(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_band() {
        let mut config = HarvestConfig::default();
        config.delays.page = BandRange::new(10.0, 5.0);
        assert!(matches!(config.validate(), Err(HarvestError::Config(_))));
    }

    #[test]
    fn test_from_json_file_partial_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "max_campaigns": 10, "delays": {{ "card": {{ "min_secs": 1.0, "max_secs": 2.0 }} }} }}"#
        )
        .unwrap();

        let config = HarvestConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.max_campaigns, 10);
        assert_eq!(config.max_pages, 25);
        assert_eq!(config.delays.card, BandRange::new(1.0, 2.0));
        assert_eq!(config.delays.page, BandRange::new(5.0, 10.0));
    }
}
