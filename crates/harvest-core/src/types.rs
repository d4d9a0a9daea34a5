//! Data types for the harvest pipeline
//!
//! A [`Record`] starts life as a listing stub, is enriched by the detail
//! parser and is then handed, unchanged, to an export sink.

use serde::{Deserialize, Serialize};

/// Where a record's fields came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    /// Only listing-card fields; the detail page was not fetched or not parsed
    Partial,
    /// Detail page was fetched and parsed
    Full,
}

impl Completeness {
    /// Lowercase label used in the CSV export
    pub fn as_str(&self) -> &'static str {
        match self {
            Completeness::Partial => "partial",
            Completeness::Full => "full",
        }
    }
}

/// One harvested listing entry.
///
/// The canonical detail URL doubles as the identity key, so `source_url`
/// is the only stored copy of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Canonical detail-page URL
    pub source_url: String,
    /// Display title
    pub title: Option<String>,
    /// Long-form description from the detail page
    pub description: Option<String>,
    /// Amount raised, in currency units
    pub amount_raised: Option<f64>,
    /// Whole days since the listing was posted
    pub days_running: Option<u32>,
    /// Image URLs in discovery order
    pub image_urls: Vec<String>,
    /// Whether detail enrichment succeeded
    pub completeness: Completeness,
}

impl Record {
    /// Create a stub carrying only its identity
    pub fn stub(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            title: None,
            description: None,
            amount_raised: None,
            days_running: None,
            image_urls: Vec::new(),
            completeness: Completeness::Partial,
        }
    }

    /// Key used for deduplication
    pub fn identity_key(&self) -> &str {
        &self.source_url
    }

    /// Append image URLs that are not already present, keeping order
    pub fn merge_images<I>(&mut self, urls: I)
    where
        I: IntoIterator<Item = String>,
    {
        for url in urls {
            if !self.image_urls.contains(&url) {
                self.image_urls.push(url);
            }
        }
    }
}

/// Named politeness delay policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DelayBand {
    /// Before processing each listing card
    CardDelay,
    /// Before each detail-page request
    DetailDelay,
    /// Before each listing-page request after the first
    PageDelay,
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// `max_campaigns` records were exported
    MaxCampaigns,
    /// `max_pages` listing pages were visited
    MaxPages,
    /// Too many consecutive listing pages yielded no cards
    EmptyPages,
    /// The site answered with repeated 403/429 or a challenge page
    Blocked,
    /// An external stop signal was observed
    Cancelled,
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Listing pages requested, including failed ones
    pub pages_visited: u32,
    /// Records handed to the sink
    pub records_exported: u32,
    /// Exported records whose detail enrichment failed
    pub partial_records: u32,
    /// Stubs skipped because their identity key was already seen
    pub duplicates_skipped: u32,
    /// Listing pages whose fetch failed and were treated as empty
    pub failed_pages: u32,
    /// Termination condition
    pub stop_reason: StopReason,
}
