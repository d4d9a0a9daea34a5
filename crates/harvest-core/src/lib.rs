//! Listing Harvest Core Library
//!
//! This crate provides the crawl-and-extraction pipeline for paginated
//! listing sites whose markup is inconsistent and sometimes incomplete.
//!
//! # Features
//! - Randomized politeness delays before every request
//! - Cookie-persisting HTTP session with browser-like headers
//! - Bounded retries that degrade instead of failing the run
//! - Per-field extraction that tolerates missing markup
//! - Run-scoped deduplication by canonical detail URL
//! - Incremental CSV and JSON export that stays consistent after every record

pub mod config;
pub mod dedup;
pub mod error;
pub mod export;
pub mod fetch;
pub mod harvester;
pub mod parser;
pub mod rate_limit;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use config::HarvestConfig;
pub use dedup::Deduplicator;
pub use error::{FetchFailure, HarvestError, NetworkError, Result};
pub use export::{ExportSink, RecordSink};
pub use fetch::{DetailFetcher, ListingFetcher, RetryPolicy};
pub use harvester::{Harvester, StopSignal};
pub use parser::{DetailParser, ListingParser};
pub use rate_limit::{BandRange, DelayBands, RateLimiter};
pub use session::{ClientConfig, SessionContext, Transport};
pub use types::{Completeness, DelayBand, Record, RunSummary, StopReason};
