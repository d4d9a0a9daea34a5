//! Harvest orchestration
//!
//! Drives the sequential listing -> detail -> export loop. Listing pages are
//! visited in order, cards in page order, and records are exported in that
//! same order. Per-item failures degrade the item instead of aborting the run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::HarvestConfig;
use crate::dedup::Deduplicator;
use crate::error::{HarvestError, Result};
use crate::export::RecordSink;
use crate::fetch::{DetailFetcher, ListingFetcher, RetryPolicy};
use crate::parser::{DetailParser, ListingParser};
use crate::rate_limit::RateLimiter;
use crate::session::{ClientConfig, SessionContext, Transport};
use crate::types::{Completeness, DelayBand, RunSummary, StopReason};

/// Cooperative stop flag shared with whoever may interrupt the run
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop at its next loop boundary
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Main harvest API
///
/// Owns the transport, the politeness limiter and the detail parser. Each
/// call to [`Harvester::run`] starts with an empty deduplicator.
///
/// # Example
/// ```no_run
/// use harvest_core::{ExportSink, HarvestConfig, Harvester};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = HarvestConfig::default();
///     let mut sink = ExportSink::create(&config.csv_path, &config.json_path)?;
///     let harvester = Harvester::new(config)?;
///
///     let summary = harvester.run(&mut sink).await?;
///     println!("Exported {} records", summary.records_exported);
///     Ok(())
/// }
/// ```
pub struct Harvester<T: Transport> {
    transport: T,
    limiter: RateLimiter,
    detail_parser: DetailParser,
    config: HarvestConfig,
    stop: StopSignal,
}

impl Harvester<SessionContext> {
    /// Create a harvester with a fresh HTTP session.
    ///
    /// # Errors
    /// Returns `HarvestError::Config` if the configuration is invalid, or an
    /// HTTP error if the client cannot be created.
    pub fn new(config: HarvestConfig) -> Result<Self> {
        config.validate()?;
        let session = SessionContext::with_config(ClientConfig {
            timeout_secs: config.request_timeout_secs,
            ..ClientConfig::default()
        })?;
        Self::with_transport(config, session)
    }
}

impl<T: Transport> Harvester<T> {
    /// Create a harvester over any transport.
    ///
    /// This is useful for testing or when requests go through a custom
    /// client. Waits are drawn from `config.delays`.
    pub fn with_transport(config: HarvestConfig, transport: T) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            limiter: RateLimiter::new(config.delays),
            detail_parser: DetailParser::new(),
            config,
            stop: StopSignal::new(),
        })
    }

    /// Draw waits from a seeded generator so runs are reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.limiter = RateLimiter::with_seed(self.config.delays, seed);
        self
    }

    /// Replace the detail parser (e.g. to pin "today")
    pub fn with_detail_parser(mut self, detail_parser: DetailParser) -> Self {
        self.detail_parser = detail_parser;
        self
    }

    /// Handle that stops the run at the next page or card boundary
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Harvest until a termination condition fires, appending to `sink`.
    ///
    /// # Errors
    /// - `HarvestError::Unreachable` if the first listing page cannot be fetched
    /// - Any error from `sink`; records appended before it stay on disk
    pub async fn run<S: RecordSink + ?Sized>(&self, sink: &mut S) -> Result<RunSummary> {
        let policy = RetryPolicy {
            max_attempts: self.config.retry_attempts,
        };
        let listing_fetcher = ListingFetcher::new(&self.transport, &self.limiter, policy);
        let detail_fetcher = DetailFetcher::new(&self.transport, &self.limiter, policy);
        let mut dedup = Deduplicator::new();

        let mut pages_visited = 0u32;
        let mut records_exported = 0u32;
        let mut partial_records = 0u32;
        let mut duplicates_skipped = 0u32;
        let mut failed_pages = 0u32;
        let mut consecutive_empty = 0u32;

        let stop_reason = 'pages: loop {
            if self.stop.is_stopped() {
                break StopReason::Cancelled;
            }
            if pages_visited >= self.config.max_pages {
                break StopReason::MaxPages;
            }

            let page = pages_visited + 1;
            let page_url = self.config.listing_page_url(page)?;
            let fetched = listing_fetcher.fetch(page_url.as_str(), page == 1).await;
            pages_visited = page;

            let stubs = match fetched {
                Ok(body) => ListingParser::new(page_url.clone()).parse(&body),
                Err(failure) if failure.is_blocked() => {
                    tracing::warn!(page, error = %failure.last_error, "listing blocked, stopping run");
                    break StopReason::Blocked;
                }
                Err(failure) if page == 1 => {
                    return Err(HarvestError::Unreachable {
                        url: failure.url,
                        reason: failure.last_error.to_string(),
                    });
                }
                Err(failure) => {
                    tracing::warn!(page, error = %failure.last_error, "listing page failed, treating as empty");
                    failed_pages += 1;
                    Vec::new()
                }
            };

            tracing::info!(page, stubs = stubs.len(), url = %page_url, "listing page parsed");

            if stubs.is_empty() {
                consecutive_empty += 1;
                if consecutive_empty >= self.config.empty_page_threshold {
                    break StopReason::EmptyPages;
                }
                continue;
            }
            consecutive_empty = 0;

            for stub in stubs {
                if self.stop.is_stopped() {
                    break 'pages StopReason::Cancelled;
                }
                if !dedup.claim(stub.identity_key()) {
                    tracing::debug!(url = %stub.source_url, "skipping duplicate");
                    duplicates_skipped += 1;
                    continue;
                }

                self.limiter.wait(DelayBand::CardDelay).await;
                let (record, blocked) = match detail_fetcher.fetch(&stub.source_url).await {
                    Ok(body) => (self.detail_parser.enrich(stub, &body), false),
                    Err(failure) => {
                        tracing::warn!(url = %stub.source_url, error = %failure.last_error, "detail unavailable, exporting partial record");
                        (stub, failure.is_blocked())
                    }
                };

                if record.completeness == Completeness::Partial {
                    partial_records += 1;
                }
                let url = record.source_url.clone();
                sink.append(record)?;
                records_exported += 1;
                tracing::info!(
                    exported = records_exported,
                    max = self.config.max_campaigns,
                    url = %url,
                    "record exported"
                );

                if blocked {
                    tracing::warn!(url = %url, "detail blocked, stopping run");
                    break 'pages StopReason::Blocked;
                }
                if records_exported >= self.config.max_campaigns {
                    break 'pages StopReason::MaxCampaigns;
                }
            }
        };

        let summary = RunSummary {
            pages_visited,
            records_exported,
            partial_records,
            duplicates_skipped,
            failed_pages,
            stop_reason,
        };
        tracing::info!(
            pages = summary.pages_visited,
            exported = summary.records_exported,
            partial = summary.partial_records,
            duplicates = summary.duplicates_skipped,
            reason = ?summary.stop_reason,
            "harvest finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkError;
    use crate::rate_limit::{BandRange, DelayBands};
    use crate::types::Record;
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl Transport for Unreachable {
        async fn request(&self, _url: &str) -> std::result::Result<String, NetworkError> {
            Err(NetworkError::Connect("connection refused".to_string()))
        }
    }

    #[test]
    fn test_harvester_creation() {
        assert!(Harvester::new(HarvestConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = HarvestConfig {
            max_campaigns: 0,
            ..HarvestConfig::default()
        };
        match Harvester::new(config) {
            Err(HarvestError::Config(msg)) => assert!(msg.contains("max_campaigns")),
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_limiter_uses_configured_delays() {
        let delays = DelayBands {
            card: BandRange::new(0.5, 1.0),
            ..DelayBands::default()
        };
        let config = HarvestConfig {
            delays,
            ..HarvestConfig::default()
        };
        let harvester = Harvester::with_transport(config, Unreachable).unwrap();
        assert_eq!(*harvester.limiter.bands(), delays);

        let seeded = harvester.with_seed(3);
        assert_eq!(*seeded.limiter.bands(), delays);
    }

    #[test]
    fn test_stop_signal_is_shared() {
        let harvester = Harvester::with_transport(HarvestConfig::default(), Unreachable).unwrap();
        let signal = harvester.stop_signal();
        assert!(!harvester.stop.is_stopped());
        signal.stop();
        assert!(harvester.stop.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_first_page_aborts() {
        let harvester = Harvester::with_transport(HarvestConfig::default(), Unreachable).unwrap();
        let mut sink: Vec<Record> = Vec::new();

        match harvester.run(&mut sink).await {
            Err(HarvestError::Unreachable { url, reason }) => {
                assert!(url.ends_with("page=1"));
                assert!(reason.contains("connection refused"));
            }
            other => panic!("Expected Unreachable error, got {:?}", other.map(|s| s.stop_reason)),
        }
        assert!(sink.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_before_start_exports_nothing() {
        let harvester = Harvester::with_transport(HarvestConfig::default(), Unreachable).unwrap();
        harvester.stop_signal().stop();

        let mut sink: Vec<Record> = Vec::new();
        let summary = harvester.run(&mut sink).await.unwrap();
        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert_eq!(summary.pages_visited, 0);
        assert!(sink.is_empty());
    }
}
