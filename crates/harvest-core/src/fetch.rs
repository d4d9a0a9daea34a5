//! Listing and detail fetchers
//!
//! Both fetchers share one bounded-retry routine. The politeness wait for the
//! fetcher's band runs before every attempt and is the only backoff between
//! attempts. Exhausting the budget yields a [`FetchFailure`] value instead of
//! an error so the caller can decide between skipping and downgrading.

use crate::error::{FetchFailure, NetworkError};
use crate::rate_limit::RateLimiter;
use crate::session::Transport;
use crate::types::DelayBand;

/// Fixed attempt budget for a single URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Whether the first attempt is preceded by a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Wait before every attempt
    EveryAttempt,
    /// Skip the wait before the first attempt only (first listing page)
    SkipFirst,
}

/// Run `url` through `transport` under `policy`, waiting on `band` per attempt.
pub async fn fetch_with_retry(
    transport: &dyn Transport,
    limiter: &RateLimiter,
    band: DelayBand,
    pacing: Pacing,
    policy: RetryPolicy,
    url: &str,
) -> Result<String, FetchFailure> {
    let max_attempts = policy.max_attempts.max(1);
    let mut all_blocked = true;
    let mut last_error = NetworkError::Other("no attempt made".to_string());

    for attempt in 1..=max_attempts {
        if attempt > 1 || pacing == Pacing::EveryAttempt {
            limiter.wait(band).await;
        }

        match transport.request(url).await {
            Ok(body) => return Ok(body),
            Err(err) => {
                tracing::debug!(url, attempt, max_attempts, error = %err, "request failed");
                all_blocked &= err.is_block_signal();
                last_error = err;
            }
        }
    }

    let failure = FetchFailure {
        url: url.to_string(),
        attempts: max_attempts,
        last_error,
        blocked: all_blocked,
    };
    tracing::warn!(url, blocked = failure.blocked, error = %failure.last_error, "fetch failed");
    Err(failure)
}

/// Fetches listing pages, paced by the page band
pub struct ListingFetcher<'a> {
    transport: &'a dyn Transport,
    limiter: &'a RateLimiter,
    policy: RetryPolicy,
}

impl<'a> ListingFetcher<'a> {
    pub fn new(transport: &'a dyn Transport, limiter: &'a RateLimiter, policy: RetryPolicy) -> Self {
        Self {
            transport,
            limiter,
            policy,
        }
    }

    /// Fetch a listing page. The first page of a run is not preceded by a
    /// page delay; its retries are.
    pub async fn fetch(&self, url: &str, first_page: bool) -> Result<String, FetchFailure> {
        let pacing = if first_page {
            Pacing::SkipFirst
        } else {
            Pacing::EveryAttempt
        };
        fetch_with_retry(
            self.transport,
            self.limiter,
            DelayBand::PageDelay,
            pacing,
            self.policy,
            url,
        )
        .await
    }
}

/// Fetches detail pages, paced by the detail band
pub struct DetailFetcher<'a> {
    transport: &'a dyn Transport,
    limiter: &'a RateLimiter,
    policy: RetryPolicy,
}

impl<'a> DetailFetcher<'a> {
    pub fn new(transport: &'a dyn Transport, limiter: &'a RateLimiter, policy: RetryPolicy) -> Self {
        Self {
            transport,
            limiter,
            policy,
        }
    }

    /// Fetch a detail page, waiting on the detail band before every attempt.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchFailure> {
        fetch_with_retry(
            self.transport,
            self.limiter,
            DelayBand::DetailDelay,
            Pacing::EveryAttempt,
            self.policy,
            url,
        )
        .await
    }
}
