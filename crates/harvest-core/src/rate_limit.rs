//! Politeness delays
//!
//! Every network call is preceded by a randomized wait drawn from one of three
//! named bands. The wait is the only pacing and the only retry backoff in the
//! pipeline.

use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::error::{HarvestError, Result};
use crate::types::DelayBand;

/// Inclusive `[min, max]` wait range in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl BandRange {
    pub const fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    /// Check that the range can be sampled.
    pub fn validate(&self, name: &str) -> Result<()> {
        if !self.min_secs.is_finite() || !self.max_secs.is_finite() {
            return Err(HarvestError::Config(format!(
                "{name} bounds must be finite"
            )));
        }
        if self.min_secs < 0.0 {
            return Err(HarvestError::Config(format!(
                "{name} minimum must not be negative"
            )));
        }
        if self.min_secs > self.max_secs {
            return Err(HarvestError::Config(format!(
                "{name} minimum {} exceeds maximum {}",
                self.min_secs, self.max_secs
            )));
        }
        Ok(())
    }

    /// Whether `duration` lies inside the range
    pub fn contains(&self, duration: Duration) -> bool {
        let secs = duration.as_secs_f64();
        secs >= self.min_secs && secs <= self.max_secs
    }
}

impl std::str::FromStr for BandRange {
    type Err = HarvestError;

    /// Parse `"MIN-MAX"` (seconds), e.g. `"2-5"` or `"0.5-1.5"`.
    fn from_str(s: &str) -> Result<Self> {
        let (min, max) = s
            .split_once('-')
            .ok_or_else(|| HarvestError::Config(format!("expected MIN-MAX, got '{s}'")))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| HarvestError::Config(format!("invalid seconds value '{v}'")))
        };
        let range = BandRange::new(parse(min)?, parse(max)?);
        range.validate("delay band")?;
        Ok(range)
    }
}

/// The three delay bands used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayBands {
    pub card: BandRange,
    pub detail: BandRange,
    pub page: BandRange,
}

impl Default for DelayBands {
    fn default() -> Self {
        Self {
            card: BandRange::new(2.0, 5.0),
            detail: BandRange::new(3.0, 6.0),
            page: BandRange::new(5.0, 10.0),
        }
    }
}

impl DelayBands {
    /// Range configured for `band`
    pub fn range(&self, band: DelayBand) -> BandRange {
        match band {
            DelayBand::CardDelay => self.card,
            DelayBand::DetailDelay => self.detail,
            DelayBand::PageDelay => self.page,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.card.validate("card delay")?;
        self.detail.validate("detail delay")?;
        self.page.validate("page delay")
    }
}

/// Randomized wait generator
///
/// Draws a uniform duration from the requested band and suspends the caller
/// for it. The generator is seedable so tests can reproduce draws.
pub struct RateLimiter {
    bands: DelayBands,
    rng: Mutex<StdRng>,
}

impl RateLimiter {
    /// Create a limiter seeded from the operating system
    pub fn new(bands: DelayBands) -> Self {
        Self {
            bands,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Create a limiter with a fixed seed
    pub fn with_seed(bands: DelayBands, seed: u64) -> Self {
        Self {
            bands,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Configured bands
    pub fn bands(&self) -> &DelayBands {
        &self.bands
    }

    /// Draw a wait duration for `band` without sleeping.
    pub fn draw(&self, band: DelayBand) -> Duration {
        let range = self.bands.range(band);
        if range.max_secs <= range.min_secs {
            return Duration::from_secs_f64(range.min_secs);
        }
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Duration::from_secs_f64(rng.random_range(range.min_secs..=range.max_secs))
    }

    /// Suspend the caller for a random duration inside `band`.
    pub async fn wait(&self, band: DelayBand) {
        let delay = self.draw(band);
        tracing::debug!(?band, delay_ms = delay.as_millis() as u64, "politeness wait");
        sleep(delay).await;
    }
}
