//! HTML parsers for listing and detail pages
//!
//! This module contains the extraction side of the pipeline:
//! - `listing`: cards on a paginated listing page -> record stubs
//! - `detail`: one detail page -> enrichment of a stub
//! - `fields`: pure text-to-value helpers shared by both
//!
//! Selectors are the part expected to drift with the site's markup; every
//! field is extracted independently so one miss never blocks the others.

pub mod detail;
pub mod fields;
pub mod listing;

pub use detail::DetailParser;
pub use fields::{
    canonical_url, currency_amounts, days_since, normalize_whitespace, parse_amount,
    parse_currency_amount, parse_days_running, resolve_url,
};
pub use listing::ListingParser;

/// Markers of captcha and bot-challenge interstitials.
///
/// Cloudflare also injects a `/cdn-cgi/challenge-platform/` beacon script into
/// ordinary pages, so the script path alone is not a marker.
const CHALLENGE_SIGNATURES: &[&str] = &[
    "cf-challenge",
    "px-captcha",
    "<title>just a moment...</title>",
    "<title>access denied</title>",
    "are you a robot",
    "verify you are human",
];

/// Whether `body` looks like a captcha or bot-challenge page rather than content.
pub fn is_challenge_page(body: &str) -> bool {
    let lower = body.to_lowercase();
    CHALLENGE_SIGNATURES.iter().any(|sig| lower.contains(sig))
}
