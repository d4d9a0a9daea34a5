//! Free-text field parsers
//!
//! Pure functions turning scraped text into typed values. Each returns
//! `None` when the text carries no usable value; none of them fail.

use chrono::{DateTime, NaiveDate};
use url::Url;

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a monetary amount from free text.
///
/// A currency-marked number wins over a bare one. Thousands separators are
/// dropped and a `K`/`M` suffix is expanded.
///
/// # Examples
/// ```
/// use harvest_core::parser::parse_amount;
///
/// assert_eq!(parse_amount("$1,234 raised"), Some(1234.0));
/// assert_eq!(parse_amount("$1.5K raised"), Some(1500.0));
/// assert_eq!(parse_amount("no amount yet"), None);
/// ```
pub fn parse_amount(text: &str) -> Option<f64> {
    parse_currency_amount(text).or_else(|| {
        let re = regex_lite::Regex::new(r"(\d[\d,]*(?:\.\d+)?)\s*([kKmM])?([A-Za-z]?)").ok()?;
        let caps = re.captures(text)?;
        amount_from_parts(caps.get(1)?.as_str(), suffix(&caps))
    })
}

/// Parse the first amount that is preceded by a currency symbol.
pub fn parse_currency_amount(text: &str) -> Option<f64> {
    currency_amounts(text).into_iter().next()
}

/// Every currency-marked amount in `text`, in order of appearance.
pub fn currency_amounts(text: &str) -> Vec<f64> {
    let Ok(re) = regex_lite::Regex::new(r"[$€£]\s*(\d[\d,]*(?:\.\d+)?)\s*([kKmM])?([A-Za-z]?)")
    else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|caps| amount_from_parts(caps.get(1)?.as_str(), suffix(&caps)))
        .collect()
}

fn suffix(caps: &regex_lite::Captures<'_>) -> Option<char> {
    // "12 months" must not read as 12 million
    let trailing = caps.get(3).map(|m| m.as_str()).unwrap_or("");
    if !trailing.is_empty() {
        return None;
    }
    caps.get(2)?.as_str().chars().next()
}

fn amount_from_parts(number: &str, suffix: Option<char>) -> Option<f64> {
    let value: f64 = number.replace(',', "").parse().ok()?;
    let multiplier = match suffix.map(|c| c.to_ascii_lowercase()) {
        Some('k') => 1_000.0,
        Some('m') => 1_000_000.0,
        _ => 1.0,
    };
    let amount = value * multiplier;
    amount.is_finite().then_some(amount)
}

/// Derive whole days running from a relative or absolute posting string.
///
/// Understands `"5 hrs ago"` (0), `"3 d ago"`, `"12 days ago"`,
/// `"2 weeks ago"` and `"Created October 3, 2025"`. Dates after `today`
/// yield `None`.
pub fn parse_days_running(text: &str, today: NaiveDate) -> Option<u32> {
    let sub_day =
        regex_lite::Regex::new(r"(?i)\b\d+\s*(?:hrs?|hours?|mins?|minutes?|secs?|seconds?)\s+ago")
            .ok()?;
    if sub_day.is_match(text) {
        return Some(0);
    }

    let days = regex_lite::Regex::new(r"(?i)\b(\d+)\s*d(?:ays?)?\s+ago").ok()?;
    if let Some(caps) = days.captures(text) {
        return caps.get(1)?.as_str().parse().ok();
    }

    let weeks = regex_lite::Regex::new(r"(?i)\b(\d+)\s*(?:wks?|weeks?)\s+ago").ok()?;
    if let Some(caps) = weeks.captures(text) {
        let n: u32 = caps.get(1)?.as_str().parse().ok()?;
        return n.checked_mul(7);
    }

    let dated =
        regex_lite::Regex::new(r"\b([A-Z][a-z]+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b")
            .ok()?;
    for caps in dated.captures_iter(text) {
        let joined = format!("{} {} {}", &caps[1], &caps[2], &caps[3]);
        let date = NaiveDate::parse_from_str(&joined, "%B %d %Y")
            .or_else(|_| NaiveDate::parse_from_str(&joined, "%b %d %Y"));
        if let Ok(date) = date {
            return days_between(date, today);
        }
    }

    None
}

/// Days from an ISO-8601 timestamp or date to `today`.
pub fn days_since(timestamp: &str, today: NaiveDate) -> Option<u32> {
    let trimmed = timestamp.trim();
    let date = match DateTime::parse_from_rfc3339(trimmed) {
        Ok(dt) => dt.date_naive(),
        Err(_) => NaiveDate::parse_from_str(trimmed.get(..10)?, "%Y-%m-%d").ok()?,
    };
    days_between(date, today)
}

fn days_between(start: NaiveDate, today: NaiveDate) -> Option<u32> {
    u32::try_from((today - start).num_days()).ok()
}

/// Resolve `href` against `base` into an absolute http(s) URL.
pub fn resolve_url(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Canonical identity form of a detail URL: absolute, no query or fragment,
/// no trailing slash.
///
/// # Examples
/// ```
/// use harvest_core::parser::canonical_url;
/// use url::Url;
///
/// let base = Url::parse("https://www.gofundme.com/discover").unwrap();
/// assert_eq!(
///     canonical_url(&base, "/f/help-rex/?qid=abc#top").as_deref(),
///     Some("https://www.gofundme.com/f/help-rex")
/// );
/// ```
pub fn canonical_url(base: &Url, href: &str) -> Option<String> {
    let mut url = resolve_url(base, href)?;
    url.set_query(None);
    url.set_fragment(None);
    let path = url.path().trim_end_matches('/').to_string();
    if path.is_empty() {
        url.set_path("/");
    } else {
        url.set_path(&path);
    }
    Some(url.to_string())
}
