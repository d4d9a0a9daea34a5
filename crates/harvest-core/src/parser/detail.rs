//! Detail page parser
//!
//! Enriches a listing stub with the fields only the detail page carries.
//! Each field has its own extractor; a missing field keeps the stub's prior
//! value and never blocks the others.

use chrono::{NaiveDate, Utc};
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

use super::fields::{
    currency_amounts, days_since, normalize_whitespace, parse_amount, parse_days_running,
    resolve_url,
};
use crate::types::{Completeness, Record};

/// Containers holding the long-form story
const DESCRIPTION_SELECTORS: &[&str] = &[
    "div[class*='campaign-description']",
    "div[class*='description']",
    "div[class*='Description']",
    "div[class*='story']",
    "div[class*='Story']",
];

/// Meta tags carrying a short description
const DESCRIPTION_META_SELECTORS: &[&str] = &[
    "meta[property='og:description']",
    "meta[name='description']",
];

/// Elements showing the amount raised
const AMOUNT_SELECTORS: &[&str] = &[
    "[class*='raised']",
    "[class*='Raised']",
    "[class*='progress-meter']",
    "[class*='amount']",
    "[class*='Amount']",
];

/// Elements showing when the listing was created
const CREATED_SELECTORS: &[&str] = &[
    "[class*='byline-created']",
    "[class*='created']",
    "[class*='Created']",
];

/// Parser for detail pages
pub struct DetailParser {
    today: NaiveDate,
}

impl Default for DetailParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DetailParser {
    /// Create a parser measuring `daysRunning` against the current UTC date
    pub fn new() -> Self {
        Self::with_today(Utc::now().date_naive())
    }

    /// Create a parser measuring `daysRunning` against a fixed date
    pub fn with_today(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Merge whatever the detail page exposes into `stub`.
    ///
    /// An empty or content-free body returns the stub unchanged, still
    /// `Partial`. Otherwise the result is `Full`, even if individual fields
    /// were not found.
    pub fn enrich(&self, mut stub: Record, html: &str) -> Record {
        if html.trim().is_empty() {
            tracing::debug!(url = %stub.source_url, "empty detail page");
            return stub;
        }
        let document = Html::parse_document(html);
        if !has_content(&document) {
            tracing::debug!(url = %stub.source_url, "detail page has no content");
            return stub;
        }

        let base = Url::parse(&stub.source_url).ok();
        let structured = json_ld_blocks(&document);

        match extract_description(&document, &structured) {
            Some(description) => stub.description = Some(description),
            None => tracing::debug!(url = %stub.source_url, "description not found"),
        }

        let images = base
            .as_ref()
            .map(|base| extract_images(&document, &structured, base))
            .unwrap_or_default();
        if images.is_empty() {
            tracing::debug!(url = %stub.source_url, "no detail images found");
        }
        stub.merge_images(images);

        if stub.amount_raised.is_none() {
            stub.amount_raised = extract_amount(&document);
            if stub.amount_raised.is_none() {
                tracing::debug!(url = %stub.source_url, "amount raised not found");
            }
        }

        match extract_days_running(&document, &structured, self.today) {
            Some(days) => stub.days_running = Some(days),
            None => tracing::debug!(url = %stub.source_url, "days running not found"),
        }

        if stub.title.is_none() {
            stub.title = extract_title(&document);
        }

        stub.completeness = Completeness::Full;
        stub
    }
}

/// A document with no visible text and no metadata is an error page.
fn has_content(document: &Html) -> bool {
    let has_text = document
        .root_element()
        .text()
        .any(|t| !t.trim().is_empty());
    let has_meta = Selector::parse("meta[content]")
        .map(|selector| document.select(&selector).next().is_some())
        .unwrap_or(false);
    has_text || has_meta
}

/// Parsed JSON-LD objects, with arrays and `@graph` flattened.
fn json_ld_blocks(document: &Html) -> Vec<Value> {
    let Ok(selector) = Selector::parse("script[type='application/ld+json']") else {
        return Vec::new();
    };
    let mut blocks = Vec::new();
    for script in document.select(&selector) {
        let text = script.text().collect::<String>();
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => flatten_json_ld(value, &mut blocks),
            Err(e) => tracing::debug!(error = %e, "skipping malformed JSON-LD block"),
        }
    }
    blocks
}

fn flatten_json_ld(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.into_iter().for_each(|v| flatten_json_ld(v, out)),
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                flatten_json_ld(graph, out);
            }
            out.push(Value::Object(map));
        }
        _ => {}
    }
}

fn meta_content(document: &Html, selector_str: &str) -> Option<String> {
    let selector = Selector::parse(selector_str).ok()?;
    document.select(&selector).find_map(|el| {
        let content = normalize_whitespace(el.value().attr("content")?);
        (!content.is_empty()).then_some(content)
    })
}

fn extract_description(document: &Html, structured: &[Value]) -> Option<String> {
    let from_json_ld = structured.iter().find_map(|block| {
        let text = normalize_whitespace(block.get("description")?.as_str()?);
        (!text.is_empty()).then_some(text)
    });

    from_json_ld
        .or_else(|| {
            DESCRIPTION_SELECTORS.iter().find_map(|selector_str| {
                let selector = Selector::parse(selector_str).ok()?;
                document.select(&selector).find_map(|el| {
                    let text = normalize_whitespace(&el.text().collect::<Vec<_>>().join(" "));
                    (!text.is_empty()).then_some(text)
                })
            })
        })
        .or_else(|| {
            DESCRIPTION_META_SELECTORS
                .iter()
                .find_map(|selector_str| meta_content(document, selector_str))
        })
}

fn extract_images(document: &Html, structured: &[Value], base: &Url) -> Vec<String> {
    let mut raw: Vec<String> = Vec::new();

    if let Ok(selector) = Selector::parse("meta[property='og:image']") {
        raw.extend(
            document
                .select(&selector)
                .filter_map(|el| el.value().attr("content"))
                .map(str::to_string),
        );
    }

    for block in structured {
        match block.get("image") {
            Some(Value::String(url)) => raw.push(url.clone()),
            Some(Value::Array(items)) => raw.extend(items.iter().filter_map(image_url)),
            Some(obj @ Value::Object(_)) => raw.extend(image_url(obj)),
            _ => {}
        }
    }

    let mut images: Vec<String> = Vec::new();
    for url in raw
        .iter()
        .filter_map(|href| resolve_url(base, href))
        .map(|url| url.to_string())
    {
        if !images.contains(&url) {
            images.push(url);
        }
    }
    images
}

fn image_url(value: &Value) -> Option<String> {
    match value {
        Value::String(url) => Some(url.clone()),
        Value::Object(map) => map.get("url")?.as_str().map(str::to_string),
        _ => None,
    }
}

fn extract_amount(document: &Html) -> Option<f64> {
    let from_element = AMOUNT_SELECTORS.iter().find_map(|selector_str| {
        let selector = Selector::parse(selector_str).ok()?;
        document
            .select(&selector)
            .find_map(|el| parse_amount(&el.text().collect::<Vec<_>>().join(" ")))
    });

    // No labelled element: take the largest dollar figure on the page.
    from_element.or_else(|| {
        currency_amounts(&page_text(document))
            .into_iter()
            .fold(None, |max: Option<f64>, v| Some(max.map_or(v, |m| m.max(v))))
    })
}

fn extract_days_running(document: &Html, structured: &[Value], today: NaiveDate) -> Option<u32> {
    let from_meta = meta_content(document, "meta[property='article:published_time']")
        .and_then(|ts| days_since(&ts, today));
    let from_json_ld = || {
        structured.iter().find_map(|block| {
            let ts = block.get("datePublished")?.as_str()?;
            days_since(ts, today)
        })
    };
    let from_byline = || {
        CREATED_SELECTORS.iter().find_map(|selector_str| {
            let selector = Selector::parse(selector_str).ok()?;
            document
                .select(&selector)
                .find_map(|el| parse_days_running(&el.text().collect::<Vec<_>>().join(" "), today))
        })
    };

    from_meta
        .or_else(from_json_ld)
        .or_else(from_byline)
        .or_else(|| parse_days_running(&page_text(document), today))
}

fn extract_title(document: &Html) -> Option<String> {
    meta_content(document, "meta[property='og:title']").or_else(|| {
        let selector = Selector::parse("h1").ok()?;
        document.select(&selector).find_map(|el| {
            let text = normalize_whitespace(&el.text().collect::<Vec<_>>().join(" "));
            (!text.is_empty()).then_some(text)
        })
    })
}

fn page_text(document: &Html) -> String {
    let Ok(selector) = Selector::parse("body") else {
        return String::new();
    };
    document
        .select(&selector)
        .flat_map(|body| body.text())
        .collect::<Vec<_>>()
        .join(" ")
}
