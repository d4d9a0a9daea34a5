//! Shared fixtures for pipeline tests: a scripted site and HTML builders.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use harvest_core::{DetailParser, HarvestConfig, NetworkError, Transport};
use tokio::time::Instant;

pub const LISTING_TEMPLATE: &str = "https://listing.test/discover?page={page}";

pub fn listing_url(page: u32) -> String {
    format!("https://listing.test/discover?page={page}")
}

pub fn detail_url(slug: &str) -> String {
    format!("https://listing.test/f/{slug}")
}

pub fn config() -> HarvestConfig {
    HarvestConfig {
        listing_url: LISTING_TEMPLATE.to_string(),
        ..HarvestConfig::default()
    }
}

pub fn detail_parser() -> DetailParser {
    DetailParser::with_today(NaiveDate::from_ymd_opt(2025, 10, 26).unwrap())
}

/// Listing page with one card per `(slug, title, amount text)`.
pub fn listing_html(cards: &[(&str, &str, &str)]) -> String {
    let cards: String = cards
        .iter()
        .map(|(slug, title, amount)| {
            format!(
                r#"<div class="campaign-card">
                     <a href="/f/{slug}?qid=xyz"><div class="campaign-title">{title}</div></a>
                     <span class="amount-raised">{amount}</span>
                   </div>"#
            )
        })
        .collect();
    format!("<html><body><div class=\"results\">{cards}</div></body></html>")
}

pub fn empty_listing_html() -> String {
    "<html><body><p>No fundraisers match your search.</p></body></html>".to_string()
}

pub fn detail_html(description: &str, days_ago: u32) -> String {
    format!(
        r#"<html><head>
             <meta property="og:image" content="https://images.test/{days_ago}.jpg">
           </head><body>
             <div class="campaign-description">{description}</div>
             <span class="m-campaign-byline-created">Created {days_ago} d ago</span>
           </body></html>"#
    )
}

/// Scripted site. Each URL replays its responses in order; the last one
/// repeats. Unknown URLs answer 404.
#[derive(Default)]
pub struct FakeSite {
    responses: Mutex<HashMap<String, VecDeque<Result<String, NetworkError>>>>,
    calls: Mutex<Vec<(Instant, String)>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.respond(url, vec![Ok(body.into())])
    }

    pub fn respond(self, url: impl Into<String>, responses: Vec<Result<String, NetworkError>>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.into(), responses.into());
        self
    }

    pub fn calls(&self) -> Vec<(Instant, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|(_, url)| url).collect()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls().iter().filter(|(_, u)| u == url).count()
    }
}

#[async_trait]
impl Transport for FakeSite {
    async fn request(&self, url: &str) -> Result<String, NetworkError> {
        self.calls.lock().unwrap().push((Instant::now(), url.to_string()));
        let mut responses = self.responses.lock().unwrap();
        let Some(queue) = responses.get_mut(url) else {
            return Err(NetworkError::Status(404));
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap_or(Err(NetworkError::Status(404)))
        } else {
            queue.front().cloned().unwrap_or(Err(NetworkError::Status(404)))
        }
    }
}
