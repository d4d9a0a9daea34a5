//! Listing page parser
//!
//! Turns one listing page into record stubs, one per card. Cards are parsed
//! independently; a card without a usable detail link is dropped.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::fields::{canonical_url, normalize_whitespace, parse_amount, parse_currency_amount, resolve_url};
use crate::types::Record;

/// Elements that wrap one listing card
const CARD_SELECTOR: &str = "div[class*='campaign'], div[class*='Campaign'], \
    div[class*='card'], div[class*='Card'], div[class*='tile'], div[class*='Tile'], article";

/// Links to detail pages
const DETAIL_LINK_SELECTOR: &str = "a[href*='/f/']";

/// Title candidates inside a card, in priority order
const TITLE_SELECTORS: &[&str] = &[
    "[class*='title']",
    "[class*='Title']",
    "[class*='heading']",
    "[class*='Heading']",
    "h2",
    "h3",
];

/// Amount candidates inside a card, in priority order
const AMOUNT_SELECTORS: &[&str] = &[
    "[class*='raised']",
    "[class*='Raised']",
    "[class*='amount']",
    "[class*='Amount']",
];

/// Parser for listing pages
///
/// Relative links are resolved against the listing page URL.
pub struct ListingParser {
    base: Url,
}

impl ListingParser {
    /// Create a parser resolving links against `base`
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    /// Parse every recognizable card on the page, in page order.
    ///
    /// Returns an empty vector when no card yields a detail URL; the caller
    /// treats that as a page with nothing left to harvest.
    pub fn parse(&self, html: &str) -> Vec<Record> {
        let document = Html::parse_document(html);

        let mut cards = find_cards(&document, &self.base);
        if cards.is_empty() {
            cards = fallback_cards(&document);
        }

        let stubs: Vec<Record> = cards
            .iter()
            .filter_map(|card| {
                let stub = self.parse_card(card);
                if stub.is_none() {
                    tracing::debug!("dropping listing card without a detail link");
                }
                stub
            })
            .collect();

        tracing::debug!(cards = cards.len(), stubs = stubs.len(), "parsed listing page");
        stubs
    }

    /// Build a stub from one card. `None` when the card has no detail URL.
    fn parse_card(&self, card: &ElementRef) -> Option<Record> {
        let link_selector = Selector::parse(DETAIL_LINK_SELECTOR).ok()?;
        let link = std::iter::once(*card)
            .filter(|el| is_detail_link(el))
            .chain(card.select(&link_selector))
            .find_map(|el| {
                let href = el.value().attr("href")?;
                canonical_url(&self.base, href).map(|url| (el, url))
            });
        let (link, source_url) = link?;

        let mut stub = Record::stub(source_url);
        stub.title = extract_title(card).or_else(|| non_empty_text(&link));
        stub.amount_raised = extract_amount(card);
        stub.image_urls = self.extract_image(card).into_iter().collect();
        Some(stub)
    }

    fn extract_image(&self, card: &ElementRef) -> Option<String> {
        let selector = Selector::parse("img").ok()?;
        card.select(&selector).find_map(|img| {
            let attrs = img.value();
            ["src", "data-src"]
                .iter()
                .filter_map(|name| attrs.attr(name))
                .filter(|src| !src.starts_with("data:"))
                .find_map(|src| resolve_url(&self.base, src))
                .map(|url| url.to_string())
        })
    }
}

/// Outermost card elements that link to exactly one detail page.
///
/// A wrapper around several cards links to several detail pages and is
/// skipped; a sub-element of a card (image or title block) sits inside an
/// accepted card and is skipped too.
fn find_cards<'a>(document: &'a Html, base: &Url) -> Vec<ElementRef<'a>> {
    let (Ok(card_selector), Ok(link_selector)) = (
        Selector::parse(CARD_SELECTOR),
        Selector::parse(DETAIL_LINK_SELECTOR),
    ) else {
        return Vec::new();
    };

    let single: Vec<ElementRef> = document
        .select(&card_selector)
        .filter(|card| detail_urls(card, &link_selector, base).len() == 1)
        .collect();
    let ids: HashSet<_> = single.iter().map(|card| card.id()).collect();

    single
        .into_iter()
        .filter(|card| !card.ancestors().any(|node| ids.contains(&node.id())))
        .collect()
}

fn detail_urls(card: &ElementRef, link_selector: &Selector, base: &Url) -> HashSet<String> {
    card.select(link_selector)
        .filter_map(|link| canonical_url(base, link.value().attr("href")?))
        .collect()
}

/// Parents of bare detail links, for markup without card wrappers.
fn fallback_cards(document: &Html) -> Vec<ElementRef<'_>> {
    let Ok(link_selector) = Selector::parse(DETAIL_LINK_SELECTOR) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    document
        .select(&link_selector)
        .map(|link| link.parent().and_then(ElementRef::wrap).unwrap_or(link))
        .filter(|card| seen.insert(card.id()))
        .collect()
}

fn is_detail_link(el: &ElementRef) -> bool {
    el.value().name() == "a"
        && el
            .value()
            .attr("href")
            .is_some_and(|href| href.contains("/f/"))
}

fn extract_title(card: &ElementRef) -> Option<String> {
    TITLE_SELECTORS.iter().find_map(|selector_str| {
        let selector = Selector::parse(selector_str).ok()?;
        card.select(&selector).find_map(|el| non_empty_text(&el))
    })
}

fn extract_amount(card: &ElementRef) -> Option<f64> {
    let from_element = AMOUNT_SELECTORS.iter().find_map(|selector_str| {
        let selector = Selector::parse(selector_str).ok()?;
        card.select(&selector)
            .find_map(|el| parse_amount(&el.text().collect::<Vec<_>>().join(" ")))
    });
    from_element.or_else(|| parse_currency_amount(&card.text().collect::<Vec<_>>().join(" ")))
}

fn non_empty_text(el: &ElementRef) -> Option<String> {
    let text = normalize_whitespace(&el.text().collect::<Vec<_>>().join(" "));
    (!text.is_empty()).then_some(text)
}
