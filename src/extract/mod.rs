//! Detail-page field extraction.
//!
//! Turns a fetched detail page into a normalized `ListingRecord`. Every
//! field runs its own cascade: labeled structured markup first, free-text
//! regex second, embedded hydration JSON last. The model year is the one
//! mandatory field; a page whose year cannot be determined yields no record
//! at all rather than a hollow one.

pub mod price;
pub mod specs;

use chrono::{Datelike, Utc};
use scraper::{Html, Selector};
use tracing::debug;

use crate::discover::hydration;
use crate::fetch::FetchedPage;
use crate::models::ListingRecord;

/// Identity of the listing being extracted, supplied by the pipeline.
pub struct ExtractionContext<'a> {
    pub token: &'a str,
    pub listing_url: &'a str,
    pub manufacturer: &'a str,
    pub model: &'a str,
}

/// Extract a record from a detail page. `None` means the page had no
/// determinable model year and is dropped, which is a counted non-error.
pub fn extract_record(page: &FetchedPage, ctx: &ExtractionContext<'_>) -> Option<ListingRecord> {
    let document = Html::parse_document(&page.body);
    let page_text: String = document.root_element().text().collect();

    let date_on_road = specs::date_on_road(&document);
    let year = date_on_road
        .as_deref()
        .and_then(specs::year_from_date_on_road)
        .or_else(|| specs::free_text_year(&page_text));
    let Some(year) = year else {
        debug!(token = ctx.token, "no determinable year, dropping listing");
        return None;
    };
    let age = (Utc::now().year() as u32).saturating_sub(year);

    let price = price::extract_price(&price_element_text(&document), &page.body, Some(age));

    let state = hydration::find_state_json(&page.body);
    let description = state.as_ref().and_then(hydration::detail_description);
    let location = state.as_ref().and_then(hydration::detail_location);

    Some(ListingRecord {
        token: ctx.token.to_string(),
        listing_url: ctx.listing_url.to_string(),
        manufacturer: ctx.manufacturer.to_string(),
        model: ctx.model.to_string(),
        listing_title: heading_text(&document),
        price,
        year,
        age,
        date_on_road,
        mileage: specs::mileage(&document, &page_text),
        fuel_type: specs::fuel_type(&document, &page_text),
        transmission: specs::transmission(&document, &page_text),
        engine_size: specs::engine_size(&document),
        color: specs::color(&document, &page_text),
        condition: specs::condition(&document),
        location,
        current_ownership_type: specs::current_ownership(&document),
        previous_ownership_type: specs::previous_ownership(&document),
        current_owner_number: specs::owner_number(&document, &page_text),
        seats: specs::seats(&document),
        description,
        thumbnail: None,
        raw_html: page.body.clone(),
        response_status: page.status,
        response_time_ms: page.elapsed_ms,
        scraped_at: Utc::now(),
    })
}

/// Text of the price element, empty when none is present. The testid hook
/// is the stable one; class substring matching covers older markup.
fn price_element_text(document: &Html) -> String {
    for sel in ["[data-testid=\"price\"]", "[class*=\"price\"]"] {
        let selector = Selector::parse(sel).expect("static selector");
        for element in document.select(&selector) {
            let text: String = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

/// Listing title from the page's main heading.
fn heading_text(document: &Html) -> Option<String> {
    for sel in ["h1", "h2"] {
        let selector = Selector::parse(sel).expect("static selector");
        for element in document.select(&selector) {
            let text = element
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}
