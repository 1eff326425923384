//! Embedded-state JSON discovery (cascade tiers 1 and 2).
//!
//! Server-rendered pages ship a `__NEXT_DATA__` JSON blob used to hydrate
//! the client-side view. When present it gives exact token/thumbnail
//! pairing with no guessing. The same walk works on statically served HTML
//! and on relay-rendered HTML; pages that materialize the blob only after
//! client-side JavaScript runs simply need the relay transport first.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use super::token::is_likely_valid_identifier;
use crate::models::ListingReference;

/// Marker naming the hydration-state script.
const STATE_MARKER: &str = "__NEXT_DATA__";

/// Listing tiers in the search-results hydration state, in display order.
const LISTING_CATEGORIES: &[&str] = &["platinum", "commercial", "solo", "private"];

static TOKEN_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""token"\s*:\s*"([A-Za-z0-9]{4,10})""#).unwrap());
static TOKEN_PROP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"token\s*:\s*"([A-Za-z0-9]{4,10})""#).unwrap());

/// Extract `(token, thumbnail)` references from the embedded hydration state.
///
/// Returns an empty vector when no state blob is present or it holds no
/// listings; the caller falls through to the next cascade tier.
pub fn extract(html: &str, page: u32) -> Vec<ListingReference> {
    let Some(state) = find_state_json(html) else {
        return Vec::new();
    };

    let mut refs = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    for bucket in listing_buckets(&state) {
        for listing in bucket {
            let Some(token) = listing.get("token").and_then(Value::as_str) else {
                continue;
            };
            if !is_likely_valid_identifier(token) || seen.iter().any(|t| t == token) {
                continue;
            }
            seen.push(token.to_string());
            refs.push(ListingReference::new(token, thumbnail_of(listing), page));
        }
    }

    debug!(page, count = refs.len(), "hydration-state discovery");
    refs
}

/// Salvage tokens with a regex sweep when the state JSON is unparseable.
///
/// Loses thumbnail pairing but keeps the identifiers; used by tier 2 after
/// a rendered page still fails structured extraction.
pub fn salvage_tokens(html: &str, page: u32) -> Vec<ListingReference> {
    let mut refs: Vec<ListingReference> = Vec::new();
    for re in [&*TOKEN_FIELD_RE, &*TOKEN_PROP_RE] {
        for cap in re.captures_iter(html) {
            let token = &cap[1];
            if is_likely_valid_identifier(token) && !refs.iter().any(|r| r.token == token) {
                refs.push(ListingReference::new(token, None, page));
            }
        }
    }
    debug!(page, count = refs.len(), "token regex salvage");
    refs
}

/// Locate and parse the hydration-state JSON blob.
pub fn find_state_json(html: &str) -> Option<Value> {
    if !html.contains(STATE_MARKER) {
        return None;
    }

    // Preferred: the state lives in its own script tag.
    let document = Html::parse_document(html);
    let selector = Selector::parse("script").expect("static selector");
    for script in document.select(&selector) {
        let is_state = script.value().attr("id") == Some(STATE_MARKER);
        let text: String = script.text().collect();
        if is_state || text.contains(STATE_MARKER) {
            let candidate = if is_state { text.trim() } else { "" };
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                return Some(value);
            }
        }
    }

    // Fallback: brace-match forward from the marker. Minified or mangled
    // markup defeats the tag parse but the JSON itself is usually intact.
    let marker_pos = html.find(STATE_MARKER)?;
    let start = html[marker_pos..].find('{')? + marker_pos;
    let json = balanced_json_slice(&html[start..])?;
    serde_json::from_str(json).ok()
}

/// Take the longest balanced `{...}` prefix, honoring string literals.
fn balanced_json_slice(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Walk the hydration structure down to the category buckets.
///
/// Two shapes exist in the wild: `apolloState` keyed by `ROOT_QUERY*`
/// entries, and `dehydratedState.queries[].state.data`.
fn listing_buckets(state: &Value) -> Vec<&Vec<Value>> {
    let Some(page_props) = state.pointer("/props/pageProps") else {
        return Vec::new();
    };

    let mut buckets = Vec::new();

    if let Some(apollo) = page_props.get("apolloState").and_then(Value::as_object) {
        for (key, value) in apollo {
            if key.starts_with("ROOT_QUERY") {
                collect_category_buckets(value, &mut buckets);
            }
        }
    }

    if let Some(queries) = page_props
        .pointer("/dehydratedState/queries")
        .and_then(Value::as_array)
    {
        for query in queries {
            if let Some(data) = query.pointer("/state/data") {
                collect_category_buckets(data, &mut buckets);
            }
        }
    }

    buckets
}

fn collect_category_buckets<'a>(data: &'a Value, out: &mut Vec<&'a Vec<Value>>) {
    for category in LISTING_CATEGORIES {
        if let Some(listings) = data.get(category).and_then(Value::as_array) {
            out.push(listings);
        }
    }
}

/// Thumbnail for one listing entry: cover image first, else first of the
/// images array.
fn thumbnail_of(listing: &Value) -> Option<String> {
    let meta = listing.get("metaData")?;
    if let Some(cover) = meta.get("coverImage").and_then(Value::as_str) {
        if !cover.is_empty() {
            return Some(cover.to_string());
        }
    }
    meta.get("images")
        .and_then(Value::as_array)
        .and_then(|images| images.first())
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Free-text description from a detail page's hydration state.
pub fn detail_description(state: &Value) -> Option<String> {
    query_data_values(state)
        .filter_map(|data| data.pointer("/metaData/description"))
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// City/location text from a detail page's hydration state.
pub fn detail_location(state: &Value) -> Option<String> {
    query_data_values(state)
        .filter_map(|data| data.pointer("/address/city/text"))
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn query_data_values(state: &Value) -> impl Iterator<Item = &Value> {
    state
        .pointer("/props/pageProps/dehydratedState/queries")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|query| query.pointer("/state/data"))
}
