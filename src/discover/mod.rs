//! Listing discovery: identifier extraction cascade plus pagination.
//!
//! Three strategies in order of cost, each tried only when the previous
//! yields nothing usable:
//!
//! 1. Embedded hydration-state JSON parse (exact token/thumbnail pairing).
//! 2. The same parse over relay-rendered HTML, with a token regex sweep as
//!    salvage, driven by the pagination driver's escalation path.
//! 3. Anchor scan with heuristic nearest-image pairing.

pub mod anchors;
pub mod hydration;
mod pagination;
pub mod token;

pub use pagination::{jitter_sleep, DiscoveryOutcome, PaginationDriver, StopReason};
pub use token::{is_likely_valid_identifier, normalize_listing_url};

use crate::models::ListingReference;

/// Run the static extraction cascade over one search-results page body.
///
/// Tier 2 (relay rendering) is a transport concern and lives in the
/// pagination driver; this function covers tiers 1 and 3 for whatever HTML
/// it is handed.
pub fn extract_from_page(html: &str, page: u32) -> Vec<ListingReference> {
    let refs = hydration::extract(html, page);
    if !refs.is_empty() {
        return refs;
    }
    anchors::extract(html, page)
}
