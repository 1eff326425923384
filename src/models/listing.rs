//! Listing models.
//!
//! `ListingReference` is the ephemeral discovery unit; `ListingRecord` is the
//! normalized output handed to the storage sink, immutable once built.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A listing identifier discovered on a search-results page.
///
/// Uniqueness by `token` is enforced across one manufacturer+model run by
/// the pagination driver's dedup set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingReference {
    /// Site-assigned short alphanumeric token.
    pub token: String,
    /// Thumbnail URL paired with the token at discovery time, when known.
    pub thumbnail_url: Option<String>,
    /// Search-results page the token was first seen on.
    pub page: u32,
}

impl ListingReference {
    pub fn new(token: impl Into<String>, thumbnail_url: Option<String>, page: u32) -> Self {
        Self {
            token: token.into(),
            thumbnail_url,
            page,
        }
    }
}

/// Normalized vehicle listing, one per successfully extracted detail page.
///
/// `year` is mandatory: pages without a determinable year never become a
/// record. Everything else is best-effort and nullable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRecord {
    pub token: String,
    pub listing_url: String,
    pub manufacturer: String,
    pub model: String,
    pub listing_title: Option<String>,
    /// Sale price in site currency units. Absence is valid.
    pub price: Option<u32>,
    pub year: u32,
    /// Current year minus `year` at extraction time.
    pub age: u32,
    /// Road-registration date, MM/YYYY, kept verbatim when present.
    pub date_on_road: Option<String>,
    pub mileage: Option<u32>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub engine_size: Option<String>,
    pub color: Option<String>,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub current_ownership_type: Option<String>,
    pub previous_ownership_type: Option<String>,
    pub current_owner_number: Option<u32>,
    pub seats: Option<u32>,
    pub description: Option<String>,
    /// Base64 data URI, bounded in size; null when no unique thumbnail
    /// survived resolution.
    pub thumbnail: Option<String>,
    /// Raw page payload retained for audit/debugging.
    pub raw_html: String,
    pub response_status: u16,
    pub response_time_ms: u64,
    pub scraped_at: DateTime<Utc>,
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub pages_scanned: u32,
    pub identifiers_discovered: usize,
    pub records_extracted: usize,
    pub records_dropped_no_year: usize,
    pub detail_fetch_failures: usize,
    pub thumbnails_resolved: usize,
    pub thumbnails_duplicate: usize,
    pub thumbnails_oversized: usize,
}
