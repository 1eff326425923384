//! Data models for discovered and extracted listings.

mod listing;

pub use listing::{ListingRecord, ListingReference, RunStats};
