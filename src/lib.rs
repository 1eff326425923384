//! carvest - vehicle-listing extraction pipeline.
//!
//! Scrapes a classifieds site's vehicle search results for a given
//! manufacturer and model, walks each listing's detail page, and emits
//! normalized records with bounded-size thumbnails. Discovery and field
//! extraction are layered cascades so markup changes degrade gracefully
//! instead of failing a run.

pub mod cli;
pub mod config;
pub mod discover;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod pipeline;
pub mod sink;
pub mod thumbs;

pub use error::ScrapeError;
pub use models::{ListingRecord, ListingReference, RunStats};
pub use pipeline::{Pipeline, ScrapeOutcome, ScrapeRequest};
