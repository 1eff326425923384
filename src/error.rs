//! Error taxonomy for the extraction pipeline.
//!
//! None of these are fatal to a run except `Config`: page and listing
//! failures degrade to skipped items and stats counters.

use thiserror::Error;

/// Errors produced by the scrape pipeline.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Transport-level failure (timeout, connection refused, DNS).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with a non-2xx status.
    #[error("http {status} from {url}")]
    Http { status: u16, url: String },

    /// An expected structure was absent from the page. Triggers the next
    /// cascade tier rather than failing the page.
    #[error("parse error: {0}")]
    Parse(String),

    /// An identifier or price failed its format/range rule; the item is
    /// dropped, not the run.
    #[error("validation error: {0}")]
    Validation(String),

    /// Output could not be written. Fatal: losing records silently defeats
    /// the run.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded. Fatal to a whole run.
    #[error("config error: {0}")]
    Config(String),
}

impl ScrapeError {
    /// True when the error only affects a single page or listing.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ScrapeError::Config(_) | ScrapeError::Io(_))
    }
}
