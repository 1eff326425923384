//! HTTP transport abstraction.
//!
//! Every page fetch goes through the `Fetcher` trait so the discovery and
//! extraction code is indifferent to whether a page came from a direct GET
//! or from a JavaScript-capable rendering relay.

mod http;
mod relay;
mod user_agent;

pub use http::DirectFetcher;
pub use relay::RelayFetcher;
pub use user_agent::{random_user_agent, IMPERSONATE_USER_AGENTS};

use async_trait::async_trait;

use crate::error::ScrapeError;

/// A fetched page plus response metadata.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
    pub elapsed_ms: u64,
}

/// Transport strategy for page and image fetches.
///
/// Implementations apply no retry logic of their own; callers decide whether
/// a failed page is skipped or retried through another transport.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a URL and return the body as text.
    async fn fetch(&self, url: &str) -> Result<FetchedPage, ScrapeError>;

    /// Fetch a URL and return the raw body bytes (thumbnails).
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ScrapeError>;

    /// True when this transport executes JavaScript before returning HTML.
    fn is_rendering(&self) -> bool {
        false
    }
}
