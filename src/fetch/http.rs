//! Plain HTTP fetcher.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;

use super::{random_user_agent, FetchedPage, Fetcher};
use crate::error::ScrapeError;

/// Direct GET transport with a browser-impersonating user agent.
#[derive(Clone)]
pub struct DirectFetcher {
    client: Client,
}

impl DirectFetcher {
    /// Create a fetcher with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .user_agent(random_user_agent())
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self { client })
    }

    async fn send(&self, url: &str) -> Result<(u16, reqwest::Response, u64), ScrapeError> {
        let start = Instant::now();
        let response = self.client.get(url).send().await?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok((status.as_u16(), response, elapsed_ms))
    }
}

#[async_trait]
impl Fetcher for DirectFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, ScrapeError> {
        let (status, response, elapsed_ms) = self.send(url).await?;
        let body = response.text().await?;
        Ok(FetchedPage {
            status,
            body,
            elapsed_ms,
        })
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ScrapeError> {
        let (_, response, _) = self.send(url).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
