//! Rendering-relay fetcher.
//!
//! The relay is a third-party HTTP intermediary that executes JavaScript and
//! bypasses anti-bot defenses on our behalf. A fetch is a structured POST
//! carrying the target URL rather than a direct GET; the relay returns the
//! post-render HTML.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use super::{FetchedPage, Fetcher};
use crate::config::RelaySettings;
use crate::error::ScrapeError;

/// Attempts per relay fetch before giving up.
const RELAY_ATTEMPTS: u32 = 2;

#[derive(Serialize)]
struct RelayRequest<'a> {
    zone: &'a str,
    url: &'a str,
    format: &'static str,
    method: &'static str,
}

/// Fetcher routed through a JavaScript-capable rendering relay.
#[derive(Clone)]
pub struct RelayFetcher {
    client: Client,
    settings: RelaySettings,
}

impl RelayFetcher {
    /// Create a relay fetcher. The timeout is generous because the relay
    /// waits for client-side rendering before answering.
    pub fn new(settings: RelaySettings, timeout: Duration) -> Result<Self, ScrapeError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, settings })
    }

    async fn request(&self, url: &str) -> Result<(u16, Vec<u8>, u64), ScrapeError> {
        let payload = RelayRequest {
            zone: &self.settings.zone,
            url,
            format: "raw",
            method: "GET",
        };

        let mut last_err: Option<ScrapeError> = None;
        for attempt in 1..=RELAY_ATTEMPTS {
            if attempt > 1 {
                let pause = rand::rng().random_range(100..=300);
                tokio::time::sleep(Duration::from_millis(pause)).await;
            }

            debug!(url, attempt, "relay fetch");
            let start = Instant::now();
            let result = self
                .client
                .post(&self.settings.endpoint)
                .bearer_auth(&self.settings.token)
                .json(&payload)
                .send()
                .await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(response) if response.status().is_success() => {
                    let status = response.status().as_u16();
                    let bytes = response.bytes().await?.to_vec();
                    return Ok((status, bytes, elapsed_ms));
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    warn!(url, status, attempt, "relay returned non-success");
                    last_err = Some(ScrapeError::Http {
                        status,
                        url: url.to_string(),
                    });
                }
                Err(e) => {
                    warn!(url, attempt, error = %e, "relay request failed");
                    last_err = Some(ScrapeError::Network(e));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ScrapeError::Parse("relay produced no response".into())))
    }
}

#[async_trait]
impl Fetcher for RelayFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, ScrapeError> {
        let (status, bytes, elapsed_ms) = self.request(url).await?;
        Ok(FetchedPage {
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
            elapsed_ms,
        })
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ScrapeError> {
        let (_, bytes, _) = self.request(url).await?;
        Ok(bytes)
    }

    fn is_rendering(&self) -> bool {
        true
    }
}
