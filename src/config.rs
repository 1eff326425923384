//! Configuration: manufacturer catalog and runtime settings.
//!
//! The catalog is a declarative YAML file mapping manufacturer/model keys to
//! the numeric identifiers the site expects in search queries. A missing or
//! unparseable catalog is the one fatal error in the system.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;

/// Default base URL of the target site.
pub const DEFAULT_BASE_URL: &str = "https://www.yad2.co.il";

/// Safety cap on search-result pages per run.
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// One vehicle model entry in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub model_id: u32,
    pub hebrew: String,
    pub english: String,
}

/// One manufacturer entry in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManufacturerEntry {
    pub manufacturer_id: u32,
    pub hebrew: String,
    pub english: String,
    #[serde(default)]
    pub models: BTreeMap<String, ModelEntry>,
}

/// The manufacturer/model catalog, loaded read-only at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub manufacturers: BTreeMap<String, ManufacturerEntry>,
}

impl Catalog {
    /// Load the catalog from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ScrapeError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ScrapeError::Config(format!("cannot read catalog {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&text)
            .map_err(|e| ScrapeError::Config(format!("invalid catalog {}: {}", path.display(), e)))
    }

    /// Parse a catalog from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Look up a manufacturer by key.
    pub fn manufacturer(&self, key: &str) -> Result<&ManufacturerEntry, ScrapeError> {
        self.manufacturers
            .get(key)
            .ok_or_else(|| ScrapeError::Config(format!("manufacturer '{}' not in catalog", key)))
    }

    /// Look up a manufacturer+model pair by keys.
    pub fn model(&self, manufacturer: &str, model: &str) -> Result<&ModelEntry, ScrapeError> {
        self.manufacturer(manufacturer)?
            .models
            .get(model)
            .ok_or_else(|| {
                ScrapeError::Config(format!(
                    "model '{}' not in catalog for manufacturer '{}'",
                    model, manufacturer
                ))
            })
    }
}

/// Rendering-relay credentials, read from the environment.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Relay request endpoint.
    pub endpoint: String,
    /// Bearer token.
    pub token: String,
    /// Relay-side zone/profile name.
    pub zone: String,
}

impl RelaySettings {
    /// Build relay settings from the environment, if fully configured.
    ///
    /// `CARVEST_RELAY_TOKEN` and `CARVEST_RELAY_ZONE` are required;
    /// `CARVEST_RELAY_URL` has a sensible default.
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("CARVEST_RELAY_TOKEN").ok()?;
        let zone = std::env::var("CARVEST_RELAY_ZONE").ok()?;
        let endpoint = std::env::var("CARVEST_RELAY_URL")
            .unwrap_or_else(|_| "https://api.brightdata.com/request".to_string());
        Some(Self {
            endpoint,
            token,
            zone,
        })
    }
}

/// Runtime knobs for a scrape run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Site base URL, no trailing slash.
    pub base_url: String,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Jitter bounds for the pause between search-page fetches.
    pub page_delay: (Duration, Duration),
    /// Jitter bounds for the pause between detail-page fetches.
    pub listing_delay: (Duration, Duration),
    /// Safety cap on search-result pages.
    pub max_pages: u32,
    /// Escalate a page to the rendering relay when the direct fetch yields
    /// fewer references than this.
    pub relay_escalation_threshold: usize,
    /// Optional rendering relay.
    pub relay: Option<RelaySettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(15),
            page_delay: (Duration::from_millis(500), Duration::from_millis(1500)),
            listing_delay: (Duration::from_millis(500), Duration::from_millis(2000)),
            max_pages: DEFAULT_MAX_PAGES,
            relay_escalation_threshold: 10,
            relay: None,
        }
    }
}

impl Settings {
    /// Build a search-results URL for a manufacturer/model query.
    ///
    /// Page 1 carries no page parameter, matching the site's canonical form.
    pub fn search_url(&self, manufacturer_id: u32, model_id: u32, page: u32) -> String {
        let mut url = format!(
            "{}/vehicles/cars?manufacturer={}&model={}",
            self.base_url, manufacturer_id, model_id
        );
        if page > 1 {
            url.push_str(&format!("&page={}", page));
        }
        url
    }

    /// Canonical detail-page URL for a listing token.
    pub fn listing_url(&self, token: &str) -> String {
        format!("{}/item/{}", self.base_url, token)
    }
}
