//! End-to-end scrape pipeline for one manufacturer+model query.
//!
//! Discovery, detail extraction, and thumbnail resolution run as one pass
//! per query, parameterized by injected transports. Individual listing
//! failures degrade to counters; only configuration and output errors abort
//! the run.

use indicatif::ProgressBar;
use tracing::{info, warn};

use crate::config::{Catalog, Settings};
use crate::discover::{jitter_sleep, PaginationDriver, StopReason};
use crate::error::ScrapeError;
use crate::extract::{extract_record, ExtractionContext};
use crate::fetch::{FetchedPage, Fetcher};
use crate::models::RunStats;
use crate::sink::RecordSink;
use crate::thumbs::{ThumbnailOutcome, ThumbnailResolver};

/// One manufacturer+model scrape query.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    /// Catalog key of the manufacturer (e.g. "toyota").
    pub manufacturer: String,
    /// Catalog key of the model (e.g. "corolla").
    pub model: String,
    /// How many listings to collect before stopping.
    pub target: usize,
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct ScrapeOutcome {
    pub stats: RunStats,
    pub stop: StopReason,
}

/// The assembled pipeline. Transports are injected so tests and alternate
/// deployments swap them without touching the orchestration.
pub struct Pipeline<'a> {
    settings: &'a Settings,
    catalog: &'a Catalog,
    direct: &'a dyn Fetcher,
    relay: Option<&'a dyn Fetcher>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: &'a Settings,
        catalog: &'a Catalog,
        direct: &'a dyn Fetcher,
        relay: Option<&'a dyn Fetcher>,
    ) -> Self {
        Self {
            settings,
            catalog,
            direct,
            relay,
        }
    }

    /// Run one query end to end, streaming records into `sink`.
    pub async fn run(
        &self,
        request: &ScrapeRequest,
        sink: &mut dyn RecordSink,
        progress: Option<&ProgressBar>,
    ) -> Result<ScrapeOutcome, ScrapeError> {
        let manufacturer = self.catalog.manufacturer(&request.manufacturer)?;
        let model = self.catalog.model(&request.manufacturer, &request.model)?;

        info!(
            manufacturer = %manufacturer.english,
            model = %model.english,
            target = request.target,
            "starting scrape"
        );

        let mut driver = PaginationDriver::new(self.settings, self.direct, self.relay);
        let discovery = driver
            .discover(manufacturer.manufacturer_id, model.model_id, request.target)
            .await;

        let mut stats = RunStats {
            pages_scanned: discovery.pages_scanned,
            identifiers_discovered: discovery.refs.len(),
            ..RunStats::default()
        };

        if let Some(bar) = progress {
            bar.set_length(discovery.refs.len() as u64);
        }

        let mut resolver = ThumbnailResolver::new();

        for (i, reference) in discovery.refs.iter().enumerate() {
            if i > 0 {
                jitter_sleep(self.settings.listing_delay).await;
            }

            let url = self.settings.listing_url(&reference.token);
            let page = match self.fetch_detail(&url).await {
                Some(page) => page,
                None => {
                    stats.detail_fetch_failures += 1;
                    if let Some(bar) = progress {
                        bar.inc(1);
                    }
                    continue;
                }
            };

            let ctx = ExtractionContext {
                token: &reference.token,
                listing_url: &url,
                manufacturer: &manufacturer.english,
                model: &model.english,
            };
            let Some(mut record) = extract_record(&page, &ctx) else {
                stats.records_dropped_no_year += 1;
                if let Some(bar) = progress {
                    bar.inc(1);
                }
                continue;
            };

            if let Some(thumb_url) = &reference.thumbnail_url {
                match resolver.resolve(self.direct, thumb_url).await {
                    ThumbnailOutcome::Resolved(data_uri) => {
                        record.thumbnail = Some(data_uri);
                        stats.thumbnails_resolved += 1;
                    }
                    ThumbnailOutcome::Duplicate => stats.thumbnails_duplicate += 1,
                    ThumbnailOutcome::Oversized => stats.thumbnails_oversized += 1,
                    ThumbnailOutcome::Unavailable => {}
                }
            }

            sink.write(&record)?;
            stats.records_extracted += 1;
            if let Some(bar) = progress {
                bar.inc(1);
            }
        }

        sink.flush()?;
        info!(
            extracted = stats.records_extracted,
            dropped = stats.records_dropped_no_year,
            failures = stats.detail_fetch_failures,
            "scrape finished"
        );

        Ok(ScrapeOutcome {
            stats,
            stop: discovery.stop,
        })
    }

    /// Fetch one detail page, retrying once through the relay. `None` skips
    /// the listing.
    async fn fetch_detail(&self, url: &str) -> Option<FetchedPage> {
        match self.direct.fetch(url).await {
            Ok(page) => return Some(page),
            Err(e) => warn!(%url, error = %e, "detail fetch failed"),
        }
        let relay = self.relay?;
        match relay.fetch(url).await {
            Ok(page) => Some(page),
            Err(e) => {
                warn!(%url, error = %e, "relay detail fetch failed");
                None
            }
        }
    }
}
