//! Pagination driver: walks search-result pages until the target listing
//! count is reached, a page yields nothing new, or the safety cap is hit.

use std::collections::HashSet;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use super::{extract_from_page, hydration};
use crate::config::Settings;
use crate::fetch::Fetcher;
use crate::models::ListingReference;

/// Why discovery stopped. All three are normal completions, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Accumulated the requested number of listings.
    Satisfied,
    /// A page produced zero new identifiers (or failed to fetch).
    Exhausted,
    /// Hit the safety page cap.
    Capped,
}

/// Result of a discovery walk.
#[derive(Debug)]
pub struct DiscoveryOutcome {
    pub refs: Vec<ListingReference>,
    pub stop: StopReason,
    pub pages_scanned: u32,
}

/// Drives page-by-page discovery for one manufacturer+model query.
///
/// Owns the run-scoped identifier dedup set; the same listing appearing on
/// two pages (sort order shifts between requests) collapses to one entry.
pub struct PaginationDriver<'a> {
    settings: &'a Settings,
    direct: &'a dyn Fetcher,
    relay: Option<&'a dyn Fetcher>,
    seen: HashSet<String>,
}

impl<'a> PaginationDriver<'a> {
    pub fn new(
        settings: &'a Settings,
        direct: &'a dyn Fetcher,
        relay: Option<&'a dyn Fetcher>,
    ) -> Self {
        Self {
            settings,
            direct,
            relay,
            seen: HashSet::new(),
        }
    }

    /// Collect up to `target` unique listing references.
    pub async fn discover(
        &mut self,
        manufacturer_id: u32,
        model_id: u32,
        target: usize,
    ) -> DiscoveryOutcome {
        let mut refs: Vec<ListingReference> = Vec::new();
        let mut page: u32 = 1;

        loop {
            if page > self.settings.max_pages {
                info!(pages = page - 1, total = refs.len(), "page cap reached");
                return DiscoveryOutcome {
                    refs,
                    stop: StopReason::Capped,
                    pages_scanned: page - 1,
                };
            }

            let url = self.settings.search_url(manufacturer_id, model_id, page);
            debug!(page, %url, "scanning search page");

            let page_refs = match self.scan_page(&url, page).await {
                Some(found) => found,
                None => {
                    return DiscoveryOutcome {
                        refs,
                        stop: StopReason::Exhausted,
                        pages_scanned: page,
                    };
                }
            };

            let new: Vec<ListingReference> = page_refs
                .into_iter()
                .filter(|r| self.seen.insert(r.token.clone()))
                .collect();

            info!(page, new = new.len(), total = refs.len() + new.len(), "page scanned");

            if new.is_empty() {
                return DiscoveryOutcome {
                    refs,
                    stop: StopReason::Exhausted,
                    pages_scanned: page,
                };
            }

            refs.extend(new);
            if refs.len() >= target {
                refs.truncate(target);
                return DiscoveryOutcome {
                    refs,
                    stop: StopReason::Satisfied,
                    pages_scanned: page,
                };
            }

            jitter_sleep(self.settings.page_delay).await;
            page += 1;
        }
    }

    /// Fetch and extract one search page, escalating to the relay when the
    /// direct fetch under-delivers. `None` means the page was unusable.
    async fn scan_page(&self, url: &str, page: u32) -> Option<Vec<ListingReference>> {
        let mut refs = match self.direct.fetch(url).await {
            Ok(fetched) => extract_from_page(&fetched.body, page),
            Err(e) => {
                warn!(page, error = %e, "direct fetch failed");
                Vec::new()
            }
        };

        // Thin results usually mean the listing feed only materializes after
        // client-side rendering; re-fetch through the relay when we have one.
        if refs.len() < self.settings.relay_escalation_threshold {
            if let Some(relay) = self.relay {
                match relay.fetch(url).await {
                    Ok(rendered) => {
                        let mut rendered_refs = hydration::extract(&rendered.body, page);
                        if rendered_refs.is_empty() {
                            rendered_refs = hydration::salvage_tokens(&rendered.body, page);
                        }
                        if rendered_refs.is_empty() {
                            rendered_refs = extract_from_page(&rendered.body, page);
                        }
                        if rendered_refs.len() > refs.len() {
                            debug!(
                                page,
                                direct = refs.len(),
                                rendered = rendered_refs.len(),
                                "relay escalation improved yield"
                            );
                            refs = rendered_refs;
                        }
                    }
                    Err(e) => warn!(page, error = %e, "relay fetch failed"),
                }
            }
        }

        (!refs.is_empty()).then_some(refs)
    }
}

/// Sleep for a random duration inside the configured band. Keeps the
/// request-rate signature irregular.
pub async fn jitter_sleep(bounds: (Duration, Duration)) {
    let (min, max) = bounds;
    if max.is_zero() {
        return;
    }
    let span = max.as_millis().max(min.as_millis()) as u64;
    let floor = min.as_millis() as u64;
    let ms = if span > floor {
        rand::rng().random_range(floor..=span)
    } else {
        floor
    };
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
