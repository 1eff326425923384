//! End-to-end pipeline tests against a scripted in-memory transport.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use carvest::config::{Catalog, Settings};
use carvest::discover::StopReason;
use carvest::error::ScrapeError;
use carvest::fetch::{FetchedPage, Fetcher};
use carvest::pipeline::{Pipeline, ScrapeRequest};
use carvest::sink::MemorySink;

/// Serves pre-scripted bodies by exact URL; anything else is a 404.
#[derive(Default)]
struct ScriptedFetcher {
    pages: HashMap<String, String>,
    bytes: HashMap<String, Vec<u8>>,
}

impl ScriptedFetcher {
    fn page(mut self, url: &str, body: String) -> Self {
        self.pages.insert(url.to_string(), body);
        self
    }

    fn image(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.bytes.insert(url.to_string(), bytes);
        self
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, ScrapeError> {
        self.pages
            .get(url)
            .map(|body| FetchedPage {
                status: 200,
                body: body.clone(),
                elapsed_ms: 5,
            })
            .ok_or_else(|| ScrapeError::Http {
                status: 404,
                url: url.to_string(),
            })
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ScrapeError> {
        self.bytes.get(url).cloned().ok_or_else(|| ScrapeError::Http {
            status: 404,
            url: url.to_string(),
        })
    }
}

const CATALOG_YAML: &str = r#"
manufacturers:
  toyota:
    manufacturer_id: 19
    hebrew: "טויוטה"
    english: "Toyota"
    models:
      corolla:
        model_id: 10182
        hebrew: "קורולה"
        english: "Corolla"
"#;

fn settings() -> Settings {
    Settings {
        base_url: "https://site.test".to_string(),
        page_delay: (Duration::ZERO, Duration::ZERO),
        listing_delay: (Duration::ZERO, Duration::ZERO),
        max_pages: 3,
        // Never escalate: these tests exercise the direct path only.
        relay_escalation_threshold: 0,
        ..Settings::default()
    }
}

fn search_page(listings: &[(&str, &str)]) -> String {
    let entries: Vec<String> = listings
        .iter()
        .map(|(token, image)| {
            format!(
                r#"{{"token":"{token}","metaData":{{"coverImage":"{image}"}}}}"#
            )
        })
        .collect();
    format!(
        r#"<html><body>
<script id="__NEXT_DATA__" type="application/json">
{{"props":{{"pageProps":{{"dehydratedState":{{"queries":[{{"state":{{"data":{{
    "private":[{}]
}}}}}}]}}}}}}}}
</script>
</body></html>"#,
        entries.join(",")
    )
}

fn detail_page(title: &str, date: &str, price: &str) -> String {
    format!(
        r#"<html><body>
<h1>{title}</h1>
<span data-testid="price">{price}</span>
<dl>
    <div><dd>תאריך עליה לכביש</dd><dt>{date}</dt></div>
    <div><dd>קילומטראז׳</dd><dt>45,000</dt></div>
    <div><dd>תיבת הילוכים</dd><dt>אוטומטית</dt></div>
</dl>
</body></html>"#
    )
}

fn detail_page_without_year() -> String {
    r#"<html><body>
<h1>מודעה חסרה</h1>
<span data-testid="price">77,000 ₪</span>
</body></html>"#
        .to_string()
}

#[tokio::test]
async fn scrapes_across_pages_with_dedup_and_drop_rules() {
    let settings = settings();
    let catalog = Catalog::from_yaml(CATALOG_YAML).unwrap();

    // Page 2 repeats a token from page 1; only the new one counts.
    let fetcher = ScriptedFetcher::default()
        .page(
            "https://site.test/vehicles/cars?manufacturer=19&model=10182",
            search_page(&[
                ("7liq5ya4", "https://img.test/a.jpg"),
                ("6f8xhc0x", "https://img.test/b.jpg"),
            ]),
        )
        .page(
            "https://site.test/vehicles/cars?manufacturer=19&model=10182&page=2",
            search_page(&[
                ("7liq5ya4", "https://img.test/a.jpg"),
                ("lnlj3vvb", "https://img.test/c.jpg"),
            ]),
        )
        .page(
            "https://site.test/item/7liq5ya4",
            detail_page("טויוטה קורולה", "03/2021", "85,000 ₪"),
        )
        .page(
            "https://site.test/item/6f8xhc0x",
            detail_page_without_year(),
        )
        .page(
            "https://site.test/item/lnlj3vvb",
            detail_page("טויוטה קורולה", "06/2019", "₪ 650 לחודש 62,000 ₪"),
        )
        .image("https://img.test/a.jpg", vec![1, 2, 3, 4])
        // Same bytes as a.jpg: collapses to one stored thumbnail.
        .image("https://img.test/c.jpg", vec![1, 2, 3, 4]);

    let pipeline = Pipeline::new(&settings, &catalog, &fetcher, None);
    let request = ScrapeRequest {
        manufacturer: "toyota".to_string(),
        model: "corolla".to_string(),
        target: 3,
    };
    let mut sink = MemorySink::default();

    let outcome = pipeline.run(&request, &mut sink, None).await.unwrap();

    assert_eq!(outcome.stop, StopReason::Satisfied);
    assert_eq!(outcome.stats.pages_scanned, 2);
    assert_eq!(outcome.stats.identifiers_discovered, 3);
    assert_eq!(outcome.stats.records_extracted, 2);
    assert_eq!(outcome.stats.records_dropped_no_year, 1);
    assert_eq!(outcome.stats.detail_fetch_failures, 0);
    assert_eq!(outcome.stats.thumbnails_resolved, 1);
    assert_eq!(outcome.stats.thumbnails_duplicate, 1);

    assert_eq!(sink.records.len(), 2);
    let first = &sink.records[0];
    assert_eq!(first.token, "7liq5ya4");
    assert_eq!(first.manufacturer, "Toyota");
    assert_eq!(first.model, "Corolla");
    assert_eq!(first.year, 2021);
    assert_eq!(first.price, Some(85_000));
    assert_eq!(first.listing_url, "https://site.test/item/7liq5ya4");
    assert!(first.thumbnail.is_some());

    // Price disambiguation picked the sale price over the monthly figure.
    let second = &sink.records[1];
    assert_eq!(second.token, "lnlj3vvb");
    assert_eq!(second.price, Some(62_000));
    // Its thumbnail bytes duplicated the first listing's.
    assert!(second.thumbnail.is_none());
}

#[tokio::test]
async fn exhausts_when_pages_stop_yielding() {
    let settings = settings();
    let catalog = Catalog::from_yaml(CATALOG_YAML).unwrap();

    let fetcher = ScriptedFetcher::default()
        .page(
            "https://site.test/vehicles/cars?manufacturer=19&model=10182",
            search_page(&[("7liq5ya4", "https://img.test/a.jpg")]),
        )
        // Page 2 only repeats page 1.
        .page(
            "https://site.test/vehicles/cars?manufacturer=19&model=10182&page=2",
            search_page(&[("7liq5ya4", "https://img.test/a.jpg")]),
        )
        .page(
            "https://site.test/item/7liq5ya4",
            detail_page("טויוטה קורולה", "03/2021", "85,000 ₪"),
        )
        .image("https://img.test/a.jpg", vec![9, 9, 9]);

    let pipeline = Pipeline::new(&settings, &catalog, &fetcher, None);
    let request = ScrapeRequest {
        manufacturer: "toyota".to_string(),
        model: "corolla".to_string(),
        target: 10,
    };
    let mut sink = MemorySink::default();

    let outcome = pipeline.run(&request, &mut sink, None).await.unwrap();

    assert_eq!(outcome.stop, StopReason::Exhausted);
    assert_eq!(outcome.stats.records_extracted, 1);
    assert_eq!(sink.records.len(), 1);
}

#[tokio::test]
async fn page_cap_stops_discovery() {
    let mut settings = settings();
    settings.max_pages = 1;
    let catalog = Catalog::from_yaml(CATALOG_YAML).unwrap();

    // Page 2 exists and would yield more, but the cap stops at page 1.
    let fetcher = ScriptedFetcher::default()
        .page(
            "https://site.test/vehicles/cars?manufacturer=19&model=10182",
            search_page(&[("7liq5ya4", "https://img.test/a.jpg")]),
        )
        .page(
            "https://site.test/vehicles/cars?manufacturer=19&model=10182&page=2",
            search_page(&[("6f8xhc0x", "https://img.test/b.jpg")]),
        )
        .page(
            "https://site.test/item/7liq5ya4",
            detail_page("טויוטה קורולה", "03/2021", "85,000 ₪"),
        )
        .image("https://img.test/a.jpg", vec![1, 2, 3]);

    let pipeline = Pipeline::new(&settings, &catalog, &fetcher, None);
    let request = ScrapeRequest {
        manufacturer: "toyota".to_string(),
        model: "corolla".to_string(),
        target: 10,
    };
    let mut sink = MemorySink::default();

    let outcome = pipeline.run(&request, &mut sink, None).await.unwrap();

    assert_eq!(outcome.stop, StopReason::Capped);
    assert_eq!(outcome.stats.pages_scanned, 1);
    assert_eq!(sink.records.len(), 1);
}

#[tokio::test]
async fn detail_fetch_failures_are_counted_not_fatal() {
    let settings = settings();
    let catalog = Catalog::from_yaml(CATALOG_YAML).unwrap();

    // Detail page never scripted: every fetch 404s.
    let fetcher = ScriptedFetcher::default().page(
        "https://site.test/vehicles/cars?manufacturer=19&model=10182",
        search_page(&[("7liq5ya4", "https://img.test/a.jpg")]),
    );

    let pipeline = Pipeline::new(&settings, &catalog, &fetcher, None);
    let request = ScrapeRequest {
        manufacturer: "toyota".to_string(),
        model: "corolla".to_string(),
        target: 1,
    };
    let mut sink = MemorySink::default();

    let outcome = pipeline.run(&request, &mut sink, None).await.unwrap();

    assert_eq!(outcome.stats.detail_fetch_failures, 1);
    assert_eq!(outcome.stats.records_extracted, 0);
    assert!(sink.records.is_empty());
}

#[tokio::test]
async fn unknown_catalog_keys_fail_the_run() {
    let settings = settings();
    let catalog = Catalog::from_yaml(CATALOG_YAML).unwrap();
    let fetcher = ScriptedFetcher::default();

    let pipeline = Pipeline::new(&settings, &catalog, &fetcher, None);
    let request = ScrapeRequest {
        manufacturer: "ferrari".to_string(),
        model: "f40".to_string(),
        target: 1,
    };
    let mut sink = MemorySink::default();

    let err = pipeline.run(&request, &mut sink, None).await.unwrap_err();
    assert!(matches!(err, ScrapeError::Config(_)));
}
