//! CLI commands implementation.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{Catalog, RelaySettings, Settings};
use crate::discover::StopReason;
use crate::fetch::{DirectFetcher, Fetcher, RelayFetcher};
use crate::pipeline::{Pipeline, ScrapeRequest};
use crate::sink::JsonLinesSink;

#[derive(Parser)]
#[command(name = "carvest")]
#[command(about = "Vehicle-listing extraction pipeline for Yad2-style classifieds")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape listings for one manufacturer+model query
    Scrape {
        /// Manufacturer key from the catalog (e.g. toyota)
        manufacturer: String,
        /// Model key from the catalog (e.g. corolla)
        model: String,
        /// Number of listings to collect
        #[arg(short, long, default_value = "10")]
        count: usize,
        /// Manufacturer catalog file
        #[arg(long, default_value = "manufacturers.yml")]
        catalog: PathBuf,
        /// Output file (JSON Lines)
        #[arg(short, long, default_value = "listings.jsonl")]
        output: PathBuf,
        /// Override the search-page safety cap
        #[arg(long)]
        max_pages: Option<u32>,
        /// Skip the jittered inter-request delays (testing against fixtures)
        #[arg(long)]
        no_delay: bool,
    },

    /// List catalog manufacturers and models
    Catalog {
        /// Manufacturer catalog file
        #[arg(long, default_value = "manufacturers.yml")]
        catalog: PathBuf,
        /// Show models for one manufacturer only
        manufacturer: Option<String>,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape {
            manufacturer,
            model,
            count,
            catalog,
            output,
            max_pages,
            no_delay,
        } => {
            scrape(
                manufacturer,
                model,
                count,
                &catalog,
                &output,
                max_pages,
                no_delay,
            )
            .await
        }
        Commands::Catalog {
            catalog,
            manufacturer,
        } => list_catalog(&catalog, manufacturer.as_deref()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn scrape(
    manufacturer: String,
    model: String,
    count: usize,
    catalog_path: &std::path::Path,
    output: &std::path::Path,
    max_pages: Option<u32>,
    no_delay: bool,
) -> anyhow::Result<()> {
    let catalog = Catalog::load(catalog_path)?;

    let mut settings = Settings {
        relay: RelaySettings::from_env(),
        ..Settings::default()
    };
    if let Some(cap) = max_pages {
        settings.max_pages = cap;
    }
    if no_delay {
        settings.page_delay = (Duration::ZERO, Duration::ZERO);
        settings.listing_delay = (Duration::ZERO, Duration::ZERO);
    }

    let direct = DirectFetcher::new(settings.request_timeout)?;
    // Rendering takes longer than a static fetch; give the relay headroom.
    let relay = match settings.relay.clone() {
        Some(relay_settings) => Some(RelayFetcher::new(
            relay_settings,
            settings.request_timeout * 4,
        )?),
        None => None,
    };
    let relay_ref: Option<&dyn Fetcher> = relay.as_ref().map(|r| r as &dyn Fetcher);

    if relay_ref.is_none() {
        println!(
            "{} no rendering relay configured; discovery is direct-fetch only",
            style("!").yellow()
        );
    }

    let mut sink = JsonLinesSink::create(output)?;
    let pipeline = Pipeline::new(&settings, &catalog, &direct, relay_ref);
    let request = ScrapeRequest {
        manufacturer,
        model,
        target: count,
    };

    let bar = ProgressBar::new(count as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("static template"),
    );
    bar.set_message("extracting listings");

    let outcome = pipeline.run(&request, &mut sink, Some(&bar)).await?;
    bar.finish_and_clear();

    let stats = &outcome.stats;
    println!(
        "{} {} listings written to {}",
        style("✓").green(),
        stats.records_extracted,
        output.display()
    );
    println!(
        "  pages scanned: {}  discovered: {}  dropped (no year): {}  fetch failures: {}",
        stats.pages_scanned,
        stats.identifiers_discovered,
        stats.records_dropped_no_year,
        stats.detail_fetch_failures
    );
    println!(
        "  thumbnails: {} resolved, {} duplicate, {} oversized",
        stats.thumbnails_resolved, stats.thumbnails_duplicate, stats.thumbnails_oversized
    );
    match outcome.stop {
        StopReason::Satisfied => {}
        StopReason::Exhausted => println!(
            "{} results exhausted before reaching the requested count",
            style("!").yellow()
        ),
        StopReason::Capped => println!(
            "{} stopped at the page cap before reaching the requested count",
            style("!").yellow()
        ),
    }

    Ok(())
}

fn list_catalog(
    catalog_path: &std::path::Path,
    manufacturer: Option<&str>,
) -> anyhow::Result<()> {
    let catalog = Catalog::load(catalog_path)?;

    println!("\n{}", style("Vehicle Catalog").bold());
    for (key, entry) in &catalog.manufacturers {
        if let Some(only) = manufacturer {
            if key != only {
                continue;
            }
        }
        println!(
            "  {} {} ({}, id {})",
            style("●").cyan(),
            key,
            entry.english,
            entry.manufacturer_id
        );
        for (model_key, model) in &entry.models {
            println!(
                "      {} ({}, id {})",
                model_key, model.english, model.model_id
            );
        }
    }
    println!();
    Ok(())
}
