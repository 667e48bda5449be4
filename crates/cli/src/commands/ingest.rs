//! `tazmic ingest` — Scrape a web page and index its markdown.

use std::sync::Arc;

use anyhow::{Context, bail};
use tazmic_core::error::StoreError;
use tazmic_core::event::EventBus;
use tazmic_ingest::{FirecrawlScraper, IngestError, IngestPipeline};
use tracing::warn;

use super::runtime::{self, Options};

pub async fn run(opts: &Options, url: &str, replace: bool) -> anyhow::Result<()> {
    let config = runtime::load_config(opts)?;
    let scraper = FirecrawlScraper::from_config(&config.ingest)
        .context("Set ingest.firecrawl_api_key or export FIRECRAWL_API_KEY")?;
    let store = runtime::store(&config).await?;

    let event_bus = Arc::new(EventBus::default());
    runtime::spawn_event_logger(&event_bus);

    let mut pipeline =
        IngestPipeline::new(Arc::new(scraper), store, config.ingest.artifacts_dir.clone())
            .with_replace_existing(replace)
            .with_event_bus(event_bus);
    if config.ingest.describe_images {
        match runtime::provider(&config) {
            Ok(provider) => {
                pipeline = pipeline.with_image_describer(provider, config.provider.chat_model.clone());
            }
            Err(e) => warn!(error = %e, "Screenshots will not be described"),
        }
    }

    println!("Scraping {url} ...");
    let report = match pipeline.run(url).await {
        Ok(report) => report,
        Err(IngestError::Store(StoreError::CollectionExists(name))) => {
            bail!("'{name}' is already indexed; pass --replace to re-index it")
        }
        Err(e) => return Err(e.into()),
    };

    println!("✅ Saved artifacts to {}", report.output_dir.display());
    println!("   Content: {} chars, {} link(s)", report.content_chars, report.links);
    match &report.screenshot {
        Some(path) => println!("   Screenshot: {}", path.display()),
        None => println!("   Screenshot: none"),
    }
    if report.image_descriptions > 0 {
        println!("   Described {} image(s)", report.image_descriptions);
    }
    println!("   Indexed {} chunk(s) into '{}'", report.chunks, report.collection);

    if report.collection != config.store.collection {
        println!("\nAsk about it with:");
        println!("  tazmic chat --collection {}", report.collection);
    }
    Ok(())
}
