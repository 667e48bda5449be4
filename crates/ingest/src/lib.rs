//! Ingestion for TAZMIC: fetch a web page as markdown, keep the scrape
//! artifacts on disk, and index the markdown as one collection.

pub mod error;
pub mod pipeline;
pub mod scraper;

pub use error::IngestError;
pub use pipeline::{IngestPipeline, IngestReport, collection_id_for_url, decode_data_url};
pub use scraper::{FirecrawlScraper, ScrapedPage, Scraper};
