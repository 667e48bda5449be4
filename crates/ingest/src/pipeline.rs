//! Scrape → save artifacts → index.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{Local, Utc};
use serde::Serialize;
use tazmic_core::document::DocumentStore;
use tazmic_core::event::{DomainEvent, EventBus};
use tazmic_core::provider::{ImageDescriptionRequest, Provider};
use tracing::{info, warn};

use crate::error::IngestError;
use crate::scraper::{ScrapedPage, Scraper};

const DESCRIBE_PROMPT: &str = "Describe the image in detail.";

/// What one ingestion produced.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub url: String,
    pub collection: String,
    pub output_dir: PathBuf,
    pub content_chars: usize,
    pub links: usize,
    pub screenshot: Option<PathBuf>,
    /// PNG files described and appended to the indexed text
    pub image_descriptions: usize,
    pub chunks: usize,
}

/// Chat model used to turn saved screenshots into searchable text.
struct ImageDescriber {
    provider: Arc<dyn Provider>,
    model: String,
}

pub struct IngestPipeline {
    scraper: Arc<dyn Scraper>,
    store: Arc<dyn DocumentStore>,
    artifacts_dir: PathBuf,
    replace_existing: bool,
    client: reqwest::Client,
    event_bus: Option<Arc<EventBus>>,
    describer: Option<ImageDescriber>,
}

impl IngestPipeline {
    pub fn new(
        scraper: Arc<dyn Scraper>,
        store: Arc<dyn DocumentStore>,
        artifacts_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            scraper,
            store,
            artifacts_dir: artifacts_dir.into(),
            replace_existing: false,
            client: reqwest::Client::new(),
            event_bus: None,
            describer: None,
        }
    }

    /// Drop an already indexed collection for the same URL before indexing.
    pub fn with_replace_existing(mut self, replace: bool) -> Self {
        self.replace_existing = replace;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Describe every saved PNG with `model` and index the descriptions
    /// along with the page text.
    pub fn with_image_describer(mut self, provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        self.describer = Some(ImageDescriber {
            provider,
            model: model.into(),
        });
        self
    }

    pub async fn run(&self, url: &str) -> Result<IngestReport, IngestError> {
        let page = self.scraper.scrape(url).await?;
        let output_dir = self
            .artifacts_dir
            .join(format!("scraped_data_{}", Local::now().format("%Y%m%d_%H%M%S")));
        self.ingest_page(&page, &output_dir).await
    }

    /// Save `page` under `output_dir` and index its markdown.
    pub async fn ingest_page(
        &self,
        page: &ScrapedPage,
        output_dir: &Path,
    ) -> Result<IngestReport, IngestError> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| IngestError::io(output_dir, e))?;

        let content_path = output_dir.join("content.md");
        tokio::fs::write(&content_path, &page.markdown)
            .await
            .map_err(|e| IngestError::io(&content_path, e))?;

        let screenshot = match &page.screenshot {
            Some(data) => self.save_screenshot_or_debug(data, output_dir).await,
            None => None,
        };

        let mut document = page.markdown.clone();
        let mut image_descriptions = 0;
        if let Some(describer) = &self.describer {
            let (section, described) = describer.describe_pngs(output_dir).await;
            if described > 0 {
                append_to_file(&content_path, &section).await?;
                document.push_str(&section);
                image_descriptions = described;
            }
        }

        let collection = collection_id_for_url(&page.url);
        if self.replace_existing && self.store.drop_collection(&collection).await? {
            info!(collection = %collection, "Dropped previous index");
        }
        let chunks = self.store.index(&collection, &document).await?;

        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::DocumentIndexed {
                collection: collection.clone(),
                chunks,
                timestamp: Utc::now(),
            });
        }

        let report = IngestReport {
            url: page.url.clone(),
            collection,
            output_dir: output_dir.to_path_buf(),
            content_chars: page.markdown.chars().count(),
            links: page.links.len(),
            screenshot,
            image_descriptions,
            chunks,
        };
        info!(
            url = %report.url,
            collection = %report.collection,
            chunks = report.chunks,
            links = report.links,
            screenshot = report.screenshot.is_some(),
            images = report.image_descriptions,
            "Ingested page"
        );
        Ok(report)
    }

    /// A screenshot failure never fails the ingestion; the raw data is kept
    /// in `screenshot_debug.txt` instead.
    async fn save_screenshot_or_debug(&self, data: &str, output_dir: &Path) -> Option<PathBuf> {
        match self.save_screenshot(data, output_dir).await {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Error saving screenshot");
                let debug_path = output_dir.join("screenshot_debug.txt");
                let preview: String = data.chars().take(100).collect();
                let dump = format!(
                    "Screenshot data length: {}\nFirst 100 chars: {preview}\nError: {e}\n",
                    data.len()
                );
                if let Err(e) = tokio::fs::write(&debug_path, dump).await {
                    warn!(path = %debug_path.display(), error = %e, "Could not write screenshot debug file");
                }
                None
            }
        }
    }

    async fn save_screenshot(
        &self,
        data: &str,
        output_dir: &Path,
    ) -> Result<Option<PathBuf>, IngestError> {
        let bytes = if data.starts_with("http") {
            info!(url = data, "Downloading screenshot");
            let response = self
                .client
                .get(data)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| IngestError::Screenshot(e.to_string()))?;
            response
                .bytes()
                .await
                .map_err(|e| IngestError::Screenshot(e.to_string()))?
                .to_vec()
        } else if data.starts_with("data:image") {
            decode_data_url(data)?
        } else {
            let preview: String = data.chars().take(50).collect();
            warn!(preview = %preview, "Unknown screenshot format");
            return Ok(None);
        };

        let path = output_dir.join("screenshot.png");
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| IngestError::io(&path, e))?;
        Ok(Some(path))
    }
}

impl ImageDescriber {
    /// Markdown section describing each `.png` in `dir`, and how many files it
    /// covers. A failed description records the error text in place of one.
    async fn describe_pngs(&self, dir: &Path) -> (String, usize) {
        let files = match png_files(dir).await {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Could not list images");
                return (String::new(), 0);
            }
        };
        if files.is_empty() {
            return (String::new(), 0);
        }

        let rule = "-".repeat(50);
        let mut section = String::from("\n\n## Image Descriptions\n\n");
        for file in &files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            info!(image = %name, "Describing image");
            let text = match self.describe(file).await {
                Ok(description) => description,
                Err(e) => {
                    warn!(image = %name, error = %e, "Error processing image");
                    format!("Error processing image: {e}")
                }
            };
            section.push_str(&format!("### {name}\n\n{text}\n\n{rule}\n\n"));
        }
        (section, files.len())
    }

    async fn describe(&self, path: &Path) -> Result<String, IngestError> {
        let image = tokio::fs::read(path)
            .await
            .map_err(|e| IngestError::io(path, e))?;
        let description = self
            .provider
            .describe_image(ImageDescriptionRequest {
                model: self.model.clone(),
                prompt: DESCRIBE_PROMPT.into(),
                mime_type: "image/png".into(),
                image,
            })
            .await?;
        Ok(description)
    }
}

async fn png_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "png") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

async fn append_to_file(path: &Path, text: &str) -> Result<(), IngestError> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .await
        .map_err(|e| IngestError::io(path, e))?;
    file.write_all(text.as_bytes())
        .await
        .map_err(|e| IngestError::io(path, e))
}

/// Collection name for a page URL: anything outside `[A-Za-z0-9_-]` becomes `_`.
pub fn collection_id_for_url(url: &str) -> String {
    url.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Decode the payload of a `data:image/...;base64,` URL.
pub fn decode_data_url(data: &str) -> Result<Vec<u8>, IngestError> {
    let (_, payload) = data
        .split_once(',')
        .ok_or_else(|| IngestError::Screenshot("data URL has no payload".into()))?;
    STANDARD
        .decode(fix_base64_padding(payload.trim()))
        .map_err(|e| IngestError::Screenshot(format!("invalid base64: {e}")))
}

fn fix_base64_padding(data: &str) -> String {
    let mut fixed = data.trim_end_matches('=').to_string();
    let missing = fixed.len() % 4;
    if missing != 0 {
        fixed.push_str(&"=".repeat(4 - missing));
    }
    fixed
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tazmic_core::error::{ProviderError, StoreError};
    use tazmic_core::provider::{ProviderRequest, ProviderResponse};
    use tazmic_store::{Chunker, HashingEmbedder, InMemoryDocumentStore};

    struct FixedScraper {
        page: ScrapedPage,
    }

    #[async_trait]
    impl Scraper for FixedScraper {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn scrape(&self, _url: &str) -> Result<ScrapedPage, IngestError> {
            Ok(self.page.clone())
        }
    }

    fn page(screenshot: Option<&str>) -> ScrapedPage {
        ScrapedPage {
            url: "https://example.com/bio.html".into(),
            markdown: "# Biology\n\nMitochondria produce energy.".into(),
            screenshot: screenshot.map(String::from),
            links: vec!["https://example.com/a".into(), "https://example.com/b".into()],
        }
    }

    fn pipeline(page: ScrapedPage, dir: &Path) -> (IngestPipeline, Arc<InMemoryDocumentStore>) {
        let store = Arc::new(InMemoryDocumentStore::new(
            Arc::new(HashingEmbedder::default()),
            Chunker::default(),
        ));
        let pipeline = IngestPipeline::new(Arc::new(FixedScraper { page }), store.clone(), dir);
        (pipeline, store)
    }

    #[test]
    fn collection_id_replaces_punctuation() {
        assert_eq!(
            collection_id_for_url("https://example.com/a-b_c?x=1"),
            "https___example_com_a-b_c_x_1"
        );
    }

    #[test]
    fn padding_is_repaired() {
        assert_eq!(fix_base64_padding("aGVsbG8"), "aGVsbG8=");
        assert_eq!(fix_base64_padding("aGk"), "aGk=");
        assert_eq!(fix_base64_padding("aGVsbG8="), "aGVsbG8=");
        assert_eq!(decode_data_url("data:image/png;base64,aGVsbG8").unwrap(), b"hello");
        assert!(decode_data_url("data:image/png;base64").is_err());
    }

    #[tokio::test]
    async fn run_writes_artifacts_and_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, store) = pipeline(page(Some("data:image/png;base64,aGVsbG8")), dir.path());

        let report = pipeline.run("https://example.com/bio.html").await.unwrap();

        assert!(report.output_dir.starts_with(dir.path()));
        assert!(report
            .output_dir
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("scraped_data_"));
        let content = std::fs::read_to_string(report.output_dir.join("content.md")).unwrap();
        assert!(content.contains("Mitochondria"));
        assert_eq!(std::fs::read(report.output_dir.join("screenshot.png")).unwrap(), b"hello");

        assert_eq!(report.collection, "https___example_com_bio_html");
        assert_eq!(report.links, 2);
        assert_eq!(report.chunks, 1);
        assert_eq!(store.count(&report.collection).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn bad_screenshot_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _store) = pipeline(page(Some("data:image/png;base64,@@@@")), dir.path());
        let out = dir.path().join("run");

        let report = pipeline.ingest_page(&page(Some("data:image/png;base64,@@@@")), &out).await.unwrap();
        assert!(report.screenshot.is_none());
        assert!(out.join("screenshot_debug.txt").exists());
        assert_eq!(report.chunks, 1);
    }

    #[tokio::test]
    async fn unknown_screenshot_format_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _store) = pipeline(page(Some("not-an-image")), dir.path());
        let report = pipeline.run("https://example.com/bio.html").await.unwrap();
        assert!(report.screenshot.is_none());
        assert!(!report.output_dir.join("screenshot_debug.txt").exists());
    }

    #[tokio::test]
    async fn second_ingest_needs_replace() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, store) = pipeline(page(None), dir.path());

        pipeline.ingest_page(&page(None), &dir.path().join("one")).await.unwrap();
        let err = pipeline
            .ingest_page(&page(None), &dir.path().join("two"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Store(StoreError::CollectionExists(_))));

        let pipeline = IngestPipeline::new(
            Arc::new(FixedScraper { page: page(None) }),
            store.clone(),
            dir.path(),
        )
        .with_replace_existing(true);
        let report = pipeline.ingest_page(&page(None), &dir.path().join("three")).await.unwrap();
        assert_eq!(report.chunks, 1);
    }

    /// Describes images with a fixed text, or fails, and records what it saw.
    struct Describer {
        reply: Result<String, String>,
        seen: Mutex<Vec<ImageDescriptionRequest>>,
    }

    impl Describer {
        fn new(reply: Result<&str, &str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(String::from).map_err(String::from),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Provider for Describer {
        fn name(&self) -> &str {
            "describer"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotConfigured("chat not scripted".into()))
        }

        async fn describe_image(&self, request: ImageDescriptionRequest) -> Result<String, ProviderError> {
            self.seen.lock().unwrap().push(request);
            self.reply.clone().map_err(ProviderError::Network)
        }
    }

    #[tokio::test]
    async fn screenshot_description_is_saved_and_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let describer = Describer::new(Ok("A diagram of a mitochondrion."));
        let (pipeline, store) = pipeline(page(Some("data:image/png;base64,aGVsbG8")), dir.path());
        let pipeline = pipeline.with_image_describer(describer.clone(), "gpt-4o");

        let report = pipeline.run("https://example.com/bio.html").await.unwrap();
        assert_eq!(report.image_descriptions, 1);

        let content = std::fs::read_to_string(report.output_dir.join("content.md")).unwrap();
        assert!(content.starts_with("# Biology"));
        assert!(content.contains(&format!(
            "\n\n## Image Descriptions\n\n### screenshot.png\n\nA diagram of a mitochondrion.\n\n{}\n\n",
            "-".repeat(50)
        )));

        let seen = describer.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "gpt-4o");
        assert_eq!(seen[0].prompt, "Describe the image in detail.");
        assert_eq!(seen[0].mime_type, "image/png");
        assert_eq!(seen[0].image, b"hello");

        let hits = store
            .query(&report.collection, "diagram of a mitochondrion", 5)
            .await
            .unwrap();
        assert!(hits.iter().any(|c| c.content.contains("A diagram of a mitochondrion.")));
    }

    #[tokio::test]
    async fn failed_description_records_the_error() {
        let dir = tempfile::tempdir().unwrap();
        let describer = Describer::new(Err("vision model offline"));
        let (pipeline, _store) = pipeline(page(Some("data:image/png;base64,aGVsbG8")), dir.path());
        let pipeline = pipeline.with_image_describer(describer, "gpt-4o");

        let report = pipeline.run("https://example.com/bio.html").await.unwrap();
        assert_eq!(report.chunks, 1);

        let content = std::fs::read_to_string(report.output_dir.join("content.md")).unwrap();
        assert!(content.contains("### screenshot.png\n\nError processing image:"));
        assert!(content.contains("vision model offline"));
    }

    #[tokio::test]
    async fn no_png_means_no_description_section() {
        let dir = tempfile::tempdir().unwrap();
        let describer = Describer::new(Ok("unused"));
        let (pipeline, _store) = pipeline(page(None), dir.path());
        let pipeline = pipeline.with_image_describer(describer.clone(), "gpt-4o");

        let report = pipeline.run("https://example.com/bio.html").await.unwrap();
        assert_eq!(report.image_descriptions, 0);
        let content = std::fs::read_to_string(report.output_dir.join("content.md")).unwrap();
        assert!(!content.contains("## Image Descriptions"));
        assert!(describer.seen.lock().unwrap().is_empty());
    }
}
