//! Web page scrapers.
//!
//! [`FirecrawlScraper`] talks to the Firecrawl `/v1/scrape` API and asks for
//! the page as markdown, a full-page screenshot and the outgoing links.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tazmic_config::IngestConfig;
use tracing::{debug, warn};

use crate::error::IngestError;

/// One fetched page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub url: String,
    pub markdown: String,
    /// A `data:image/...;base64,` URL or a downloadable image URL
    pub screenshot: Option<String>,
    pub links: Vec<String>,
}

#[async_trait]
pub trait Scraper: Send + Sync {
    fn name(&self) -> &str;

    async fn scrape(&self, url: &str) -> Result<ScrapedPage, IngestError>;
}

pub struct FirecrawlScraper {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct FirecrawlResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<FirecrawlData>,
}

#[derive(Debug, Default, Deserialize)]
struct FirecrawlData {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    screenshot: Option<String>,
    #[serde(default)]
    links: Vec<String>,
}

impl FirecrawlScraper {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Build from the `[ingest]` config section; the API key is required.
    pub fn from_config(config: &IngestConfig) -> Result<Self, IngestError> {
        let api_key = config
            .firecrawl_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                IngestError::NotConfigured(
                    "set ingest.firecrawl_api_key or FIRECRAWL_API_KEY".into(),
                )
            })?;
        Ok(Self::new(&config.firecrawl_api_url, api_key))
    }

    fn scrape_url(&self) -> String {
        format!("{}/v1/scrape", self.base_url)
    }

    fn request_body(url: &str) -> serde_json::Value {
        serde_json::json!({
            "url": url,
            "formats": ["markdown", "screenshot", "links"],
        })
    }

    fn into_page(url: &str, response: FirecrawlResponse) -> Result<ScrapedPage, IngestError> {
        if !response.success {
            return Err(IngestError::Scrape {
                url: url.to_string(),
                reason: response.error.unwrap_or_else(|| "success=false".into()),
            });
        }

        let data = response.data.unwrap_or_default();
        let markdown = data.markdown.unwrap_or_default();
        if markdown.trim().is_empty() {
            return Err(IngestError::EmptyPage(url.to_string()));
        }

        Ok(ScrapedPage {
            url: url.to_string(),
            markdown,
            screenshot: data.screenshot.filter(|s| !s.is_empty()),
            links: data.links,
        })
    }
}

#[async_trait]
impl Scraper for FirecrawlScraper {
    fn name(&self) -> &str {
        "firecrawl"
    }

    async fn scrape(&self, url: &str) -> Result<ScrapedPage, IngestError> {
        debug!(url, "Scraping page");
        let scrape_error = |reason: String| IngestError::Scrape {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .post(self.scrape_url())
            .bearer_auth(&self.api_key)
            .json(&Self::request_body(url))
            .send()
            .await
            .map_err(|e| scrape_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Firecrawl returned error");
            return Err(scrape_error(format!("HTTP {}: {body}", status.as_u16())));
        }

        let parsed: FirecrawlResponse = response
            .json()
            .await
            .map_err(|e| scrape_error(format!("invalid response: {e}")))?;

        Self::into_page(url, parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> FirecrawlResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn request_asks_for_three_formats() {
        let body = FirecrawlScraper::request_body("https://example.com");
        assert_eq!(body["url"], "https://example.com");
        assert_eq!(body["formats"], serde_json::json!(["markdown", "screenshot", "links"]));
    }

    #[test]
    fn base_url_is_normalized() {
        let scraper = FirecrawlScraper::new("https://api.firecrawl.dev/", "fc-key");
        assert_eq!(scraper.scrape_url(), "https://api.firecrawl.dev/v1/scrape");
    }

    #[test]
    fn parses_successful_response() {
        let response = parse(serde_json::json!({
            "success": true,
            "data": {
                "markdown": "# Title\n\nBody",
                "screenshot": "https://cdn.example.com/shot.png",
                "links": ["https://example.com/a"],
                "metadata": {"title": "Title"}
            }
        }));
        let page = FirecrawlScraper::into_page("https://example.com", response).unwrap();
        assert_eq!(page.markdown, "# Title\n\nBody");
        assert_eq!(page.screenshot.as_deref(), Some("https://cdn.example.com/shot.png"));
        assert_eq!(page.links.len(), 1);
    }

    #[test]
    fn failure_and_empty_pages_are_errors() {
        let failed = parse(serde_json::json!({"success": false, "error": "blocked"}));
        let err = FirecrawlScraper::into_page("u", failed).unwrap_err();
        assert!(err.to_string().contains("blocked"));

        let empty = parse(serde_json::json!({"success": true, "data": {"markdown": "  "}}));
        assert!(matches!(
            FirecrawlScraper::into_page("u", empty),
            Err(IngestError::EmptyPage(_))
        ));
    }

    #[test]
    fn from_config_requires_key() {
        let mut config = IngestConfig::default();
        config.firecrawl_api_key = None;
        assert!(matches!(
            FirecrawlScraper::from_config(&config),
            Err(IngestError::NotConfigured(_))
        ));

        config.firecrawl_api_key = Some("fc-123".into());
        assert!(FirecrawlScraper::from_config(&config).is_ok());
    }
}
