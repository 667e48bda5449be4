use std::path::PathBuf;

use tazmic_core::error::{ProviderError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Scraper not configured: {0}")]
    NotConfigured(String),

    #[error("Scrape of {url} failed: {reason}")]
    Scrape { url: String, reason: String },

    #[error("Scraper returned no content for {0}")]
    EmptyPage(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Screenshot could not be saved: {0}")]
    Screenshot(String),

    #[error("Image description failed: {0}")]
    Describe(#[from] ProviderError),

    #[error("Indexing failed: {0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
