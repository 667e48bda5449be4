//! `tazmic index` — Index a local text or markdown file.

use std::path::Path;

use anyhow::{Context, bail};
use tazmic_core::error::StoreError;
use tracing::info;

use super::runtime::{self, Options};

pub async fn run(opts: &Options, file: &Path, force: bool) -> anyhow::Result<()> {
    let config = runtime::load_config(opts)?;
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Cannot read {}", file.display()))?;

    let store = runtime::store(&config).await?;
    let collection = &config.store.collection;

    if force && store.drop_collection(collection).await? {
        info!(collection = %collection, "Dropped previous index");
    }

    let chunks = match store.index(collection, &text).await {
        Ok(chunks) => chunks,
        Err(StoreError::CollectionExists(name)) => {
            bail!("Collection '{name}' is already indexed; pass --force to re-index it")
        }
        Err(e) => return Err(e.into()),
    };

    println!(
        "Indexed {} ({} chars) into '{collection}': {chunks} chunk(s)",
        file.display(),
        text.chars().count()
    );
    Ok(())
}
