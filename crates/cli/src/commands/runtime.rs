//! Shared wiring for the subcommands: config, provider, store, assistant.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tazmic_agent::Assistant;
use tazmic_config::{AppConfig, EmbeddingProvider};
use tazmic_core::document::DocumentStore;
use tazmic_core::event::{DomainEvent, EventBus};
use tazmic_core::provider::Provider;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Global flags every subcommand honors.
pub struct Options {
    pub config_path: Option<PathBuf>,
    pub collection: Option<String>,
}

impl Options {
    pub fn config_path(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
    }
}

/// Everything needed to answer questions.
pub struct Runtime {
    pub config: AppConfig,
    pub assistant: Arc<Assistant>,
    pub store: Arc<dyn DocumentStore>,
}

pub fn load_config(opts: &Options) -> anyhow::Result<AppConfig> {
    let path = opts.config_path();
    let mut config = AppConfig::load_with_env(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    if let Some(collection) = &opts.collection {
        config.store.collection = collection.clone();
    }
    Ok(config)
}

pub fn provider(config: &AppConfig) -> anyhow::Result<Arc<dyn Provider>> {
    tazmic_providers::router::build_from_config(config).context(
        "No model provider available. Set api_key in config.toml or export TAZMIC_API_KEY",
    )
}

/// Open the store. A provider is only built when embeddings need one.
pub async fn store(config: &AppConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let provider = match config.embedding.provider {
        EmbeddingProvider::Openai => Some(provider(config)?),
        EmbeddingProvider::Hashing => None,
    };
    store_with(config, provider).await
}

async fn store_with(
    config: &AppConfig,
    provider: Option<Arc<dyn Provider>>,
) -> anyhow::Result<Arc<dyn DocumentStore>> {
    tazmic_store::build_from_config(config, provider)
        .await
        .context("Failed to open the document store")
}

/// Build the assistant over the configured collection.
pub async fn build(opts: &Options) -> anyhow::Result<Runtime> {
    let config = load_config(opts)?;
    let provider = provider(&config)?;
    let store = store_with(&config, Some(Arc::clone(&provider))).await?;

    let chunks = collection_size(store.as_ref(), &config.store.collection).await?;
    if chunks == 0 {
        warn!(
            collection = %config.store.collection,
            "Collection is empty; run `tazmic index` or `tazmic ingest` first"
        );
    }

    let event_bus = Arc::new(EventBus::default());
    spawn_event_logger(&event_bus);

    let assistant = Assistant::from_config(&config, provider, Arc::clone(&store), event_bus)
        .context("Failed to build the assistant")?;

    info!(
        model = %assistant.agent().model(),
        collection = %config.store.collection,
        chunks,
        "Assistant ready"
    );

    Ok(Runtime {
        config,
        assistant: Arc::new(assistant),
        store,
    })
}

/// Chunks indexed under `collection`.
pub async fn collection_size(store: &dyn DocumentStore, collection: &str) -> anyhow::Result<usize> {
    store
        .count(collection)
        .await
        .with_context(|| format!("Failed to read collection '{collection}' from the document store"))
}

/// Log domain events until the bus closes.
pub fn spawn_event_logger(bus: &EventBus) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event logger fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn log_event(event: &DomainEvent) {
    match event {
        DomainEvent::ResponseGenerated {
            thread_id,
            model,
            tokens_used,
            ..
        } => debug!(thread = %thread_id, model = %model, tokens_used, "Model responded"),
        DomainEvent::ToolExecuted {
            tool_name,
            success,
            duration_ms,
            ..
        } => debug!(tool = %tool_name, success, duration_ms, "Tool executed"),
        DomainEvent::TurnCompleted {
            thread_id,
            rounds,
            forced,
            ..
        } => info!(thread = %thread_id, rounds, forced, "Turn completed"),
        DomainEvent::DocumentIndexed {
            collection, chunks, ..
        } => info!(collection = %collection, chunks, "Document indexed"),
        DomainEvent::ErrorOccurred {
            context,
            error_message,
            ..
        } => warn!(context = %context, error = %error_message, "Error"),
    }
}
