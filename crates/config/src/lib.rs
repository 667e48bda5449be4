//! Configuration loading, validation, and management for TAZMIC.
//!
//! Loads configuration from `~/.tazmic/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.tazmic/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the chat/embedding provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("embedding", &self.embedding)
            .field("retrieval", &self.retrieval)
            .field("agent", &self.agent)
            .field("store", &self.store)
            .field("ingest", &self.ingest)
            .field("gateway", &self.gateway)
            .finish()
    }
}

/// Which flavour of OpenAI-compatible endpoint to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Openai,
    Azure,
    Openrouter,
    Ollama,
    Custom,
}

impl ProviderKind {
    /// Base URL used when `api_url` is not set. Azure and custom endpoints
    /// have no sensible default.
    pub fn default_api_url(&self) -> Option<&'static str> {
        match self {
            Self::Openai => Some("https://api.openai.com/v1"),
            Self::Openrouter => Some("https://openrouter.ai/api/v1"),
            Self::Ollama => Some("http://localhost:11434/v1"),
            Self::Azure | Self::Custom => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Azure => "azure",
            Self::Openrouter => "openrouter",
            Self::Ollama => "ollama",
            Self::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,

    /// Endpoint base URL (Azure: the resource endpoint)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Azure `api-version` query parameter
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Chat model name, or the deployment name on Azure
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_api_version() -> String {
    "2024-06-01".into()
}
fn default_chat_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.0
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            api_url: None,
            api_version: default_api_version(),
            chat_model: default_chat_model(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Embeddings endpoint of the configured chat provider
    #[default]
    Openai,
    /// Offline feature-hashing embedder
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    /// Embedding model name, or the deployment name on Azure
    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_dimensions() -> usize {
    1536
}
fn default_batch_size() -> usize {
    64
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum characters per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Chunks returned per retrieval call
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Chunks scoring below this cosine similarity are dropped
    #[serde(default)]
    pub min_score: f32,
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_top_k() -> usize {
    20
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            min_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Tool rounds allowed before a tools-free final answer is forced
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    /// Deadline for one model call, in seconds
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,

    /// Most recent messages sent to the model (0 = all)
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    #[serde(default = "default_thread_id")]
    pub default_thread_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,
}

fn default_max_tool_rounds() -> usize {
    8
}
fn default_model_timeout_secs() -> u64 {
    120
}
fn default_history_window() -> usize {
    40
}
fn default_thread_id() -> String {
    "1".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            model_timeout_secs: default_model_timeout_secs(),
            history_window: default_history_window(),
            default_thread_id: default_thread_id(),
            system_prompt_override: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// SQLite database file (defaults to `~/.tazmic/documents.db`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Collection the retrieval tool searches
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_collection() -> String {
    "document".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: None,
            collection: default_collection(),
        }
    }
}

impl StoreConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("documents.db"))
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_firecrawl_api_url")]
    pub firecrawl_api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firecrawl_api_key: Option<String>,

    /// Where scraped markdown and screenshots are written
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    /// Ask the chat model to describe saved screenshots and index the text
    #[serde(default = "default_describe_images")]
    pub describe_images: bool,
}

fn default_firecrawl_api_url() -> String {
    "https://api.firecrawl.dev".into()
}
fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}
fn default_describe_images() -> bool {
    true
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            firecrawl_api_url: default_firecrawl_api_url(),
            firecrawl_api_key: None,
            artifacts_dir: default_artifacts_dir(),
            describe_images: default_describe_images(),
        }
    }
}

impl std::fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestConfig")
            .field("firecrawl_api_url", &self.firecrawl_api_url)
            .field("firecrawl_api_key", &redact(&self.firecrawl_api_key))
            .field("artifacts_dir", &self.artifacts_dir)
            .field("describe_images", &self.describe_images)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8501
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.tazmic/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply environment overrides and re-validate.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// API key precedence: `TAZMIC_API_KEY`, `AZURE_OPENAI_API_KEY`,
    /// `OPENAI_API_KEY`, only when the file sets none. An Azure endpoint
    /// in the environment switches the provider kind to `azure`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.is_none() {
            self.api_key = lookup("TAZMIC_API_KEY")
                .or_else(|| lookup("AZURE_OPENAI_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(endpoint) = lookup("AZURE_OPENAI_ENDPOINT") {
            self.provider.kind = ProviderKind::Azure;
            self.provider.api_url = Some(endpoint);
        }
        if let Some(version) = lookup("AZURE_OPENAI_API_VERSION") {
            self.provider.api_version = version;
        }
        if let Some(deployment) = lookup("AZURE_OPENAI_LLM_DEPLOYMENT") {
            self.provider.chat_model = deployment;
        }
        if let Some(deployment) = lookup("AZURE_OPENAI_EMBEDDING_DEPLOYMENT") {
            self.embedding.model = deployment;
        }
        if let Some(key) = lookup("FIRECRAWL_API_KEY") {
            self.ingest.firecrawl_api_key = Some(key);
        }
        if let Some(collection) = lookup("TAZMIC_COLLECTION") {
            self.store.collection = collection;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tazmic")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.temperature < 0.0 || self.provider.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.retrieval.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.chunk_size must be > 0".into(),
            ));
        }

        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.retrieval.chunk_overlap, self.retrieval.chunk_size
            )));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be > 0".into(),
            ));
        }

        if self.agent.max_tool_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_rounds must be > 0".into(),
            ));
        }

        if self.agent.model_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent.model_timeout_secs must be > 0".into(),
            ));
        }

        if self.embedding.dimensions == 0 || self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimensions and embedding.batch_size must be > 0".into(),
            ));
        }

        if self.store.collection.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "store.collection must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: ProviderConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            agent: AgentConfig::default(),
            store: StoreConfig::default(),
            ingest: IngestConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
