//! Provider construction from configuration.

use std::sync::Arc;
use std::time::Duration;

use tazmic_config::{AppConfig, ProviderKind};
use tazmic_core::error::ProviderError;
use tazmic_core::provider::Provider;
use tracing::info;

use crate::openai_compat::OpenAiCompatProvider;

/// Build the configured chat/embedding provider.
///
/// Azure and custom endpoints require `provider.api_url`; hosted
/// providers other than Ollama require an API key. Every request,
/// embeddings included, is bounded by `agent.model_timeout_secs`.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let kind = config.provider.kind;
    let api_key = config.api_key.clone().unwrap_or_default();

    if api_key.is_empty() && kind != ProviderKind::Ollama {
        return Err(ProviderError::NotConfigured(format!(
            "No API key for provider '{}'. Set api_key in config.toml or TAZMIC_API_KEY / AZURE_OPENAI_API_KEY / OPENAI_API_KEY",
            kind.as_str()
        )));
    }

    let base_url = resolve_base_url(config)?;
    info!(provider = kind.as_str(), url = %base_url, "Building provider");

    let provider = match kind {
        ProviderKind::Azure => {
            OpenAiCompatProvider::azure(&base_url, &config.provider.api_version, &api_key)
        }
        ProviderKind::Ollama => OpenAiCompatProvider::ollama(Some(&base_url)),
        other => OpenAiCompatProvider::new(other.as_str(), &base_url, &api_key),
    };
    let timeout = Duration::from_secs(config.agent.model_timeout_secs);

    Ok(Arc::new(provider.with_timeout(timeout)))
}

/// The endpoint URL: explicit `api_url` first, then the kind's default.
fn resolve_base_url(config: &AppConfig) -> Result<String, ProviderError> {
    config
        .provider
        .api_url
        .clone()
        .or_else(|| config.provider.kind.default_api_url().map(String::from))
        .ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "provider.api_url is required for '{}' (AZURE_OPENAI_ENDPOINT for Azure)",
                config.provider.kind.as_str()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tazmic_core::provider::EmbeddingRequest;

    fn config_with_key() -> AppConfig {
        AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        }
    }

    #[test]
    fn build_from_default_config_with_key() {
        let provider = build_from_config(&config_with_key()).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn missing_key_is_not_configured() {
        let err = build_from_config(&AppConfig::default()).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn ollama_needs_no_key() {
        let mut config = AppConfig::default();
        config.provider.kind = ProviderKind::Ollama;
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn azure_requires_endpoint() {
        let mut config = config_with_key();
        config.provider.kind = ProviderKind::Azure;
        assert!(build_from_config(&config).is_err());

        config.provider.api_url = Some("https://res.openai.azure.com".into());
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "azure");
    }

    #[tokio::test(start_paused = true)]
    async fn model_timeout_bounds_embeddings() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mut config = config_with_key();
        config.provider.kind = ProviderKind::Custom;
        config.provider.api_url = Some(format!("http://{addr}"));
        config.agent.model_timeout_secs = 200;
        let provider = build_from_config(&config).unwrap();

        let started = tokio::time::Instant::now();
        let err = provider
            .embed(EmbeddingRequest {
                model: config.embedding.model.clone(),
                inputs: vec!["hello".into()],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)), "got {err:?}");
        assert!(started.elapsed() >= Duration::from_secs(200));
    }
}
