//! `tazmic doctor` — Diagnose configuration and connectivity.

use tazmic_config::{AppConfig, EmbeddingProvider};

use super::runtime::{self, Options};

pub async fn run(opts: &Options) -> anyhow::Result<()> {
    println!("TAZMIC Doctor — System Diagnostics");
    println!("==================================\n");

    let mut issues = 0;

    let config_path = opts.config_path();
    if config_path.exists() {
        println!("  ✅ Config file found: {}", config_path.display());
    } else {
        println!("  ⚠️  No config file at {} — using defaults (`tazmic init` writes one)", config_path.display());
    }

    let config = match runtime::load_config(opts) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e:#}");
            summary(issues + 1);
            return Ok(());
        }
    };

    issues += check_provider(&config).await;
    issues += check_store(&config).await;

    if config.ingest.firecrawl_api_key.is_some() {
        println!("  ✅ Firecrawl key configured");
    } else {
        println!("  ⚠️  No Firecrawl key — `tazmic ingest` is unavailable (`tazmic index` still works)");
    }

    summary(issues);
    Ok(())
}

async fn check_provider(config: &AppConfig) -> usize {
    if !config.has_api_key() {
        println!("  ❌ No API key — set api_key or export TAZMIC_API_KEY");
        return 1;
    }
    println!("  ✅ API key configured");

    match runtime::provider(config) {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => {
                println!("  ✅ Provider '{}' reachable ({})", provider.name(), config.provider.chat_model);
                0
            }
            Ok(false) => {
                println!("  ❌ Provider '{}' rejected the health check", provider.name());
                1
            }
            Err(e) => {
                println!("  ❌ Provider '{}' unreachable: {e}", provider.name());
                1
            }
        },
        Err(e) => {
            println!("  ❌ Provider setup failed: {e:#}");
            1
        }
    }
}

async fn check_store(config: &AppConfig) -> usize {
    if config.embedding.provider == EmbeddingProvider::Hashing {
        println!("  ⚠️  Offline hashing embeddings in use — retrieval quality is reduced");
    }

    let store = match runtime::store(config).await {
        Ok(store) => store,
        Err(e) => {
            println!("  ❌ Document store unavailable: {e:#}");
            return 1;
        }
    };

    let collection = &config.store.collection;
    match store.count(collection).await {
        Ok(0) => {
            println!("  ⚠️  Collection '{collection}' is empty — run `tazmic index` or `tazmic ingest`");
            1
        }
        Ok(chunks) => {
            println!("  ✅ Collection '{collection}': {chunks} chunk(s)");
            0
        }
        Err(e) => {
            println!("  ❌ Cannot read collection '{collection}': {e}");
            1
        }
    }
}

fn summary(issues: usize) {
    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }
}
