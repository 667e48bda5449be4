//! `tazmic init` — Write a default config file.

use anyhow::Context;
use tazmic_config::AppConfig;

use super::runtime::Options;

pub async fn run(opts: &Options, force: bool) -> anyhow::Result<()> {
    let config_path = opts.config_path();

    println!("TAZMIC — Setup");
    println!("==============\n");

    if config_path.exists() && !force {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or re-run with --force.\n");
        return Ok(());
    }

    if let Some(dir) = config_path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Cannot create {}", dir.display()))?;
    }
    tokio::fs::write(&config_path, AppConfig::default_toml())
        .await
        .with_context(|| format!("Cannot write {}", config_path.display()))?;
    println!("✅ Created config at: {}", config_path.display());

    println!("\nNext steps:");
    println!("  1. Set api_key (or export TAZMIC_API_KEY / AZURE_OPENAI_API_KEY)");
    println!("  2. Index a document: tazmic index --file notes.md");
    println!("     or scrape one:    tazmic ingest --url https://example.com");
    println!("  3. Ask away:         tazmic chat");
    Ok(())
}
