//! `tazmic serve` — Start the HTTP chat shell.

use std::sync::Arc;

use tazmic_gateway::ApiV1State;

use super::runtime::{self, Options};

pub async fn run(opts: &Options, port_override: Option<u16>) -> anyhow::Result<()> {
    let runtime::Runtime {
        mut config,
        assistant,
        store,
    } = runtime::build(opts).await?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("TAZMIC Gateway");
    println!("   Listening:  http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Collection: {}", config.store.collection);

    let state = Arc::new(ApiV1State {
        assistant,
        store,
        collection: config.store.collection.clone(),
        default_thread_id: config.agent.default_thread_id.clone(),
        start_time: chrono::Utc::now(),
    });

    tazmic_gateway::start(state, &config.gateway).await?;
    Ok(())
}
