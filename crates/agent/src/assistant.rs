//! Question answering over persisted threads.
//!
//! [`Assistant`] is what the console and the HTTP gateway talk to. Each turn
//! runs on a copy of the stored thread and is committed only when the loop
//! finishes, so a failed turn leaves no trace in the thread.

use std::collections::HashMap;
use std::sync::Arc;

use tazmic_config::AppConfig;
use tazmic_core::document::DocumentStore;
use tazmic_core::error::AgentError;
use tazmic_core::event::EventBus;
use tazmic_core::message::{Message, ThreadId};
use tazmic_core::provider::Provider;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::loop_runner::{AgentLoop, TurnOutcome};
use crate::session::{InMemoryThreadStore, ThreadStore};

/// Shown when a turn ends without any answer text.
pub const FALLBACK_MESSAGE: &str =
    "I couldn't find relevant information in the documents. Please try rephrasing your question.";

pub struct Assistant {
    agent: AgentLoop,
    threads: Arc<dyn ThreadStore>,
    locks: Mutex<HashMap<ThreadId, Arc<Mutex<()>>>>,
}

impl Assistant {
    pub fn new(agent: AgentLoop, threads: Arc<dyn ThreadStore>) -> Self {
        Self {
            agent,
            threads,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wire the retrieval tool, the loop and an in-memory thread store.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        store: Arc<dyn DocumentStore>,
        event_bus: Arc<EventBus>,
    ) -> Result<Self, AgentError> {
        let registry = tazmic_tools::default_registry(
            store,
            &config.store.collection,
            config.retrieval.top_k,
        )
        .map_err(|e| AgentError::Registry(e.to_string()))?;

        let agent = AgentLoop::from_config(config, provider, Arc::new(registry), event_bus);
        Ok(Self::new(agent, Arc::new(InMemoryThreadStore::new())))
    }

    pub fn threads(&self) -> &Arc<dyn ThreadStore> {
        &self.threads
    }

    pub fn agent(&self) -> &AgentLoop {
        &self.agent
    }

    /// Answer `user_text` in thread `thread_id`.
    ///
    /// Returns an empty string when the model produced no answer text.
    pub async fn answer(&self, thread_id: &ThreadId, user_text: &str) -> Result<String, AgentError> {
        self.turn(thread_id, user_text).await.map(|outcome| outcome.answer)
    }

    /// Like [`answer`](Self::answer), with the outcome details.
    pub async fn turn(&self, thread_id: &ThreadId, user_text: &str) -> Result<TurnOutcome, AgentError> {
        let lock = self.thread_lock(thread_id).await;
        let _guard = lock.lock().await;

        let mut scratch = self.threads.load(thread_id).await?;
        scratch.push(Message::user(user_text));

        let outcome = self.agent.run(&mut scratch).await?;
        self.threads.commit(scratch).await?;

        info!(
            thread_id = %thread_id,
            rounds = outcome.rounds,
            forced = outcome.forced,
            "Answer committed"
        );
        Ok(outcome)
    }

    /// Answer text ready for display; never fails.
    pub async fn answer_or_fallback(&self, thread_id: &ThreadId, user_text: &str) -> String {
        match self.answer(thread_id, user_text).await {
            Ok(answer) if answer.trim().is_empty() => FALLBACK_MESSAGE.to_string(),
            Ok(answer) => answer,
            Err(e) => {
                error!(thread_id = %thread_id, error = %e, "Turn failed");
                format!("Sorry, I encountered an error: {e}")
            }
        }
    }

    async fn thread_lock(&self, thread_id: &ThreadId) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(thread_id.clone())
            .or_default()
            .clone()
    }
}
