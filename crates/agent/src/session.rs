//! Persisted conversation threads.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tazmic_core::error::AgentError;
use tazmic_core::message::{Role, Thread, ThreadId};
use tokio::sync::RwLock;
use tracing::debug;

const PREVIEW_CHARS: usize = 80;

/// One row of a thread listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadSummary {
    pub id: ThreadId,
    pub messages: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Start of the first user message
    pub preview: String,
}

impl ThreadSummary {
    pub fn of(thread: &Thread) -> Self {
        let preview = thread
            .messages
            .iter()
            .find(|m| m.role() == Role::User)
            .map(|m| m.content().chars().take(PREVIEW_CHARS).collect())
            .unwrap_or_default();

        Self {
            id: thread.id.clone(),
            messages: thread.len(),
            created_at: thread.created_at,
            updated_at: thread.updated_at,
            preview,
        }
    }
}

/// Storage for conversation threads keyed by thread id.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// The thread with this id, or a fresh empty one.
    async fn load(&self, id: &ThreadId) -> Result<Thread, AgentError>;

    /// The thread with this id, if it has ever been committed.
    async fn get(&self, id: &ThreadId) -> Result<Option<Thread>, AgentError>;

    /// Replace the stored thread with `thread`. Threads that break the
    /// tool pairing rule are rejected.
    async fn commit(&self, thread: Thread) -> Result<(), AgentError>;

    /// All stored threads, most recently updated first.
    async fn list(&self) -> Result<Vec<ThreadSummary>, AgentError>;

    /// Forget a thread. Returns whether it existed.
    async fn clear(&self, id: &ThreadId) -> Result<bool, AgentError>;
}

/// Threads held in a HashMap for the life of the process.
#[derive(Default)]
pub struct InMemoryThreadStore {
    threads: RwLock<HashMap<ThreadId, Thread>>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadStore for InMemoryThreadStore {
    async fn load(&self, id: &ThreadId) -> Result<Thread, AgentError> {
        Ok(self
            .threads
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_else(|| Thread::new(id.clone())))
    }

    async fn get(&self, id: &ThreadId) -> Result<Option<Thread>, AgentError> {
        Ok(self.threads.read().await.get(id).cloned())
    }

    async fn commit(&self, thread: Thread) -> Result<(), AgentError> {
        thread
            .validate_tool_pairing()
            .map_err(|e| AgentError::Session(format!("thread {}: {e}", thread.id)))?;

        debug!(thread_id = %thread.id, messages = thread.len(), "Committing thread");
        self.threads.write().await.insert(thread.id.clone(), thread);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ThreadSummary>, AgentError> {
        let mut summaries: Vec<ThreadSummary> =
            self.threads.read().await.values().map(ThreadSummary::of).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    async fn clear(&self, id: &ThreadId) -> Result<bool, AgentError> {
        Ok(self.threads.write().await.remove(id).is_some())
    }
}
