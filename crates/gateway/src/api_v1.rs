//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST   /v1/chat`          — Ask a question in a thread
//! - `GET    /v1/threads`       — List threads
//! - `GET    /v1/threads/{id}`  — Get one thread's messages
//! - `DELETE /v1/threads/{id}`  — Forget a thread
//! - `GET    /v1/status`        — Model, collection and uptime

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tazmic_agent::{Assistant, FALLBACK_MESSAGE, ThreadSummary};
use tazmic_core::document::DocumentStore;
use tazmic_core::error::AgentError;
use tazmic_core::message::{MessageBody, ThreadId};
use tracing::{error, info};

// ── State ─────────────────────────────────────────────────────────────────

/// Shared state for the v1 API.
pub struct ApiV1State {
    pub assistant: Arc<Assistant>,
    pub store: Arc<dyn DocumentStore>,
    /// Collection the retrieval tool searches
    pub collection: String,
    /// Thread used when a chat request names none
    pub default_thread_id: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

pub type SharedApiState = Arc<ApiV1State>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/threads", get(list_threads_handler))
        .route(
            "/threads/{id}",
            get(get_thread_handler).delete(delete_thread_handler),
        )
        .route("/status", get(status_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatRequest {
    /// Thread to continue (omit for the default thread).
    #[serde(default)]
    thread_id: Option<String>,
    /// The user's question.
    message: String,
}

#[derive(Serialize)]
struct ChatResponse {
    thread_id: String,
    response: String,
    rounds: usize,
    tool_calls: usize,
    forced: bool,
}

#[derive(Serialize)]
struct ThreadListResponse {
    threads: Vec<ThreadSummary>,
}

#[derive(Serialize)]
struct ThreadDetailResponse {
    id: String,
    messages: Vec<MessageDto>,
    created_at: String,
    updated_at: String,
}

#[derive(Serialize)]
struct MessageDto {
    id: String,
    role: String,
    content: String,
    timestamp: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<String>,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    version: String,
    uptime_secs: u64,
    model: String,
    collection: String,
    chunks: usize,
    tools: Vec<String>,
    threads: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn agent_error(e: AgentError) -> ApiError {
    let status = match &e {
        AgentError::Model(_) => StatusCode::BAD_GATEWAY,
        AgentError::Registry(_) | AgentError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, format!("Sorry, I encountered an error: {e}"))
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message must not be empty"));
    }

    let thread_id = ThreadId::from(
        payload
            .thread_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(state.default_thread_id.as_str()),
    );
    info!(thread_id = %thread_id, message_len = payload.message.len(), "v1/chat request");

    let outcome = state
        .assistant
        .turn(&thread_id, &payload.message)
        .await
        .map_err(|e| {
            error!(thread_id = %thread_id, error = %e, "Chat turn failed");
            agent_error(e)
        })?;

    let response = if outcome.answer.trim().is_empty() {
        FALLBACK_MESSAGE.to_string()
    } else {
        outcome.answer
    };

    Ok(Json(ChatResponse {
        thread_id: thread_id.to_string(),
        response,
        rounds: outcome.rounds,
        tool_calls: outcome.tool_calls,
        forced: outcome.forced,
    }))
}

async fn list_threads_handler(
    State(state): State<SharedApiState>,
) -> Result<Json<ThreadListResponse>, ApiError> {
    let threads = state.assistant.threads().list().await.map_err(agent_error)?;
    Ok(Json(ThreadListResponse { threads }))
}

async fn get_thread_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<ThreadDetailResponse>, ApiError> {
    let thread = state
        .assistant
        .threads()
        .get(&ThreadId::from(&id))
        .await
        .map_err(agent_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("thread '{id}' not found")))?;

    Ok(Json(ThreadDetailResponse {
        id: thread.id.to_string(),
        messages: thread
            .messages
            .iter()
            .map(|m| MessageDto {
                id: m.id.clone(),
                role: format!("{:?}", m.role()).to_lowercase(),
                content: m.content().to_string(),
                timestamp: m.timestamp.to_rfc3339(),
                tool_calls: match &m.body {
                    MessageBody::ToolRequest { calls, .. } => {
                        calls.iter().map(|c| c.name.clone()).collect()
                    }
                    _ => Vec::new(),
                },
            })
            .collect(),
        created_at: thread.created_at.to_rfc3339(),
        updated_at: thread.updated_at.to_rfc3339(),
    }))
}

async fn delete_thread_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let existed = state
        .assistant
        .threads()
        .clear(&ThreadId::from(&id))
        .await
        .map_err(agent_error)?;

    if existed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(StatusCode::NOT_FOUND, format!("thread '{id}' not found")))
    }
}

async fn status_handler(
    State(state): State<SharedApiState>,
) -> Result<Json<StatusResponse>, ApiError> {
    let chunks = state
        .store
        .count(&state.collection)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let threads = state.assistant.threads().list().await.map_err(agent_error)?;

    let uptime = chrono::Utc::now()
        .signed_duration_since(state.start_time)
        .num_seconds()
        .max(0) as u64;

    let agent = state.assistant.agent();
    Ok(Json(StatusResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: uptime,
        model: agent.model().to_string(),
        collection: state.collection.clone(),
        chunks,
        tools: agent.tools().names().into_iter().map(String::from).collect(),
        threads: threads.len(),
    }))
}

// ── Tests ─────────────────────────────────────────────────────────────────
