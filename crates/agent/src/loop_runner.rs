//! The agent reasoning loop implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tazmic_config::AppConfig;
use tazmic_core::error::{AgentError, ProviderError};
use tazmic_core::event::{DomainEvent, EventBus};
use tazmic_core::message::{Message, Thread, ToolInvocation};
use tazmic_core::provider::{Provider, ProviderRequest};
use tazmic_core::tool::{ToolOutcome, ToolRegistry};
use tracing::{debug, info, warn};

use crate::prompt::system_prompt;

/// Where a turn currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoopState {
    /// A model call is due
    AwaitingModel,
    /// The last assistant message asked for tools
    ExecutingTools,
    /// The last assistant message is the answer
    Done,
}

/// Summary of one completed turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    /// Content of the final assistant message (may be empty)
    pub answer: String,

    /// How many tool batches were executed
    pub rounds: usize,

    /// Total tool invocations across all rounds
    pub tool_calls: usize,

    /// Whether the round limit forced a tools-free final call
    pub forced: bool,
}

/// Drives one thread from a pending user message to a final answer.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model (or deployment) to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    /// Tools advertised to the model
    tools: Arc<ToolRegistry>,

    /// Instruction prepended to every request
    system_prompt: String,

    /// Tool batches allowed before the forced final call
    max_tool_rounds: usize,

    /// Deadline for a single model call
    model_timeout: Duration,

    /// Most recent messages sent per request (0 = all)
    history_window: usize,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    /// Create a new agent loop.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            tools,
            system_prompt: system_prompt(None),
            max_tool_rounds: 8,
            model_timeout: Duration::from_secs(120),
            history_window: 40,
            event_bus,
        }
    }

    /// Build a loop from the `[provider]` and `[agent]` config sections.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let mut agent = Self::new(
            provider,
            &config.provider.chat_model,
            config.provider.temperature,
            tools,
            event_bus,
        )
        .with_max_tool_rounds(config.agent.max_tool_rounds)
        .with_model_timeout(Duration::from_secs(config.agent.model_timeout_secs))
        .with_history_window(config.agent.history_window)
        .with_system_prompt(system_prompt(config.agent.system_prompt_override.as_deref()));

        if let Some(max) = config.provider.max_tokens {
            agent = agent.with_max_tokens(max);
        }
        agent
    }

    /// Set the number of tool rounds before a tools-free answer is forced.
    pub fn with_max_tool_rounds(mut self, max: usize) -> Self {
        self.max_tool_rounds = max;
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run a turn on `thread`, which must end with the pending user message.
    ///
    /// Assistant messages and tool results are appended to `thread` as the
    /// loop goes. On error the thread may hold a partial turn; callers that
    /// persist threads should run the loop on a copy.
    pub async fn run(&self, thread: &mut Thread) -> Result<TurnOutcome, AgentError> {
        info!(
            thread_id = %thread.id,
            messages = thread.len(),
            "Processing turn"
        );

        let mut state = LoopState::AwaitingModel;
        let mut rounds = 0;
        let mut tool_calls = 0;
        let mut forced = false;

        loop {
            match state {
                LoopState::AwaitingModel => {
                    let offer_tools = rounds < self.max_tool_rounds && !self.tools.is_empty();
                    if rounds >= self.max_tool_rounds && rounds > 0 {
                        warn!(
                            thread_id = %thread.id,
                            rounds,
                            "Tool round limit reached, forcing a direct answer"
                        );
                        forced = true;
                    }

                    let message = match self.call_model(thread, offer_tools).await {
                        Ok(message) => message,
                        Err(e) => {
                            self.event_bus.publish(DomainEvent::ErrorOccurred {
                                context: format!("model call for thread {}", thread.id),
                                error_message: e.to_string(),
                                timestamp: Utc::now(),
                            });
                            return Err(AgentError::Model(e));
                        }
                    };

                    let wants_tools = !message.tool_calls().is_empty();
                    if wants_tools && !offer_tools {
                        // Nothing may answer these calls, so keep only the text
                        warn!(
                            thread_id = %thread.id,
                            calls = message.tool_calls().len(),
                            "Dropping tool calls from a tools-free response"
                        );
                        thread.push(Message::assistant(message.content()));
                        state = LoopState::Done;
                    } else {
                        thread.push(message);
                        state = if wants_tools {
                            LoopState::ExecutingTools
                        } else {
                            LoopState::Done
                        };
                    }
                }

                LoopState::ExecutingTools => {
                    let calls: Vec<ToolInvocation> = thread
                        .last()
                        .map(|m| m.tool_calls().to_vec())
                        .unwrap_or_default();

                    rounds += 1;
                    tool_calls += calls.len();
                    debug!(
                        thread_id = %thread.id,
                        round = rounds,
                        tool_count = calls.len(),
                        "Executing tool calls"
                    );

                    let outcomes = self.execute_tools(&calls).await;
                    thread.extend(
                        outcomes
                            .into_iter()
                            .map(|o| Message::tool_result(o.call_id, o.tool_name, o.content)),
                    );
                    state = LoopState::AwaitingModel;
                }

                LoopState::Done => break,
            }
        }

        let answer = thread
            .last()
            .map(|m| m.content().to_string())
            .unwrap_or_default();

        self.event_bus.publish(DomainEvent::TurnCompleted {
            thread_id: thread.id.to_string(),
            rounds,
            forced,
            timestamp: Utc::now(),
        });
        info!(
            thread_id = %thread.id,
            rounds,
            tool_calls,
            forced,
            answer_len = answer.len(),
            "Turn complete"
        );

        Ok(TurnOutcome {
            answer,
            rounds,
            tool_calls,
            forced,
        })
    }

    /// One bounded model call over the windowed history.
    async fn call_model(&self, thread: &Thread, offer_tools: bool) -> Result<Message, ProviderError> {
        let history = thread.window(self.history_window);
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(&self.system_prompt));
        messages.extend_from_slice(history);

        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: if offer_tools {
                self.tools.definitions()
            } else {
                Vec::new()
            },
        };

        debug!(
            thread_id = %thread.id,
            sent = request.messages.len(),
            tools = request.tools.len(),
            "Calling model"
        );

        let response = tokio::time::timeout(self.model_timeout, self.provider.complete(request))
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!(
                    "{} gave no response within {}s",
                    self.provider.name(),
                    self.model_timeout.as_secs()
                ))
            })??;

        if let Some(usage) = &response.usage {
            self.event_bus.publish(DomainEvent::ResponseGenerated {
                thread_id: thread.id.to_string(),
                model: response.model.clone(),
                tokens_used: usage.total_tokens,
                timestamp: Utc::now(),
            });
        }

        Ok(response.message)
    }

    /// Run every call of one batch concurrently; results keep request order.
    async fn execute_tools(&self, calls: &[ToolInvocation]) -> Vec<ToolOutcome> {
        join_all(calls.iter().map(|call| async move {
            let start = Instant::now();
            let outcome = self.tools.dispatch(call).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            self.event_bus.publish(DomainEvent::ToolExecuted {
                tool_name: call.name.clone(),
                success: outcome.success,
                duration_ms,
                timestamp: Utc::now(),
            });
            outcome
        }))
        .await
    }
}
