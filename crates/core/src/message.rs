//! Message and Thread domain types.
//!
//! A thread is the persisted conversation for one thread id. Messages are a
//! tagged enum so the agent loop can match on "plain answer", "tool request"
//! and "tool result" exhaustively instead of probing for optional fields.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier of one persisted conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A model-issued request to call a named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Opaque id, unique within the assistant message
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON object
    pub arguments: serde_json::Value,
}

impl ToolInvocation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// What a message carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    /// Fixed instructions
    System { content: String },
    /// Text typed by the user
    User { content: String },
    /// A plain assistant answer
    Assistant { content: String },
    /// An assistant turn that asks for one or more tool calls
    ToolRequest {
        #[serde(default)]
        content: String,
        calls: Vec<ToolInvocation>,
    },
    /// The answer to exactly one tool call
    ToolResult {
        call_id: String,
        tool_name: String,
        content: String,
    },
}

/// A single message in a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl Message {
    fn with_body(body: MessageBody) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            body,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_body(MessageBody::System {
            content: content.into(),
        })
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_body(MessageBody::User {
            content: content.into(),
        })
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_body(MessageBody::Assistant {
            content: content.into(),
        })
    }

    /// An assistant message requesting tool calls.
    ///
    /// With no calls this degrades to a plain assistant message, so a
    /// `ToolRequest` body always carries at least one invocation.
    pub fn tool_request(content: impl Into<String>, calls: Vec<ToolInvocation>) -> Self {
        let content = content.into();
        if calls.is_empty() {
            return Self::assistant(content);
        }
        Self::with_body(MessageBody::ToolRequest { content, calls })
    }

    pub fn tool_result(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::with_body(MessageBody::ToolResult {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
        })
    }

    pub fn role(&self) -> Role {
        match &self.body {
            MessageBody::System { .. } => Role::System,
            MessageBody::User { .. } => Role::User,
            MessageBody::Assistant { .. } | MessageBody::ToolRequest { .. } => Role::Assistant,
            MessageBody::ToolResult { .. } => Role::Tool,
        }
    }

    pub fn content(&self) -> &str {
        match &self.body {
            MessageBody::System { content }
            | MessageBody::User { content }
            | MessageBody::Assistant { content }
            | MessageBody::ToolRequest { content, .. }
            | MessageBody::ToolResult { content, .. } => content,
        }
    }

    /// Tool calls requested by this message (empty unless it is a tool request).
    pub fn tool_calls(&self) -> &[ToolInvocation] {
        match &self.body {
            MessageBody::ToolRequest { calls, .. } => calls,
            _ => &[],
        }
    }

    /// The invocation this message answers, for tool results.
    pub fn tool_call_id(&self) -> Option<&str> {
        match &self.body {
            MessageBody::ToolResult { call_id, .. } => Some(call_id),
            _ => None,
        }
    }
}

/// Ways a thread can break the request/result pairing rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairingError {
    #[error("tool result at position {position} answers unknown call '{call_id}'")]
    UnknownCall { position: usize, call_id: String },

    #[error("tool call '{call_id}' answered more than once (position {position})")]
    DuplicateAnswer { position: usize, call_id: String },

    #[error("tool calls {call_ids:?} left unanswered before position {position}")]
    Unanswered { position: usize, call_ids: Vec<String> },
}

/// The append-only message history for one thread id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    pub fn new(id: ThreadId) -> Self {
        let now = Utc::now();
        Self {
            id,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.updated_at = Utc::now();
        self.messages.extend(messages);
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Rough token estimate (4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        self.messages.iter().map(|m| m.content().len() / 4).sum()
    }

    /// The most recent messages, at most `max` of them (0 = all).
    ///
    /// The cut always lands on a user message, so a tool request is never
    /// separated from its results. When the newest user message is older than
    /// the limit allows, the window starts there and may exceed `max`.
    pub fn window(&self, max: usize) -> &[Message] {
        if max == 0 || self.messages.len() <= max {
            return &self.messages;
        }
        let floor = self.messages.len() - max;
        let start = self.messages[floor..]
            .iter()
            .position(|m| m.role() == Role::User)
            .map(|offset| floor + offset)
            .or_else(|| self.messages.iter().rposition(|m| m.role() == Role::User))
            .unwrap_or(floor);
        &self.messages[start..]
    }

    /// Check that every tool result answers exactly one call of the
    /// immediately preceding tool request, and that every call is answered
    /// before anything else is appended.
    pub fn validate_tool_pairing(&self) -> std::result::Result<(), PairingError> {
        let mut pending: HashSet<&str> = HashSet::new();
        let mut answered: HashSet<&str> = HashSet::new();

        for (position, message) in self.messages.iter().enumerate() {
            match &message.body {
                MessageBody::ToolResult { call_id, .. } => {
                    if pending.remove(call_id.as_str()) {
                        answered.insert(call_id.as_str());
                    } else if answered.contains(call_id.as_str()) {
                        return Err(PairingError::DuplicateAnswer {
                            position,
                            call_id: call_id.clone(),
                        });
                    } else {
                        return Err(PairingError::UnknownCall {
                            position,
                            call_id: call_id.clone(),
                        });
                    }
                }
                other => {
                    if !pending.is_empty() {
                        return Err(unanswered(position, &pending));
                    }
                    answered.clear();
                    if let MessageBody::ToolRequest { calls, .. } = other {
                        pending.extend(calls.iter().map(|c| c.id.as_str()));
                    }
                }
            }
        }

        if pending.is_empty() {
            Ok(())
        } else {
            Err(unanswered(self.messages.len(), &pending))
        }
    }
}

fn unanswered(position: usize, pending: &HashSet<&str>) -> PairingError {
    let mut call_ids: Vec<String> = pending.iter().map(|s| s.to_string()).collect();
    call_ids.sort();
    PairingError::Unanswered { position, call_ids }
}
