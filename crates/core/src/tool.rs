//! Tool trait and the closed tool registry.
//!
//! The registry is built once at startup, validated, and then shared
//! read-only behind an `Arc`. Dispatch never fails: unknown names and
//! execution errors become ordinary result text the model can react to.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::message::ToolInvocation;
use crate::provider::ToolDefinition;

/// Result text for a call to a tool name that is not registered.
pub const UNKNOWN_TOOL_MESSAGE: &str =
    "Incorrect Tool Name, Please Retry and Select tool from List of Available tools.";

/// The result of one tool invocation, ready to be folded into the thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// The invocation id this result answers
    pub call_id: String,

    /// The tool name the model asked for
    pub tool_name: String,

    /// Whether the tool ran and returned normally
    pub success: bool,

    /// Text handed back to the model
    pub content: String,
}

/// A function the model may call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "retriever_tool").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// The set of tools available to the agent loop, keyed by name.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. A second tool with the same name is rejected.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> std::result::Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateName(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Startup validation: at least one tool, non-empty names, object schemas.
    pub fn validate(&self) -> std::result::Result<(), ToolError> {
        if self.tools.is_empty() {
            return Err(ToolError::NotFound("registry is empty".into()));
        }
        for (name, tool) in &self.tools {
            if name.trim().is_empty() {
                return Err(ToolError::InvalidSchema {
                    tool_name: name.clone(),
                    reason: "tool name is blank".into(),
                });
            }
            let schema = tool.parameters_schema();
            if schema.get("type").and_then(|t| t.as_str()) != Some("object") {
                return Err(ToolError::InvalidSchema {
                    tool_name: name.clone(),
                    reason: "parameters schema must have \"type\": \"object\"".into(),
                });
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All tool definitions, ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Run one invocation and always produce an outcome for it.
    pub async fn dispatch(&self, call: &ToolInvocation) -> ToolOutcome {
        let Some(tool) = self.get(&call.name) else {
            warn!(tool = %call.name, call_id = %call.id, "Model asked for an unregistered tool");
            return ToolOutcome {
                call_id: call.id.clone(),
                tool_name: call.name.clone(),
                success: false,
                content: UNKNOWN_TOOL_MESSAGE.to_string(),
            };
        };

        match tool.execute(call.arguments.clone()).await {
            Ok(content) => {
                debug!(tool = %call.name, result_len = content.len(), "Tool returned");
                ToolOutcome {
                    call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    success: true,
                    content,
                }
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                ToolOutcome {
                    call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    success: false,
                    content: format!("Tool execution failed: {e}"),
                }
            }
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
            arguments["text"]
                .as_str()
                .map(String::from)
                .ok_or_else(|| ToolError::InvalidArguments("missing 'text'".into()))
        }
    }

    struct BadSchemaTool;

    #[async_trait]
    impl Tool for BadSchemaTool {
        fn name(&self) -> &str { "bad" }
        fn description(&self) -> &str { "" }
        fn parameters_schema(&self) -> serde_json::Value { serde_json::json!("nope") }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
            Ok(String::new())
        }
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();
        let err = registry.register(Box::new(EchoTool)).unwrap_err();
        assert!(matches!(err, ToolError::DuplicateName(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_validation() {
        assert!(ToolRegistry::new().validate().is_err());

        let mut good = ToolRegistry::new();
        good.register(Box::new(EchoTool)).unwrap();
        assert!(good.validate().is_ok());

        let mut bad = ToolRegistry::new();
        bad.register(Box::new(BadSchemaTool)).unwrap();
        assert!(matches!(bad.validate(), Err(ToolError::InvalidSchema { .. })));
    }

    #[test]
    fn registry_definitions() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }

    #[tokio::test]
    async fn dispatch_runs_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();

        let call = ToolInvocation::new("call_1", "echo", serde_json::json!({"text": "hello world"}));
        let outcome = registry.dispatch(&call).await;
        assert!(outcome.success);
        assert_eq!(outcome.call_id, "call_1");
        assert_eq!(outcome.content, "hello world");
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_returns_sentinel() {
        let registry = ToolRegistry::new();
        let call = ToolInvocation::new("call_1", "nonexistent", serde_json::json!({}));
        let outcome = registry.dispatch(&call).await;
        assert!(!outcome.success);
        assert_eq!(outcome.content, UNKNOWN_TOOL_MESSAGE);
        assert_eq!(outcome.call_id, "call_1");
    }

    #[tokio::test]
    async fn dispatch_folds_errors_into_text() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();
        let call = ToolInvocation::new("call_2", "echo", serde_json::json!({}));
        let outcome = registry.dispatch(&call).await;
        assert!(!outcome.success);
        assert!(outcome.content.starts_with("Tool execution failed:"));
        assert!(outcome.content.contains("missing 'text'"));
    }
}
