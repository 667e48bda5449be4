//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, Azure OpenAI deployments, OpenRouter, Ollama, and
//! any endpoint exposing `/chat/completions` and `/embeddings`.
//!
//! Supports:
//! - Chat completions with tool use / function calling
//! - Embeddings
//! - Image descriptions (`image_url` content parts)
//! - Health checks

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tazmic_core::error::ProviderError;
use tazmic_core::message::{Message, MessageBody, ToolInvocation};
use tazmic_core::provider::*;
use tracing::{debug, warn};

/// How requests are addressed and authenticated.
#[derive(Debug, Clone)]
enum Endpoint {
    /// `{base_url}/chat/completions`, bearer token
    Standard { base_url: String },
    /// `{endpoint}/openai/deployments/{deployment}/...?api-version=`, `api-key` header
    Azure { endpoint: String, api_version: String },
}

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    endpoint: Endpoint,
    api_key: String,
    client: reqwest::Client,
}

/// Requests carry no deadline unless one is set with
/// [`OpenAiCompatProvider::with_timeout`]; callers bound model calls themselves.
fn http_client(timeout: Option<Duration>) -> reqwest::Client {
    let builder = reqwest::Client::builder();
    let builder = match timeout {
        Some(timeout) => builder.timeout(timeout),
        None => builder,
    };
    builder.build().unwrap_or_else(|_| reqwest::Client::new())
}

impl OpenAiCompatProvider {
    /// Create a provider for a plain OpenAI-compatible base URL.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: Endpoint::Standard {
                base_url: base_url.into().trim_end_matches('/').to_string(),
            },
            api_key: api_key.into(),
            client: http_client(None),
        }
    }

    /// Create an Azure OpenAI provider. The request `model` is used as the
    /// deployment name.
    pub fn azure(
        endpoint: impl Into<String>,
        api_version: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: "azure".into(),
            endpoint: Endpoint::Azure {
                endpoint: endpoint.into().trim_end_matches('/').to_string(),
                api_version: api_version.into(),
            },
            api_key: api_key.into(),
            client: http_client(None),
        }
    }

    /// Give every HTTP request this deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(Some(timeout));
        self
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    /// URL for an operation (`chat/completions`, `embeddings`) on `model`.
    fn operation_url(&self, operation: &str, model: &str) -> String {
        match &self.endpoint {
            Endpoint::Standard { base_url } => format!("{base_url}/{operation}"),
            Endpoint::Azure {
                endpoint,
                api_version,
            } => format!(
                "{endpoint}/openai/deployments/{model}/{operation}?api-version={api_version}"
            ),
        }
    }

    fn health_url(&self) -> String {
        match &self.endpoint {
            Endpoint::Standard { base_url } => format!("{base_url}/models"),
            Endpoint::Azure {
                endpoint,
                api_version,
            } => format!("{endpoint}/openai/models?api-version={api_version}"),
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.endpoint {
            Endpoint::Standard { .. } => {
                builder.header("Authorization", format!("Bearer {}", self.api_key))
            }
            Endpoint::Azure { .. } => builder.header("api-key", &self.api_key),
        }
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| match &m.body {
                MessageBody::System { content } => ApiMessage::text("system", content),
                MessageBody::User { content } => ApiMessage::text("user", content),
                MessageBody::Assistant { content } => ApiMessage::text("assistant", content),
                MessageBody::ToolRequest { content, calls } => ApiMessage {
                    role: "assistant".into(),
                    content: (!content.is_empty()).then(|| content.clone()),
                    tool_calls: Some(
                        calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.to_string(),
                                },
                            })
                            .collect(),
                    ),
                    tool_call_id: None,
                },
                MessageBody::ToolResult {
                    call_id, content, ..
                } => ApiMessage {
                    role: "tool".into(),
                    content: Some(content.clone()),
                    tool_calls: None,
                    tool_call_id: Some(call_id.clone()),
                },
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    /// Turn one API choice message into our assistant message.
    fn from_api_message(message: ApiMessage) -> Message {
        let content = message.content.unwrap_or_default();
        let calls: Vec<ToolInvocation> = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let arguments = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|e| {
                    warn!(tool = %tc.function.name, error = %e, "Tool arguments are not valid JSON");
                    serde_json::Value::String(tc.function.arguments.clone())
                });
                ToolInvocation::new(tc.id, tc.function.name, arguments)
            })
            .collect();
        Message::tool_request(content, calls)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }

    async fn post_chat(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<ApiResponse, ProviderError> {
        let response = self
            .authorize(self.client.post(url))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(network_error)?;

        let response = Self::check_status(response).await?;

        response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })
    }

    /// Chat body with one user message: the prompt, then the image as a data URL.
    fn image_description_body(&self, request: &ImageDescriptionRequest) -> serde_json::Value {
        let data_url = format!(
            "data:{};base64,{}",
            request.mime_type,
            STANDARD.encode(&request.image)
        );
        let mut body = serde_json::json!({
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": request.prompt },
                    { "type": "image_url", "image_url": { "url": data_url } },
                ],
            }],
            "stream": false,
        });
        if matches!(self.endpoint, Endpoint::Standard { .. }) {
            body["model"] = serde_json::json!(request.model);
        }
        body
    }
}

fn first_choice(choices: Vec<ApiChoice>) -> Result<ApiChoice, ProviderError> {
    choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::ApiError {
            status_code: 200,
            message: "No choices in response".into(),
        })
}

fn network_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

#[async_trait]
impl tazmic_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = self.operation_url("chat/completions", &request.model);

        let mut body = serde_json::json!({
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });

        if matches!(self.endpoint, Endpoint::Standard { .. }) {
            body["model"] = serde_json::json!(request.model);
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let api_response = self.post_chat(&url, &body).await?;
        let choice = first_choice(api_response.choices)?;

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            message: Self::from_api_message(choice.message),
            usage,
            model: api_response.model.unwrap_or(request.model),
        })
    }

    async fn describe_image(
        &self,
        request: ImageDescriptionRequest,
    ) -> std::result::Result<String, ProviderError> {
        let url = self.operation_url("chat/completions", &request.model);
        let body = self.image_description_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            image_bytes = request.image.len(),
            "Sending image description request"
        );

        let api_response = self.post_chat(&url, &body).await?;
        let choice = first_choice(api_response.choices)?;
        Ok(choice.message.content.unwrap_or_default())
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let response = self
            .authorize(self.client.get(self.health_url()))
            .send()
            .await
            .map_err(network_error)?;

        Ok(response.status().is_success())
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        let url = self.operation_url("embeddings", &request.model);

        let body = serde_json::json!({
            "model": request.model,
            "input": request.inputs,
            "encoding_format": "float",
        });

        debug!(
            provider = %self.name,
            model = %request.model,
            count = request.inputs.len(),
            "Sending embedding request"
        );

        let response = self
            .authorize(self.client.post(&url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let response = Self::check_status(response).await?;

        let mut api_resp: EmbeddingApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse embedding response: {e}"),
            })?;

        api_resp.data.sort_by_key(|d| d.index);
        let embeddings = api_resp.data.into_iter().map(|d| d.embedding).collect();

        let usage = api_resp.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: 0,
            total_tokens: u.total_tokens,
        });

        Ok(EmbeddingResponse {
            embeddings,
            model: api_resp.model.unwrap_or(request.model),
            usage,
        })
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// --- Embedding API types ---

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    model: Option<String>,
    usage: Option<EmbeddingApiUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiUsage {
    prompt_tokens: u32,
    total_tokens: u32,
}
