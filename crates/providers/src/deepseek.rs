//! Deepseek provider implementation.
//!
//! Deepseek's chat API returns the shared OpenAI response shape but its
//! request body is constructed differently: typed structs instead of an
//! open-ended JSON object, `max_tokens` always present (the API rejects
//! unbounded generations for tool use), and no `stream_options` block.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;
use worksmith_core::error::ProviderError;
use worksmith_core::message::{Message, Role};
use worksmith_core::provider::{
    Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition,
};

use crate::wire;

const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct DeepseekProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl DeepseekProvider {
    pub fn new(base_url: Option<&str>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url
                .unwrap_or(DEEPSEEK_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    fn build_body(request: &ProviderRequest, stream: bool) -> DeepseekBody {
        DeepseekBody {
            model: request.model.clone(),
            messages: request.messages.iter().map(DeepseekMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            tools: if request.tools.is_empty() {
                None
            } else {
                Some(request.tools.iter().map(DeepseekTool::from).collect())
            },
            stream,
        }
    }

    async fn post(&self, body: &DeepseekBody) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        wire::check_status(response).await
    }
}

#[async_trait]
impl Provider for DeepseekProvider {
    fn name(&self) -> &str {
        "deepseek"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let body = Self::build_body(&request, false);
        debug!(model = %request.model, tools = request.tools.len(), "Sending Deepseek completion request");

        let response = self.post(&body).await?;
        let api_response: wire::ChatResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        wire::into_provider_response(api_response)
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<
        tokio::sync::mpsc::Receiver<Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let body = Self::build_body(&request, true);
        debug!(model = %request.model, "Sending Deepseek streaming request");

        let response = self.post(&body).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(64);
        wire::spawn_sse_reader("deepseek".into(), response, tx);
        Ok(rx)
    }
}

// --- Deepseek request types (internal) ---

#[derive(Debug, Serialize)]
struct DeepseekBody {
    model: String,
    messages: Vec<DeepseekMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<DeepseekTool>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct DeepseekMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<DeepseekToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&Message> for DeepseekMessage {
    fn from(m: &Message) -> Self {
        Self {
            role: match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => "system",
                Role::Tool => "tool",
            },
            content: m.content.clone(),
            tool_calls: if m.tool_calls.is_empty() {
                None
            } else {
                Some(
                    m.tool_calls
                        .iter()
                        .map(|tc| DeepseekToolCall {
                            id: tc.id.clone(),
                            r#type: "function",
                            function: DeepseekFunction {
                                name: tc.name.clone(),
                                arguments: tc.arguments.clone(),
                            },
                        })
                        .collect(),
                )
            },
            tool_call_id: m.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DeepseekToolCall {
    id: String,
    r#type: &'static str,
    function: DeepseekFunction,
}

#[derive(Debug, Serialize)]
struct DeepseekFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct DeepseekTool {
    r#type: &'static str,
    function: DeepseekToolDef,
}

#[derive(Debug, Serialize)]
struct DeepseekToolDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&ToolDefinition> for DeepseekTool {
    fn from(t: &ToolDefinition) -> Self {
        Self {
            r#type: "function",
            function: DeepseekToolDef {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_url() {
        let provider = DeepseekProvider::new(None, "sk-test");
        assert_eq!(provider.base_url, DEEPSEEK_BASE_URL);
        assert_eq!(provider.name(), "deepseek");
    }

    #[test]
    fn max_tokens_always_present() {
        let request = ProviderRequest::new("deepseek-chat", vec![Message::user("hi")]);
        let body = DeepseekProvider::build_body(&request, false);
        assert_eq!(body.max_tokens, DEFAULT_MAX_TOKENS);

        let mut bounded = request.clone();
        bounded.max_tokens = Some(512);
        let body = DeepseekProvider::build_body(&bounded, false);
        assert_eq!(body.max_tokens, 512);
    }

    #[test]
    fn body_serialization_omits_empty_tools() {
        let request = ProviderRequest::new("deepseek-chat", vec![Message::user("hi")]);
        let body = DeepseekProvider::build_body(&request, false);
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("tools").is_none());
        assert!(json.get("stream_options").is_none());
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn tool_definitions_serialize_as_functions() {
        let mut request = ProviderRequest::new("deepseek-chat", vec![Message::user("hi")]);
        request.tools = vec![ToolDefinition {
            name: "createTable".into(),
            description: "Create a table".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let body = DeepseekProvider::build_body(&request, false);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "createTable");
    }
}
