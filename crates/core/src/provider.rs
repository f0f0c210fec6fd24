//! Provider trait — the abstraction over LLM backends.
//!
//! A Provider knows how to send a conversation to an LLM and get a response
//! back, either as a complete message or as a stream of chunks.
//!
//! Implementations: OpenAI-shaped, Deepseek-shaped.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{Message, MessageToolCall};

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o", "deepseek-chat")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature — fixed low for deterministic command execution
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Whether the model may issue multiple tool calls per turn
    #[serde(default)]
    pub parallel_tool_calls: bool,

    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
}

fn default_temperature() -> f32 {
    0.1
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
            tools: Vec::new(),
            parallel_tool_calls: true,
            stream: false,
        }
    }
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single chunk in a streaming response.
///
/// Content deltas are forwarded to the caller as they arrive; tool-call
/// deltas are index-keyed fragments that the engine accumulates until the
/// terminal chunk, because partial JSON arguments cannot be parsed safely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: Option<String>,

    /// Tool call fragments, keyed by per-round index
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallDelta>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// An incremental fragment of one tool call.
///
/// `id` and `name` arrive once (usually in the first fragment for an index);
/// `arguments` arrives as string pieces to be concatenated in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl ToolCallDelta {
    /// A delta carrying a complete tool call at the given index.
    pub fn complete(index: u32, tc: &MessageToolCall) -> Self {
        Self {
            index,
            id: Some(tc.id.clone()),
            name: Some(tc.name.clone()),
            arguments: Some(tc.arguments.clone()),
        }
    }
}

/// The core Provider trait.
///
/// Every LLM backend implements this trait. The engine calls `complete()` or
/// `stream()` without knowing which provider is being used.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "deepseek").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Send a request and get a stream of response chunks.
    ///
    /// Default implementation calls `complete()` and wraps the result as a
    /// single terminal chunk.
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let response = self.complete(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let tool_calls = response
            .message
            .tool_calls
            .iter()
            .enumerate()
            .map(|(i, tc)| ToolCallDelta::complete(i as u32, tc))
            .collect();
        let _ = tx
            .send(Ok(StreamChunk {
                content: Some(response.message.content),
                tool_calls,
                done: true,
                usage: response.usage,
            }))
            .await;
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_to_low_temperature() {
        let req = ProviderRequest::new("gpt-4o", vec![]);
        assert!(req.temperature <= 0.2);
        assert!(req.parallel_tool_calls);
        assert!(!req.stream);
    }

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "searchTasks".into(),
            description: "Search tasks in the workspace".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search text" }
                }
            }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("searchTasks"));
        assert!(json.contains("query"));
    }

    struct OneShotProvider;

    #[async_trait]
    impl Provider for OneShotProvider {
        fn name(&self) -> &str {
            "oneshot"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            let mut message = Message::assistant("done");
            message.tool_calls = vec![MessageToolCall {
                id: "call_1".into(),
                name: "searchTasks".into(),
                arguments: "{}".into(),
            }];
            Ok(ProviderResponse {
                message,
                usage: None,
                model: "test".into(),
            })
        }
    }

    #[tokio::test]
    async fn default_stream_wraps_complete() {
        let provider = OneShotProvider;
        let mut rx = provider
            .stream(ProviderRequest::new("test", vec![]))
            .await
            .unwrap();
        let chunk = rx.recv().await.unwrap().unwrap();
        assert!(chunk.done);
        assert_eq!(chunk.content.as_deref(), Some("done"));
        assert_eq!(chunk.tool_calls.len(), 1);
        assert_eq!(chunk.tool_calls[0].name.as_deref(), Some("searchTasks"));
    }
}
