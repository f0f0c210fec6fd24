//! The shared response wire shape.
//!
//! Both backends return OpenAI-shaped chat-completion responses; only their
//! request bodies differ. Response parsing, status mapping, and SSE stream
//! reading live here so each adapter owns request construction only.

use futures::StreamExt;
use serde::Deserialize;
use tracing::{trace, warn};
use worksmith_core::error::ProviderError;
use worksmith_core::message::{Message, MessageToolCall, Role};
use worksmith_core::provider::{ProviderResponse, StreamChunk, ToolCallDelta, Usage};

// --- Non-streaming response types ---

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    pub model: String,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatToolCall {
    pub id: String,
    pub function: ChatFunction,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatFunction {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<ChatUsage> for Usage {
    fn from(u: ChatUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

// --- Streaming SSE types ---

#[derive(Debug, Deserialize)]
pub(crate) struct StreamResponse {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamChoice {
    pub delta: StreamDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<StreamToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamToolCallDelta {
    pub index: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamFunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

// --- Shared handling ---

/// Map a non-success HTTP status to a provider error.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();
    if status == 429 {
        return Err(ProviderError::RateLimited { retry_after_secs: 5 });
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

/// Parse a complete chat response into the engine's provider response.
pub(crate) fn into_provider_response(
    api_response: ChatResponse,
) -> Result<ProviderResponse, ProviderError> {
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyResponse)?;

    let tool_calls: Vec<MessageToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| MessageToolCall {
            id: tc.id,
            name: tc.function.name,
            arguments: tc.function.arguments,
        })
        .collect();

    let message = Message {
        id: uuid::Uuid::new_v4().to_string(),
        role: Role::Assistant,
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
        tool_call_id: None,
        timestamp: chrono::Utc::now(),
    };

    let usage = api_response.usage.map(Usage::from);

    Ok(ProviderResponse {
        message,
        usage,
        model: api_response.model,
    })
}

/// Read an SSE byte stream, forwarding content deltas and index-keyed
/// tool-call fragments as they arrive. The engine accumulates fragments;
/// this reader does not buffer them.
pub(crate) fn spawn_sse_reader(
    provider_name: String,
    response: reqwest::Response,
    tx: tokio::sync::mpsc::Sender<Result<StreamChunk, ProviderError>>,
) {
    tokio::spawn(async move {
        let mut byte_stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk_result) = byte_stream.next().await {
            let bytes = match chunk_result {
                Ok(b) => b,
                Err(e) => {
                    let _ = tx
                        .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                        .await;
                    return;
                }
            };

            buffer.push_str(&String::from_utf8_lossy(&bytes));

            // Process complete lines
            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim_end_matches('\r').to_string();
                buffer = buffer[line_end + 1..].to_string();

                // Skip empty lines and SSE comments
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }

                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                let data = data.trim();

                // "[DONE]" closes the round
                if data == "[DONE]" {
                    let _ = tx
                        .send(Ok(StreamChunk {
                            content: None,
                            tool_calls: Vec::new(),
                            done: true,
                            usage: None,
                        }))
                        .await;
                    return;
                }

                match serde_json::from_str::<StreamResponse>(data) {
                    Ok(stream_resp) => {
                        // Final usage chunk (stream_options) also closes the round
                        if let Some(usage) = stream_resp.usage {
                            let _ = tx
                                .send(Ok(StreamChunk {
                                    content: None,
                                    tool_calls: Vec::new(),
                                    done: true,
                                    usage: Some(usage.into()),
                                }))
                                .await;
                            return;
                        }

                        let Some(choice) = stream_resp.choices.into_iter().next() else {
                            continue;
                        };

                        let tool_calls: Vec<ToolCallDelta> = choice
                            .delta
                            .tool_calls
                            .unwrap_or_default()
                            .into_iter()
                            .map(|tc| ToolCallDelta {
                                index: tc.index,
                                id: tc.id,
                                name: tc.function.as_ref().and_then(|f| f.name.clone()),
                                arguments: tc.function.and_then(|f| f.arguments),
                            })
                            .collect();

                        let has_content =
                            choice.delta.content.as_ref().is_some_and(|c| !c.is_empty());

                        if has_content || !tool_calls.is_empty() || choice.finish_reason.is_some() {
                            let chunk = StreamChunk {
                                content: choice.delta.content,
                                tool_calls,
                                done: false,
                                usage: None,
                            };
                            if tx.send(Ok(chunk)).await.is_err() {
                                return; // receiver dropped
                            }
                        }
                    }
                    Err(e) => {
                        trace!(
                            provider = %provider_name,
                            data = %data,
                            error = %e,
                            "Ignoring unparseable SSE chunk"
                        );
                    }
                }
            }
        }

        // Stream ended without [DONE]
        let _ = tx
            .send(Ok(StreamChunk {
                content: None,
                tool_calls: Vec::new(),
                done: true,
                usage: None,
            }))
            .await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chat_response_with_tool_calls() {
        let data = r#"{
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "createTask", "arguments": "{\"title\":\"x\"}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let parsed: ChatResponse = serde_json::from_str(data).unwrap();
        let response = into_provider_response(parsed).unwrap();
        assert_eq!(response.message.tool_calls.len(), 1);
        assert_eq!(response.message.tool_calls[0].name, "createTask");
        assert_eq!(response.message.content, "");
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn empty_choices_is_an_error() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"model": "gpt-4o", "choices": []}"#).unwrap();
        assert!(matches!(
            into_provider_response(parsed),
            Err(ProviderError::EmptyResponse)
        ));
    }

    #[test]
    fn parse_stream_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].delta.content.as_deref(), Some("Hello"));
        assert!(parsed.choices[0].finish_reason.is_none());
    }

    #[test]
    fn parse_stream_tool_call_delta() {
        let data = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_abc","function":{"name":"searchTasks","arguments":""}}]},"finish_reason":null}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        let tc = &parsed.choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(tc.index, 0);
        assert_eq!(tc.id.as_deref(), Some("call_abc"));
        assert_eq!(
            tc.function.as_ref().unwrap().name.as_deref(),
            Some("searchTasks")
        );
    }

    #[test]
    fn parse_stream_arguments_fragment() {
        // Arguments arrive incrementally; id only in the first delta
        let data = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"title\""}}]},"finish_reason":null}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        let tc = &parsed.choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert!(tc.id.is_none());
        assert_eq!(
            tc.function.as_ref().unwrap().arguments.as_deref(),
            Some("{\"title\"")
        );
    }

    #[test]
    fn parse_stream_usage_chunk() {
        let data = r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn parse_multiple_tool_calls_in_one_delta() {
        let data = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","function":{"name":"searchTasks","arguments":""}},{"index":1,"id":"call_b","function":{"name":"searchTables","arguments":""}}]},"finish_reason":null}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        let tcs = parsed.choices[0].delta.tool_calls.as_ref().unwrap();
        assert_eq!(tcs.len(), 2);
        assert_eq!(tcs[0].index, 0);
        assert_eq!(tcs[1].index, 1);
    }
}
