//! The tool execution contract.
//!
//! The engine never knows how a tool is implemented. It hands a `ToolCall`
//! and the `ExecutionContext` to a `ToolExecutor` and gets a
//! `ToolCallResult` back. The concrete catalog (task/table/project/timeline
//! CRUD against the data store) lives behind that trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::error::ToolError;
use crate::message::MessageToolCall;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Build a `ToolCall` from the model's raw tool-call message.
    ///
    /// The argument text is untrusted: invalid JSON degrades to an empty
    /// object rather than failing the round. The tool itself is expected to
    /// reject bad arguments with a clear validation error.
    pub fn from_message(tc: &MessageToolCall) -> Self {
        let parsed: Option<serde_json::Value> = serde_json::from_str(&tc.arguments).ok();
        let arguments = match parsed {
            Some(value @ serde_json::Value::Object(_)) => value,
            _ => serde_json::Value::Object(serde_json::Map::new()),
        };
        Self {
            id: tc.id.clone(),
            name: tc.name.clone(),
            arguments,
        }
    }
}

/// The result of a tool execution.
///
/// Treated as opaque data by the engine except for size bounding and a small
/// set of recognized count fields used for human-readable summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Whether the tool executed successfully
    pub success: bool,

    /// Structured output data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Error description; always present when success is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Optional hint for the model on how to recover
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ToolCallResult {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            hint: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// The single contract to the external tool catalog.
///
/// Invoked once per requested tool call. Implementations forward to the data
/// store however they like (HTTP, in-process, mock).
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(
        &self,
        call: &ToolCall,
        ctx: &ExecutionContext,
    ) -> std::result::Result<ToolCallResult, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_message_parses_valid_arguments() {
        let tc = MessageToolCall {
            id: "call_1".into(),
            name: "createTask".into(),
            arguments: r#"{"title": "Ship it"}"#.into(),
        };
        let call = ToolCall::from_message(&tc);
        assert_eq!(call.arguments["title"], "Ship it");
    }

    #[test]
    fn from_message_degrades_invalid_arguments_to_empty_object() {
        let tc = MessageToolCall {
            id: "call_1".into(),
            name: "createTask".into(),
            arguments: r#"{"title": "trunc"#.into(),
        };
        let call = ToolCall::from_message(&tc);
        assert!(call.arguments.is_object());
        assert_eq!(call.arguments.as_object().unwrap().len(), 0);
    }

    #[test]
    fn from_message_coerces_non_object_to_empty() {
        let tc = MessageToolCall {
            id: "call_1".into(),
            name: "createTask".into(),
            arguments: r#"["not", "an", "object"]"#.into(),
        };
        let call = ToolCall::from_message(&tc);
        assert!(call.arguments.is_object());
    }

    #[test]
    fn failure_carries_error() {
        let res = ToolCallResult::failure("not found");
        assert!(!res.success);
        assert_eq!(res.error.as_deref(), Some("not found"));
    }

    #[test]
    fn hint_is_attachable() {
        let res = ToolCallResult::failure("missing tableId").with_hint("call searchTables first");
        assert_eq!(res.hint.as_deref(), Some("call searchTables first"));
    }
}
