//! Caller-facing streaming events.
//!
//! `CommandStreamEvent` is the incremental surface of the streaming entry
//! point: partial text is forwarded as it arrives, tool activity is
//! announced around each dispatch, and the terminal event carries the same
//! `ExecutionResult` the non-streaming entry point returns.

use serde::{Deserialize, Serialize};
use worksmith_core::result::ExecutionResult;

/// Events yielded during streaming command execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandStreamEvent {
    /// Partial text token from the LLM.
    Chunk { content: String },

    /// The engine is dispatching a tool call.
    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Tool execution completed.
    ToolResult {
        id: String,
        name: String,
        success: bool,
        summary: String,
    },

    /// Execution is complete — the terminal result.
    Done { result: ExecutionResult },

    /// An error occurred mid-stream.
    Error { message: String },
}

impl CommandStreamEvent {
    /// Event name for wire protocols (SSE event field, logging).
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_serialization() {
        let event = CommandStreamEvent::Chunk {
            content: "Creating".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"chunk""#));
        assert!(json.contains(r#""content":"Creating""#));
    }

    #[test]
    fn done_carries_result() {
        let event = CommandStreamEvent::Done {
            result: ExecutionResult::success("done", vec![]),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"done""#));
        assert!(json.contains(r#""success":true"#));
    }

    #[test]
    fn event_type_names() {
        assert_eq!(
            CommandStreamEvent::Error { message: "x".into() }.event_type(),
            "error"
        );
        assert_eq!(
            CommandStreamEvent::ToolCall {
                id: "a".into(),
                name: "b".into(),
                input: serde_json::Value::Null
            }
            .event_type(),
            "tool_call"
        );
    }

    #[test]
    fn deserialization_roundtrip() {
        let json = r#"{"type":"tool_result","id":"c1","name":"createTask","success":true,"summary":"ok"}"#;
        let event: CommandStreamEvent = serde_json::from_str(json).unwrap();
        match event {
            CommandStreamEvent::ToolResult { name, success, .. } => {
                assert_eq!(name, "createTask");
                assert!(success);
            }
            _ => panic!("Wrong variant"),
        }
    }
}
