//! The terminal value of one command execution.

use serde::{Deserialize, Serialize};

use crate::tool::ToolCallResult;

/// One attempted tool invocation, exactly as it happened.
///
/// The record always carries the untruncated result — compaction applies
/// only to the copy echoed back into the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub arguments: serde_json::Value,
    pub result: ToolCallResult,
}

/// The final result of one command execution.
///
/// `tool_calls_made` is the complete, ordered record of every tool
/// invocation attempted — including failed ones — accumulated incrementally
/// across loop rounds and never retracted, so a caller can audit exactly
/// what happened even on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub response: String,
    pub tool_calls_made: Vec<ToolCallRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn success(response: impl Into<String>, tool_calls_made: Vec<ToolCallRecord>) -> Self {
        Self {
            success: true,
            response: response.into(),
            tool_calls_made,
            error: None,
        }
    }

    pub fn failure(
        response: impl Into<String>,
        error: impl Into<String>,
        tool_calls_made: Vec<ToolCallRecord>,
    ) -> Self {
        Self {
            success: false,
            response: response.into(),
            tool_calls_made,
            error: Some(error.into()),
        }
    }
}
