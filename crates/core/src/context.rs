//! The caller-supplied execution context.

use serde::{Deserialize, Serialize};

/// Immutable record describing where a command executes.
///
/// The "current" ids are used to auto-fill tool arguments the model omitted:
/// a command issued while a table is open doesn't need the model to name the
/// table. Lifetime is one command execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub workspace_id: String,
    pub user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,
}

impl ExecutionContext {
    pub fn new(workspace_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            user_id: user_id.into(),
            project_id: None,
            tab_id: None,
            table_id: None,
            block_id: None,
        }
    }

    pub fn with_project(mut self, id: impl Into<String>) -> Self {
        self.project_id = Some(id.into());
        self
    }

    pub fn with_tab(mut self, id: impl Into<String>) -> Self {
        self.tab_id = Some(id.into());
        self
    }

    pub fn with_table(mut self, id: impl Into<String>) -> Self {
        self.table_id = Some(id.into());
        self
    }

    pub fn with_block(mut self, id: impl Into<String>) -> Self {
        self.block_id = Some(id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_current_ids() {
        let ctx = ExecutionContext::new("ws_1", "user_1")
            .with_project("proj_1")
            .with_table("tbl_1");
        assert_eq!(ctx.project_id.as_deref(), Some("proj_1"));
        assert_eq!(ctx.table_id.as_deref(), Some("tbl_1"));
        assert!(ctx.block_id.is_none());
    }
}
