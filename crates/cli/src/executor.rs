//! HTTP forwarding tool executor.
//!
//! The engine is oblivious to how tools are implemented; the CLI forwards
//! each call to the configured executor service, which owns the actual data
//! store operations.

use async_trait::async_trait;
use worksmith_config::ExecutorConfig;
use worksmith_core::context::ExecutionContext;
use worksmith_core::error::ToolError;
use worksmith_core::tool::{ToolCall, ToolCallResult, ToolExecutor};

pub struct HttpToolExecutor {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpToolExecutor {
    pub fn new(config: &ExecutorConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            client,
        }
    }
}

#[async_trait]
impl ToolExecutor for HttpToolExecutor {
    async fn execute(
        &self,
        call: &ToolCall,
        ctx: &ExecutionContext,
    ) -> Result<ToolCallResult, ToolError> {
        let url = format!("{}/tools/execute", self.base_url);
        let body = serde_json::json!({
            "name": call.name,
            "arguments": call.arguments,
            "context": ctx,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::ExecutorUnreachable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ToolError::NotFound(call.name.clone()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::ExecutionFailed {
                tool_name: call.name.clone(),
                reason: format!("executor returned {status}: {body}"),
            });
        }

        response
            .json::<ToolCallResult>()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: call.name.clone(),
                reason: format!("unparseable executor response: {e}"),
            })
    }
}
