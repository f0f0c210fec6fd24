//! `worksmith run` — execute one command and print the result.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use worksmith_config::EngineConfig;
use worksmith_core::context::ExecutionContext;
use worksmith_core::result::ExecutionResult;
use worksmith_engine::{CommandEngine, CommandStreamEvent};
use worksmith_providers::provider_from_config;

use crate::executor::HttpToolExecutor;

pub struct ContextArgs {
    pub workspace: String,
    pub user: String,
    pub project: Option<String>,
    pub tab: Option<String>,
    pub table: Option<String>,
    pub block: Option<String>,
}

impl ContextArgs {
    fn into_context(self) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(self.workspace, self.user);
        ctx.project_id = self.project;
        ctx.tab_id = self.tab;
        ctx.table_id = self.table;
        ctx.block_id = self.block;
        ctx
    }
}

pub async fn run(
    config_path: Option<&Path>,
    command: &str,
    stream: bool,
    context: ContextArgs,
) -> anyhow::Result<()> {
    let config = EngineConfig::load(config_path)?;
    let provider = provider_from_config(&config)?;
    let executor = Arc::new(HttpToolExecutor::new(&config.executor));
    let engine = Arc::new(CommandEngine::new(provider, executor, config));
    let ctx = context.into_context();

    if stream {
        let mut events = engine.execute_streaming(command, &ctx, &[]);
        while let Some(event) = events.recv().await {
            match event {
                CommandStreamEvent::Chunk { content } => {
                    print!("{content}");
                    use std::io::Write;
                    std::io::stdout().flush().ok();
                }
                CommandStreamEvent::ToolCall { name, input, .. } => {
                    eprintln!("→ {name} {input}");
                }
                CommandStreamEvent::ToolResult { name, success, summary, .. } => {
                    let mark = if success { "✓" } else { "✗" };
                    eprintln!("{mark} {name} {summary}");
                }
                CommandStreamEvent::Error { message } => {
                    eprintln!("error: {message}");
                }
                CommandStreamEvent::Done { result } => {
                    println!();
                    report(&result);
                    if !result.success {
                        std::process::exit(1);
                    }
                }
            }
        }
    } else {
        let result = engine.execute(command, &ctx, &[]).await;
        report(&result);
        if !result.success {
            std::process::exit(1);
        }
    }

    Ok(())
}

fn report(result: &ExecutionResult) {
    debug!(
        tool_calls = result.tool_calls_made.len(),
        success = result.success,
        "Command finished"
    );
    println!("{}", result.response);
    if let Some(error) = &result.error {
        eprintln!("error: {error}");
    }
    for record in &result.tool_calls_made {
        let mark = if record.result.success { "✓" } else { "✗" };
        eprintln!("  {mark} {}", record.tool);
    }
}
