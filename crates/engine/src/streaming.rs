//! Streaming command execution.
//!
//! Drives the same round handlers as the non-streaming path, but each model
//! response arrives as incremental chunks: text deltas are forwarded to the
//! caller immediately, while tool-call fragments are buffered in a
//! `ToolCallAssembler` until the round's terminal chunk — partial JSON
//! arguments cannot be parsed safely.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use worksmith_core::context::ExecutionContext;
use worksmith_core::message::Message;
use worksmith_core::result::ExecutionResult;

use crate::assembler::ToolCallAssembler;
use crate::event::CommandStreamEvent;
use crate::orchestrator::{CommandEngine, RoundOutcome};

/// Channel capacity for outgoing events; text deltas are small and frequent.
const EVENT_BUFFER: usize = 64;

impl CommandEngine {
    /// Execute a command, yielding incremental events.
    ///
    /// The terminal `Done` event carries the same `ExecutionResult` the
    /// non-streaming entry point returns.
    pub fn execute_streaming(
        self: &Arc<Self>,
        command: &str,
        ctx: &ExecutionContext,
        history: &[Message],
    ) -> mpsc::Receiver<CommandStreamEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let engine = self.clone();
        let command = command.to_string();
        let ctx = ctx.clone();
        let history = history.to_vec();

        tokio::spawn(async move {
            engine.run_streaming(command, ctx, history, tx).await;
        });

        rx
    }

    async fn run_streaming(
        self: Arc<Self>,
        command: String,
        ctx: ExecutionContext,
        history: Vec<Message>,
        tx: mpsc::Sender<CommandStreamEvent>,
    ) {
        // Fast path first, mirroring the non-streaming entry point. Its tool
        // activity is replayed as events so the caller sees the same shape.
        if history.is_empty() {
            if let Some(result) = self
                .fast_path()
                .try_execute(&command, &ctx, self.executor())
                .await
            {
                for record in &result.tool_calls_made {
                    let _ = tx
                        .send(CommandStreamEvent::ToolResult {
                            id: String::new(),
                            name: record.tool.clone(),
                            success: record.result.success,
                            summary: String::new(),
                        })
                        .await;
                }
                let _ = tx.send(CommandStreamEvent::Done { result }).await;
                return;
            }
        }

        let mut state = self.begin_state(&command, &history);

        for iteration in 1..=self.config.limits.max_tool_iterations {
            debug!(iteration, "Streaming round");

            let mut request = self.build_request(&state);
            request.stream = true;

            let mut chunks = match self.provider().stream(request).await {
                Ok(chunks) => chunks,
                Err(e) => {
                    warn!(error = %e, "Provider stream failed to open");
                    let _ = tx
                        .send(CommandStreamEvent::Error {
                            message: e.to_string(),
                        })
                        .await;
                    let _ = tx
                        .send(CommandStreamEvent::Done {
                            result: ExecutionResult::failure(
                                "The language model request failed.",
                                e.to_string(),
                                std::mem::take(&mut state.records),
                            ),
                        })
                        .await;
                    return;
                }
            };

            // Accumulate one round: text forwarded immediately, tool-call
            // fragments buffered until the terminal chunk.
            let mut assembler = ToolCallAssembler::new();
            let mut content = String::new();
            let mut interrupted = None;

            while let Some(chunk) = chunks.recv().await {
                match chunk {
                    Ok(chunk) => {
                        if let Some(text) = chunk.content {
                            if !text.is_empty() {
                                content.push_str(&text);
                                let _ = tx
                                    .send(CommandStreamEvent::Chunk { content: text })
                                    .await;
                            }
                        }
                        for delta in &chunk.tool_calls {
                            assembler.absorb(delta);
                        }
                        if chunk.done {
                            break;
                        }
                    }
                    Err(e) => {
                        interrupted = Some(e);
                        break;
                    }
                }
            }

            if let Some(e) = interrupted {
                warn!(error = %e, "Stream interrupted mid-round");
                let _ = tx
                    .send(CommandStreamEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                let _ = tx
                    .send(CommandStreamEvent::Done {
                        result: ExecutionResult::failure(
                            "The model stream was interrupted.",
                            e.to_string(),
                            std::mem::take(&mut state.records),
                        ),
                    })
                    .await;
                return;
            }

            let outcome = if assembler.is_empty() {
                self.handle_text_round(&mut state, content)
            } else {
                let mut message = Message::assistant(content);
                message.tool_calls = assembler.finish();
                self.handle_tool_round(&mut state, message, &ctx, Some(&tx))
                    .await
            };

            match outcome {
                RoundOutcome::Continue => continue,
                RoundOutcome::Done(result) => {
                    let _ = tx.send(CommandStreamEvent::Done { result }).await;
                    return;
                }
            }
        }

        let result = self.ceiling_result(state);
        let _ = tx.send(CommandStreamEvent::Done { result }).await;
    }
}
