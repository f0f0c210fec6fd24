//! The conversation loop orchestrator.
//!
//! One `CommandEngine` owns everything a command execution needs: the
//! provider, the external tool executor, the catalog, the classifier, the
//! fast path, the selector, and the schema cache. Per-execution state lives
//! in `ExecutionState`, so concurrent commands share nothing mutable except
//! the write-once schema cache.
//!
//! Round shape: build the message list, call the model, parse tool calls,
//! dispatch them concurrently, fold results back in original order, apply
//! the guards, then terminate or continue. The streaming driver in
//! `streaming.rs` feeds the same round handlers from incrementally
//! delivered responses.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures::future::join_all;
use regex_lite::Regex;
use serde_json::{Value, json};
use tokio::sync::mpsc::Sender;
use tracing::{debug, info, warn};
use worksmith_config::EngineConfig;
use worksmith_core::capability::{ToolAction, ToolGroup, ToolKind, ToolSpec};
use worksmith_core::context::ExecutionContext;
use worksmith_core::error::EngineError;
use worksmith_core::intent::IntentClassification;
use worksmith_core::message::{Conversation, Message};
use worksmith_core::provider::{Provider, ProviderRequest};
use worksmith_core::result::{ExecutionResult, ToolCallRecord};
use worksmith_core::tool::{ToolCall, ToolCallResult, ToolExecutor};
use worksmith_toolspec::{ESCALATION_TOOL, ToolCatalog};

use crate::classifier::IntentClassifier;
use crate::compactor::{CompactionCaps, compact_result};
use crate::event::CommandStreamEvent;
use crate::fastpath::FastPathMatcher;
use crate::guards::{BatchTracker, ErrorStreak, HeuristicMultiStep, MultiStepPolicy, RepeatGuard};
use crate::selector::{SchemaCache, SchemaEntry, ToolSelector};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a workspace assistant that executes commands against a \
project-management workspace by calling tools. Prefer searching for entities before modifying them. \
Use the ids returned by searches in subsequent calls. When a command applies to several items, \
handle every item before answering. Answer with a short confirmation once the work is done.";

/// The command orchestration engine.
pub struct CommandEngine {
    provider: Arc<dyn Provider>,
    executor: Arc<dyn ToolExecutor>,
    catalog: Arc<ToolCatalog>,
    classifier: IntentClassifier,
    fast_path: FastPathMatcher,
    selector: ToolSelector,
    schema_cache: SchemaCache,
    multi_step: Box<dyn MultiStepPolicy>,
    caps: CompactionCaps,
    denial_signal: Regex,
    pub(crate) config: EngineConfig,
    system_prompt: String,
}

/// Per-execution state: the conversation, the audit trail, and the guards.
pub(crate) struct ExecutionState {
    command: String,
    pub(crate) intent: IntentClassification,
    pub(crate) schema: Arc<SchemaEntry>,
    pub(crate) conversation: Conversation,
    pub(crate) records: Vec<ToolCallRecord>,
    repeat: RepeatGuard,
    errors: ErrorStreak,
    batch: BatchTracker,
    escalated: bool,
    multi_step: bool,
}

pub(crate) enum RoundOutcome {
    Continue,
    Done(ExecutionResult),
}

impl CommandEngine {
    pub fn new(
        provider: Arc<dyn Provider>,
        executor: Arc<dyn ToolExecutor>,
        config: EngineConfig,
    ) -> Self {
        let catalog = Arc::new(ToolCatalog::new());
        let selector = ToolSelector::new(catalog.clone(), config.toggles.trim_tools_to_intent);
        let caps = CompactionCaps::from_limits(&config.limits);
        Self {
            provider,
            executor,
            catalog,
            classifier: IntentClassifier::new(),
            fast_path: FastPathMatcher::new(),
            selector,
            schema_cache: SchemaCache::new(),
            multi_step: Box::new(HeuristicMultiStep::new()),
            caps,
            denial_signal: Regex::new(
                r"(?i)\b(don't|do not|cannot|can't|unable to)\b[^.]*\b(access|tool|tools|capabilit|permission)",
            )
            .expect("denial pattern"),
            config,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
        }
    }

    /// Override the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Replace the multi-step heuristic with another policy.
    pub fn with_multi_step_policy(mut self, policy: Box<dyn MultiStepPolicy>) -> Self {
        self.multi_step = policy;
        self
    }

    /// The engine-owned schema cache (exposed for inspection).
    pub fn schema_cache(&self) -> &SchemaCache {
        &self.schema_cache
    }

    pub(crate) fn executor(&self) -> &dyn ToolExecutor {
        self.executor.as_ref()
    }

    pub(crate) fn fast_path(&self) -> &FastPathMatcher {
        &self.fast_path
    }

    pub(crate) fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    /// Execute a command and return the final result.
    ///
    /// All terminal failures are encoded in the result — `success = false`
    /// with a human-readable `response` and an `error` — and the partial
    /// `tool_calls_made` audit trail is always preserved.
    pub async fn execute(
        &self,
        command: &str,
        ctx: &ExecutionContext,
        history: &[Message],
    ) -> ExecutionResult {
        info!(workspace = %ctx.workspace_id, "Executing command");

        // Deterministic fast path: only for fresh commands, never when a
        // prior conversation could change the meaning.
        if history.is_empty() {
            if let Some(result) = self
                .fast_path
                .try_execute(command, ctx, self.executor.as_ref())
                .await
            {
                debug!(success = result.success, "Fast path handled command");
                return result;
            }
        }

        let mut state = self.begin_state(command, history);

        for iteration in 1..=self.config.limits.max_tool_iterations {
            debug!(
                iteration,
                tools = state.schema.definitions.len(),
                "Conversation round"
            );

            let request = self.build_request(&state);
            let response = match self.provider.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "Provider call failed");
                    return ExecutionResult::failure(
                        "The language model request failed.",
                        e.to_string(),
                        state.records,
                    );
                }
            };

            let outcome = if response.message.tool_calls.is_empty() {
                self.handle_text_round(&mut state, response.message.content)
            } else {
                self.handle_tool_round(&mut state, response.message, ctx, None)
                    .await
            };

            match outcome {
                RoundOutcome::Continue => continue,
                RoundOutcome::Done(result) => return result,
            }
        }

        self.ceiling_result(state)
    }

    // --- shared round machinery (also driven by streaming.rs) ---

    pub(crate) fn begin_state(&self, command: &str, history: &[Message]) -> ExecutionState {
        let intent = self.classifier.classify(command);
        debug!(
            groups = ?intent.tool_groups,
            confidence = intent.confidence,
            reasoning = %intent.reasoning,
            "Classified intent"
        );
        let specs = self.selector.select(&intent, command);
        let schema = self.schema_cache.get_or_build(&specs);
        let multi_step = self.multi_step.is_multi_step(command, &intent);

        ExecutionState {
            command: command.to_string(),
            intent,
            schema,
            conversation: Conversation::for_command(&self.system_prompt, history, command),
            records: Vec::new(),
            repeat: RepeatGuard::new(self.config.limits.repeat_call_threshold),
            errors: ErrorStreak::new(self.config.limits.consecutive_error_threshold),
            batch: BatchTracker::new(),
            escalated: false,
            multi_step,
        }
    }

    pub(crate) fn build_request(&self, state: &ExecutionState) -> ProviderRequest {
        // Once a tool result is present the next call is more likely the
        // final natural-language answer, which needs the larger budget.
        let budget = if state.conversation.has_tool_results() {
            self.config.limits.final_round_max_tokens
        } else {
            self.config.limits.tool_round_max_tokens
        };

        let mut request = ProviderRequest::new(
            &self.config.provider.model,
            state.conversation.messages.clone(),
        );
        request.temperature = self.config.provider.temperature;
        request.max_tokens = Some(budget);
        request.tools = state.schema.definitions.clone();
        request.parallel_tool_calls = true;
        request
    }

    /// A model response with no tool calls: terminal success, unless the
    /// batch tracker or a missing-access signal forces continuation.
    pub(crate) fn handle_text_round(
        &self,
        state: &mut ExecutionState,
        content: String,
    ) -> RoundOutcome {
        let remaining = state.batch.remaining();
        if !remaining.is_empty() {
            warn!(
                remaining = remaining.len(),
                "Terminal response while batch items remain unprocessed"
            );
            state.conversation.push(Message::assistant(&content));
            state.conversation.push(Message::user(format!(
                "You missed {} item(s): task ids {} from your search were never updated. \
Continue until every one is handled.",
                remaining.len(),
                remaining.join(", ")
            )));
            return RoundOutcome::Continue;
        }

        if !state.escalated {
            if let Some(groups) = self.detect_access_signal(&content, &state.intent) {
                info!(?groups, "Capability escalation from content signal");
                let granted = self.apply_escalation(state, groups);
                state.conversation.push(Message::assistant(&content));
                state.conversation.push(Message::user(format!(
                    "You now have the {granted} tools. Continue with the original command."
                )));
                return RoundOutcome::Continue;
            }
        }

        let response = if content.trim().is_empty() {
            self.summarize_records(&state.records)
        } else {
            content
        };
        RoundOutcome::Done(ExecutionResult::success(
            response,
            std::mem::take(&mut state.records),
        ))
    }

    /// A model response with tool calls: dispatch concurrently, fold back in
    /// original order, apply the guards, then decide.
    pub(crate) async fn handle_tool_round(
        &self,
        state: &mut ExecutionState,
        message: Message,
        ctx: &ExecutionContext,
        events: Option<&Sender<CommandStreamEvent>>,
    ) -> RoundOutcome {
        let raw_calls = message.tool_calls.clone();
        state.conversation.push(message);

        let harvested = state.batch.searched_ids();
        let calls: Vec<ToolCall> = raw_calls
            .iter()
            .map(|tc| {
                let mut call = ToolCall::from_message(tc);
                self.prefill_arguments(&mut call, ctx, &harvested);
                call
            })
            .collect();

        // The escalation tool is handled by the engine; everything else is
        // dispatched to the executor concurrently.
        let dispatch: Vec<(usize, ToolCall)> = calls
            .iter()
            .enumerate()
            .filter(|(_, call)| call.name != ESCALATION_TOOL)
            .map(|(i, call)| (i, call.clone()))
            .collect();

        if let Some(tx) = events {
            for (_, call) in &dispatch {
                let _ = tx
                    .send(CommandStreamEvent::ToolCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input: call.arguments.clone(),
                    })
                    .await;
            }
        }

        debug!(calls = dispatch.len(), "Dispatching tool calls");
        let results = join_all(
            dispatch
                .iter()
                .map(|(_, call)| self.executor.execute(call, ctx)),
        )
        .await;

        let mut by_index: HashMap<usize, ToolCallResult> = dispatch
            .iter()
            .zip(results)
            .map(|((i, _), outcome)| {
                let result = match outcome {
                    Ok(result) => result,
                    Err(e) => ToolCallResult::failure(e.to_string()),
                };
                (*i, result)
            })
            .collect();

        // Fold results back strictly sequentially, in the original call
        // order, so conversation contents and tracker state are
        // deterministic even though execution order is not.
        let round_start = state.records.len();
        let mut round_failed = false;
        let mut round_writes = 0usize;
        let mut round_reads = 0usize;

        for (index, call) in calls.iter().enumerate() {
            if call.name == ESCALATION_TOOL {
                let reply = self.handle_escalation_call(state, call);
                state.conversation.push(Message::tool_result(&call.id, &reply));
                state.records.push(ToolCallRecord {
                    tool: call.name.clone(),
                    arguments: call.arguments.clone(),
                    result: ToolCallResult::ok(json!({ "reply": reply })),
                });
                continue;
            }

            let result = by_index.remove(&index).expect("dispatched call result");

            // The audit record always carries the full, untruncated result.
            state.records.push(ToolCallRecord {
                tool: call.name.clone(),
                arguments: call.arguments.clone(),
                result: result.clone(),
            });

            let search_like = self.is_search_like(&call.name);
            if search_like {
                round_reads += 1;
            } else {
                round_writes += 1;
            }

            state.repeat.observe(call, search_like, result.success);
            state.errors.record(&call.name, result.success);
            state.batch.observe_search(&call.name, &result);
            state.batch.observe_update(call, &result);
            if !result.success {
                round_failed = true;
                debug!(tool = %call.name, error = ?result.error, "Tool call failed");
            }

            if let Some(tx) = events {
                let _ = tx
                    .send(CommandStreamEvent::ToolResult {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        success: result.success,
                        summary: self.summarize_record(&state.records[state.records.len() - 1]),
                    })
                    .await;
            }

            let payload = if self.config.toggles.compact_tool_results {
                compact_result(&result, &self.caps)
            } else {
                serde_json::to_value(&result).unwrap_or_else(|_| json!({ "success": result.success }))
            };
            state
                .conversation
                .push(Message::tool_result(&call.id, payload.to_string()));
        }

        // Repeat-loop guard: a model stuck re-issuing an already-applied
        // write terminates here, not at the iteration ceiling.
        if state.repeat.tripped() {
            let tool = state.repeat.repeated_tool().to_string();
            let count = state.repeat.count();
            warn!(tool = %tool, count, "Repeated tool call, stopping");
            let records = std::mem::take(&mut state.records);
            return RoundOutcome::Done(if state.repeat.last_call_succeeded() {
                ExecutionResult::success(
                    format!(
                        "Stopped: {tool} was about to repeat with identical arguments; \
the change has already been applied."
                    ),
                    records,
                )
            } else {
                ExecutionResult::failure(
                    format!("Stopped repeating a failing {tool} call."),
                    EngineError::RepeatedCall { tool, count }.to_string(),
                    records,
                )
            });
        }

        // Consecutive-error guard.
        if state.errors.tripped() {
            let tool = state.errors.failing_tool().to_string();
            let count = state.errors.count();
            warn!(tool = %tool, count, "Consecutive tool failures, stopping");
            return RoundOutcome::Done(ExecutionResult::failure(
                format!("The {tool} tool failed {count} times in a row; giving up."),
                EngineError::ConsecutiveFailures { tool, count }.to_string(),
                std::mem::take(&mut state.records),
            ));
        }

        // Early exits: skip the redundant final model round when this round
        // already tells the whole story. Both are gated on zero failures.
        if self.config.toggles.skip_final_summary_round && !round_failed {
            let round = &state.records[round_start..];

            if round_writes > 0 && !state.multi_step && state.batch.remaining().is_empty() {
                debug!("Early exit after successful write round");
                let response = self.summarize_records(round);
                return RoundOutcome::Done(ExecutionResult::success(
                    response,
                    std::mem::take(&mut state.records),
                ));
            }

            if round_writes == 0 && round_reads > 0 && !state.intent.has_write_action() {
                debug!("Early exit after read-only round");
                let response = self.summarize_records(round);
                return RoundOutcome::Done(ExecutionResult::success(
                    response,
                    std::mem::take(&mut state.records),
                ));
            }
        }

        RoundOutcome::Continue
    }

    pub(crate) fn ceiling_result(&self, state: ExecutionState) -> ExecutionResult {
        let max = self.config.limits.max_tool_iterations;
        warn!(max, "Iteration ceiling reached");
        ExecutionResult::failure(
            "I could not finish the command within the allowed number of tool rounds. \
Everything attempted so far is recorded.",
            EngineError::IterationCeiling(max).to_string(),
            state.records,
        )
    }

    // --- helpers ---

    fn is_search_like(&self, tool: &str) -> bool {
        match self.catalog.get(tool) {
            Some(spec) => spec.kind == ToolKind::ReadOnly,
            // Unknown tools are treated as writes: the conservative reading
            // for both the repeat guard and the early exits.
            None => false,
        }
    }

    /// Auto-fill "current context" ids the model omitted, and propagate ids
    /// harvested from a prior search into derived-creation tools.
    fn prefill_arguments(&self, call: &mut ToolCall, ctx: &ExecutionContext, harvested: &[String]) {
        let Some(spec) = self.catalog.get(&call.name) else {
            return;
        };
        let Some(props) = spec.parameters.get("properties").and_then(Value::as_object) else {
            return;
        };
        let props = props.clone();
        let Some(args) = call.arguments.as_object_mut() else {
            return;
        };

        for (field, source) in [
            ("tableId", &ctx.table_id),
            ("blockId", &ctx.block_id),
            ("tabId", &ctx.tab_id),
        ] {
            if props.contains_key(field) && !args.contains_key(field) {
                if let Some(value) = source {
                    args.insert(field.into(), json!(value));
                }
            }
        }

        // A derived creation (e.g. a board built from "these tasks") may
        // omit the ids the model already selected via its prior search.
        if spec.action == Some(ToolAction::Organize) && props.contains_key("taskIds") {
            let missing = !args
                .get("taskIds")
                .and_then(Value::as_array)
                .is_some_and(|ids| !ids.is_empty());
            if missing && !harvested.is_empty() {
                args.insert("taskIds".into(), json!(harvested));
            }
        }
    }

    /// An explicit escalation call. Fires at most once per execution.
    fn handle_escalation_call(&self, state: &mut ExecutionState, call: &ToolCall) -> String {
        if state.escalated {
            return "Capabilities were already expanded once for this command; \
use the tools you now have.".into();
        }

        let requested: Vec<ToolGroup> = call
            .arguments
            .get("groups")
            .and_then(Value::as_array)
            .map(|groups| {
                groups
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(ToolGroup::from_keyword)
                    .collect()
            })
            .unwrap_or_default();

        if requested.is_empty() {
            return "No recognizable tool groups were requested. Available groups: \
task, table, project, timeline, block, doc, file, client, commerce.".into();
        }

        info!(?requested, "Capability escalation requested by tool call");
        let granted = self.apply_escalation(state, requested);
        format!("Granted tool groups: {granted}. The corresponding tools are now available.")
    }

    /// Expand the active group set, regenerate the schema, and mark the
    /// handshake as used. Returns the display list of granted groups.
    fn apply_escalation(&self, state: &mut ExecutionState, groups: Vec<ToolGroup>) -> String {
        let display = groups
            .iter()
            .map(ToolGroup::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        state.intent = state.intent.merge_groups(groups);
        let specs = self.selector.select(&state.intent, &state.command);
        state.schema = self.schema_cache.get_or_build(&specs);
        state.escalated = true;
        display
    }

    /// A natural-language "I don't have access" signal that names a known
    /// tool or entity. Both halves are required so a stray apology cannot
    /// burn the once-per-execution handshake.
    fn detect_access_signal(
        &self,
        content: &str,
        intent: &IntentClassification,
    ) -> Option<Vec<ToolGroup>> {
        if !self.denial_signal.is_match(content) {
            return None;
        }
        let lowered = content.to_lowercase();
        let mut groups: BTreeSet<ToolGroup> = BTreeSet::new();

        for spec in self.catalog.all() {
            if spec.group != ToolGroup::Core && lowered.contains(&spec.name.to_lowercase()) {
                groups.insert(spec.group);
            }
        }
        for group in ToolGroup::NON_CORE {
            if let Some(entity) = group.primary_entity() {
                if lowered.contains(entity.keyword()) {
                    groups.insert(group);
                }
            }
        }

        groups.retain(|g| !intent.tool_groups.contains(g));
        if groups.is_empty() {
            None
        } else {
            Some(groups.into_iter().collect())
        }
    }

    /// Human-readable summary of a set of records, for early exits and
    /// stream events.
    fn summarize_records(&self, records: &[ToolCallRecord]) -> String {
        let parts: Vec<String> = records
            .iter()
            .filter(|r| r.tool != ESCALATION_TOOL)
            .map(|r| self.summarize_record(r))
            .collect();
        if parts.is_empty() {
            "Done.".into()
        } else {
            parts.join(" ")
        }
    }

    fn summarize_record(&self, record: &ToolCallRecord) -> String {
        let spec = self.catalog.get(&record.tool);
        let entity = spec
            .and_then(|s| s.entity)
            .map(|e| e.keyword())
            .unwrap_or("item");

        if !record.result.success {
            let reason = record.result.error.as_deref().unwrap_or("unknown error");
            return format!("{} failed: {reason}.", record.tool);
        }

        match spec.and_then(|s| s.action) {
            Some(ToolAction::Search) => match result_count(&record.result) {
                Some(0) => format!("No {entity}s found."),
                Some(1) => format!("Found 1 {entity}."),
                Some(n) => format!("Found {n} {entity}s."),
                None => format!("Search {} completed.", record.tool),
            },
            Some(ToolAction::Create) => {
                let name = record
                    .arguments
                    .get("title")
                    .or_else(|| record.arguments.get("name"))
                    .and_then(Value::as_str);
                match name {
                    Some(name) => format!("Created {entity} \"{name}\"."),
                    None => format!("Created {entity}."),
                }
            }
            Some(ToolAction::Update) => {
                let bulk = record
                    .arguments
                    .get("taskIds")
                    .and_then(Value::as_array)
                    .map(Vec::len);
                match bulk {
                    Some(n) => format!("Updated {n} {entity}s."),
                    None => format!("Updated {entity}."),
                }
            }
            Some(ToolAction::Delete) => format!("Deleted {entity}."),
            Some(ToolAction::Organize) => format!("Organized {entity}s."),
            None => format!("{} completed.", record.tool),
        }
    }
}

/// Recognized count fields for human-readable summaries.
fn result_count(result: &ToolCallResult) -> Option<usize> {
    let data = result.data.as_ref()?;
    for key in ["tasks", "items", "results", "projects", "tables", "rows"] {
        if let Some(list) = data.get(key).and_then(Value::as_array) {
            return Some(list.len());
        }
    }
    data.get("count").and_then(Value::as_u64).map(|n| n as usize)
}

/// Expose the selected tool specs for one classification — used by tests to
/// assert fast-path/classifier consistency without running the loop.
impl CommandEngine {
    pub fn selected_tools(&self, command: &str) -> Vec<ToolSpec> {
        let intent = self.classifier.classify(command);
        self.selector.select(&intent, command)
    }
}
