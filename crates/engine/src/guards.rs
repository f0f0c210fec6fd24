//! Per-execution safety trackers for the conversation loop.
//!
//! Each guard is a small state machine, mutated strictly sequentially after
//! a round's dispatch join, in original call order. None of them are shared
//! across executions.

use std::collections::HashSet;

use regex_lite::Regex;
use serde_json::Value;
use worksmith_core::intent::IntentClassification;
use worksmith_core::tool::{ToolCall, ToolCallResult};

/// Detects a model stuck re-issuing the same write.
///
/// Search-like calls are exempt: re-running a search with identical
/// arguments is wasteful but harmless, while re-running a write usually
/// means the model did not register that the write already applied.
#[derive(Debug)]
pub struct RepeatGuard {
    threshold: u32,
    last_signature: Option<String>,
    count: u32,
    last_success: bool,
    last_tool: String,
}

impl RepeatGuard {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            last_signature: None,
            count: 0,
            last_success: false,
            last_tool: String::new(),
        }
    }

    /// Record one executed call. Returns the current repeat count.
    ///
    /// Search-like calls are skipped without clearing the tracked
    /// signature: an interleaved search does not break a write repeat.
    pub fn observe(&mut self, call: &ToolCall, search_like: bool, success: bool) -> u32 {
        if search_like {
            return self.count;
        }
        // serde_json maps are key-sorted, so serialization is canonical
        let signature = format!("{}:{}", call.name, call.arguments);
        if self.last_signature.as_deref() == Some(signature.as_str()) {
            self.count += 1;
        } else {
            self.last_signature = Some(signature);
            self.count = 1;
        }
        self.last_success = success;
        self.last_tool = call.name.clone();
        self.count
    }

    pub fn tripped(&self) -> bool {
        self.count >= self.threshold
    }

    /// Whether the repeated call itself succeeded (partial-success report).
    pub fn last_call_succeeded(&self) -> bool {
        self.last_success
    }

    pub fn repeated_tool(&self) -> &str {
        &self.last_tool
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Tracks consecutive failures of the same tool.
#[derive(Debug)]
pub struct ErrorStreak {
    threshold: u32,
    tool: Option<String>,
    count: u32,
}

impl ErrorStreak {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            tool: None,
            count: 0,
        }
    }

    /// Record one executed call. Returns the current streak length.
    pub fn record(&mut self, tool: &str, success: bool) -> u32 {
        if success {
            self.tool = None;
            self.count = 0;
            return 0;
        }
        if self.tool.as_deref() == Some(tool) {
            self.count += 1;
        } else {
            self.tool = Some(tool.to_string());
            self.count = 1;
        }
        self.count
    }

    pub fn tripped(&self) -> bool {
        self.count >= self.threshold
    }

    pub fn failing_tool(&self) -> &str {
        self.tool.as_deref().unwrap_or_default()
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Tracks task search→update flows so a terminal response cannot silently
/// claim completion while searched ids remain unprocessed.
///
/// Scope is deliberately narrow: only multi-result task searches arm the
/// tracker, and only task updates discharge it.
#[derive(Debug, Default)]
pub struct BatchTracker {
    searched: HashSet<String>,
    updated: HashSet<String>,
}

impl BatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a search result. A multi-result task search replaces the
    /// tracked id set; a single result or a non-task search arms nothing.
    pub fn observe_search(&mut self, tool: &str, result: &ToolCallResult) {
        if tool != "searchTasks" || !result.success {
            return;
        }
        let ids = extract_task_ids(result.data.as_ref());
        if ids.len() > 1 {
            self.searched = ids.into_iter().collect();
            self.updated.clear();
        }
    }

    /// Record an update call against the tracked set.
    pub fn observe_update(&mut self, call: &ToolCall, result: &ToolCallResult) {
        if !result.success {
            return;
        }
        match call.name.as_str() {
            "updateTask" | "deleteTask" => {
                if let Some(id) = call.arguments.get("taskId").and_then(Value::as_str) {
                    self.updated.insert(id.to_string());
                }
            }
            "bulkUpdateTasks" => {
                if let Some(ids) = call.arguments.get("taskIds").and_then(Value::as_array) {
                    for id in ids.iter().filter_map(Value::as_str) {
                        self.updated.insert(id.to_string());
                    }
                }
            }
            _ => {}
        }
    }

    /// Searched ids with no subsequent update. Empty when nothing is armed
    /// or when an update never followed the search (a search-only command
    /// owes no batch).
    pub fn remaining(&self) -> Vec<String> {
        if self.updated.is_empty() {
            return Vec::new();
        }
        let mut remaining: Vec<String> = self
            .searched
            .iter()
            .filter(|id| !self.updated.contains(*id))
            .cloned()
            .collect();
        remaining.sort();
        remaining
    }

    /// Ids harvested from the most recent multi-result search, for
    /// propagation into derived-creation tools.
    pub fn searched_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.searched.iter().cloned().collect();
        ids.sort();
        ids
    }
}

/// Pull task ids out of a search result's recognized list fields.
fn extract_task_ids(data: Option<&Value>) -> Vec<String> {
    let Some(data) = data else {
        return Vec::new();
    };
    for key in ["tasks", "items", "results"] {
        if let Some(list) = data.get(key).and_then(Value::as_array) {
            return list
                .iter()
                .filter_map(|item| item.get("id").and_then(Value::as_str))
                .map(String::from)
                .collect();
        }
    }
    Vec::new()
}

/// Decides whether a command needs more than one write round, suppressing
/// the early-exit-after-write optimization.
///
/// The default is a surface-text heuristic; a false positive only costs one
/// extra model round, never correctness. Replaceable so a more principled
/// planner can take over without touching the orchestrator.
pub trait MultiStepPolicy: Send + Sync {
    fn is_multi_step(&self, command: &str, intent: &IntentClassification) -> bool;
}

/// The default surface-text heuristic.
pub struct HeuristicMultiStep {
    connectors: Regex,
    structural: Regex,
    and_verb: Regex,
}

impl HeuristicMultiStep {
    pub fn new() -> Self {
        Self {
            connectors: sequencing_connectors_re(),
            structural: Regex::new(r"(?i)\b(with|columns?|fields?|rows?)\b")
                .expect("structural pattern"),
            and_verb: and_verb_re(),
        }
    }
}

impl Default for HeuristicMultiStep {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiStepPolicy for HeuristicMultiStep {
    fn is_multi_step(&self, command: &str, intent: &IntentClassification) -> bool {
        intent.actions.len() > 1
            || self.connectors.is_match(command)
            || self.structural.is_match(command)
            || self.and_verb.is_match(command)
    }
}

/// Explicit sequencing words: "then", "also", "after that", "next".
pub(crate) fn sequencing_connectors_re() -> Regex {
    Regex::new(r"(?i)\b(then|also|after that|next)\b").expect("connector pattern")
}

/// An "and <verb>" construction: a second imperative after a conjunction.
pub(crate) fn and_verb_re() -> Regex {
    Regex::new(
        r"(?i)\band\s+(create|add|make|build|update|change|edit|modify|rename|mark|set|move|assign|delete|remove|clear|organize|group|sort|arrange|insert|attach|list|show|search|find)\b",
    )
    .expect("and-verb pattern")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments: args,
        }
    }

    #[test]
    fn repeat_guard_trips_on_identical_write() {
        let mut guard = RepeatGuard::new(2);
        let c = call("updateTask", json!({"taskId": "t1", "fields": {"status": "done"}}));
        guard.observe(&c, false, true);
        assert!(!guard.tripped());
        guard.observe(&c, false, true);
        assert!(guard.tripped());
        assert!(guard.last_call_succeeded());
        assert_eq!(guard.repeated_tool(), "updateTask");
    }

    #[test]
    fn repeat_guard_resets_on_different_arguments() {
        let mut guard = RepeatGuard::new(2);
        guard.observe(&call("updateTask", json!({"taskId": "t1"})), false, true);
        guard.observe(&call("updateTask", json!({"taskId": "t2"})), false, true);
        assert!(!guard.tripped());
    }

    #[test]
    fn repeat_guard_ignores_searches() {
        let mut guard = RepeatGuard::new(2);
        let c = call("searchTasks", json!({"query": "x"}));
        guard.observe(&c, true, true);
        guard.observe(&c, true, true);
        guard.observe(&c, true, true);
        assert!(!guard.tripped());
    }

    #[test]
    fn interleaved_search_does_not_break_write_repeat() {
        let mut guard = RepeatGuard::new(2);
        let write = call("updateTask", json!({"taskId": "t1"}));
        guard.observe(&write, false, true);
        guard.observe(&call("searchTasks", json!({})), true, true);
        guard.observe(&write, false, true);
        assert!(guard.tripped());
    }

    #[test]
    fn error_streak_trips_after_three_same_tool_failures() {
        let mut streak = ErrorStreak::new(3);
        streak.record("createTask", false);
        streak.record("createTask", false);
        assert!(!streak.tripped());
        streak.record("createTask", false);
        assert!(streak.tripped());
        assert_eq!(streak.failing_tool(), "createTask");
    }

    #[test]
    fn error_streak_resets_on_success_or_different_tool() {
        let mut streak = ErrorStreak::new(3);
        streak.record("createTask", false);
        streak.record("createTask", false);
        streak.record("createTask", true);
        assert_eq!(streak.count(), 0);

        streak.record("createTask", false);
        streak.record("updateTask", false);
        assert_eq!(streak.count(), 1);
    }

    #[test]
    fn batch_tracker_reports_remaining_ids() {
        let mut tracker = BatchTracker::new();
        tracker.observe_search(
            "searchTasks",
            &ToolCallResult::ok(json!({"tasks": [
                {"id": "t1"}, {"id": "t2"}, {"id": "t3"}
            ]})),
        );
        tracker.observe_update(
            &call("updateTask", json!({"taskId": "t1", "fields": {}})),
            &ToolCallResult::ok(json!({})),
        );
        assert_eq!(tracker.remaining(), vec!["t2".to_string(), "t3".to_string()]);
    }

    #[test]
    fn batch_tracker_idle_without_updates() {
        let mut tracker = BatchTracker::new();
        tracker.observe_search(
            "searchTasks",
            &ToolCallResult::ok(json!({"tasks": [{"id": "t1"}, {"id": "t2"}]})),
        );
        // Search-only flows owe no batch
        assert!(tracker.remaining().is_empty());
        assert_eq!(tracker.searched_ids().len(), 2);
    }

    #[test]
    fn batch_tracker_ignores_single_result_search() {
        let mut tracker = BatchTracker::new();
        tracker.observe_search(
            "searchTasks",
            &ToolCallResult::ok(json!({"tasks": [{"id": "t1"}]})),
        );
        assert!(tracker.searched_ids().is_empty());
    }

    #[test]
    fn batch_tracker_bulk_update_discharges() {
        let mut tracker = BatchTracker::new();
        tracker.observe_search(
            "searchTasks",
            &ToolCallResult::ok(json!({"tasks": [{"id": "t1"}, {"id": "t2"}]})),
        );
        tracker.observe_update(
            &call("bulkUpdateTasks", json!({"taskIds": ["t1", "t2"], "fields": {}})),
            &ToolCallResult::ok(json!({})),
        );
        assert!(tracker.remaining().is_empty());
    }

    #[test]
    fn multi_step_detects_connectors_and_structure() {
        let policy = HeuristicMultiStep::new();
        let intent = IntentClassification::core_only(0.85, "test");
        assert!(policy.is_multi_step("create a project then add a task", &intent));
        assert!(policy.is_multi_step("a table with columns A and B", &intent));
        assert!(policy.is_multi_step("search tasks and create a board", &intent));
        assert!(!policy.is_multi_step("create a task called Ship", &intent));
        // "and" joining nouns is not a second step
        assert!(!policy.is_multi_step("rename the task to Bread and Butter", &intent));
    }
}
