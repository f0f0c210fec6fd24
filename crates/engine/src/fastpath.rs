//! Deterministic fast-path execution.
//!
//! A narrow class of commands — single create/list actions and the "table
//! with columns" shorthand — can be executed with one or two tool calls
//! directly, bypassing the LLM entirely. Anything with multi-step phrasing
//! is rejected up front: such commands need planning beyond one or two
//! calls.
//!
//! "No match" (`None`) is distinct from a matched-but-failed run: a matched
//! command always produces an `ExecutionResult`, success or not, and never
//! falls through to the full loop.

use regex_lite::Regex;
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;
use worksmith_core::context::ExecutionContext;
use worksmith_core::result::{ExecutionResult, ToolCallRecord};
use worksmith_core::tool::{ToolCall, ToolCallResult, ToolExecutor};

use crate::guards::{and_verb_re, sequencing_connectors_re};

#[derive(Debug, Clone, Copy)]
enum FastAction {
    CreateTask,
    CreateProject,
    CreateTable,
    ListTasks,
    ListProjects,
}

struct SingleAction {
    pattern: Regex,
    action: FastAction,
}

pub struct FastPathMatcher {
    connectors: Regex,
    and_verb: Regex,
    politeness: Regex,
    single_actions: Vec<SingleAction>,
}

impl FastPathMatcher {
    pub fn new() -> Self {
        let single_actions = vec![
            SingleAction {
                pattern: re(r"^(?:list|show|display)\s+(?:all\s+|my\s+)?tasks$"),
                action: FastAction::ListTasks,
            },
            SingleAction {
                pattern: re(r"^(?:list|show|display)\s+(?:all\s+|my\s+)?projects$"),
                action: FastAction::ListProjects,
            },
            SingleAction {
                pattern: re(
                    r#"^(?:create|add|make)\s+(?:a\s+)?(?:new\s+)?task\s+(?:called\s+|named\s+|titled\s+|to\s+)?"?(.+?)"?$"#,
                ),
                action: FastAction::CreateTask,
            },
            SingleAction {
                pattern: re(
                    r#"^(?:create|add|make)\s+(?:a\s+)?(?:new\s+)?project\s+(?:called\s+|named\s+|titled\s+)?"?(.+?)"?$"#,
                ),
                action: FastAction::CreateProject,
            },
            SingleAction {
                pattern: re(
                    r#"^(?:create|add|make)\s+(?:a\s+)?(?:new\s+)?table\s+(?:called\s+|named\s+)?"?(.+?)"?$"#,
                ),
                action: FastAction::CreateTable,
            },
        ];

        Self {
            connectors: sequencing_connectors_re(),
            and_verb: and_verb_re(),
            politeness: re(r"(?:[\s,!.]*\b(?:please|thanks|thank you|pls))+[\s!.?]*$"),
            single_actions,
        }
    }

    /// Attempt deterministic execution. `None` means no pattern matched and
    /// the caller should proceed to the full loop.
    pub async fn try_execute(
        &self,
        command: &str,
        ctx: &ExecutionContext,
        executor: &dyn ToolExecutor,
    ) -> Option<ExecutionResult> {
        let normalized = self.normalize(command);

        // Multi-step phrasing disqualifies the fast path before any
        // pattern matching.
        if self.connectors.is_match(&normalized) || self.and_verb.is_match(&normalized) {
            return None;
        }

        if let Some((title, columns)) = parse_table_shorthand(&normalized) {
            debug!(title = %title, columns = columns.len(), "Fast path: table-with-columns");
            return Some(self.create_table_with_columns(&title, &columns, ctx, executor).await);
        }

        for single in &self.single_actions {
            if let Some(captures) = single.pattern.captures(&normalized) {
                let argument = captures.get(1).map(|m| m.as_str().trim().to_string());
                debug!(action = ?single.action, "Fast path: single action");
                return Some(self.run_single(single.action, argument, ctx, executor).await);
            }
        }

        None
    }

    /// Trim and strip trailing politeness words.
    fn normalize(&self, command: &str) -> String {
        let trimmed = command.trim();
        let stripped = self.politeness.replace(trimmed, "");
        stripped.trim().trim_end_matches(['.', '!', '?']).trim().to_string()
    }

    async fn create_table_with_columns(
        &self,
        title: &str,
        columns: &[String],
        ctx: &ExecutionContext,
        executor: &dyn ToolExecutor,
    ) -> ExecutionResult {
        let mut records = Vec::new();

        let mut create_args = json!({ "title": title });
        if let Some(tab_id) = &ctx.tab_id {
            create_args["tabId"] = json!(tab_id);
        }
        let create = execute_recorded(executor, "createTable", create_args, ctx, &mut records).await;
        if !create.success {
            let reason = create.error.unwrap_or_else(|| "unknown error".into());
            return ExecutionResult::failure(
                format!("Could not create table \"{title}\": {reason}"),
                reason.clone(),
                records,
            );
        }

        let table_id = create
            .data
            .as_ref()
            .and_then(|d| d.get("tableId").or_else(|| d.get("id")))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let fields: Vec<Value> = columns.iter().map(|c| json!({ "name": c })).collect();
        let bulk = execute_recorded(
            executor,
            "bulkCreateFields",
            json!({ "tableId": table_id, "fields": fields }),
            ctx,
            &mut records,
        )
        .await;
        if !bulk.success {
            let reason = bulk.error.unwrap_or_else(|| "unknown error".into());
            return ExecutionResult::failure(
                format!("Created table \"{title}\" but could not add its columns: {reason}"),
                reason.clone(),
                records,
            );
        }

        ExecutionResult::success(
            format!("Created table \"{title}\" with columns {}.", columns.join(", ")),
            records,
        )
    }

    async fn run_single(
        &self,
        action: FastAction,
        argument: Option<String>,
        ctx: &ExecutionContext,
        executor: &dyn ToolExecutor,
    ) -> ExecutionResult {
        let mut records = Vec::new();

        let (tool, args) = match action {
            FastAction::CreateTask => {
                let title = argument.unwrap_or_default();
                let mut args = json!({ "title": title });
                if let Some(project_id) = &ctx.project_id {
                    args["projectId"] = json!(project_id);
                }
                ("createTask", args)
            }
            FastAction::CreateProject => {
                ("createProject", json!({ "name": argument.unwrap_or_default() }))
            }
            FastAction::CreateTable => {
                let mut args = json!({ "title": argument.unwrap_or_default() });
                if let Some(tab_id) = &ctx.tab_id {
                    args["tabId"] = json!(tab_id);
                }
                ("createTable", args)
            }
            FastAction::ListTasks => ("searchTasks", json!({})),
            FastAction::ListProjects => ("searchProjects", json!({})),
        };

        let result = execute_recorded(executor, tool, args.clone(), ctx, &mut records).await;
        if !result.success {
            let reason = result.error.unwrap_or_else(|| "unknown error".into());
            return ExecutionResult::failure(
                format!("The {tool} call failed: {reason}"),
                reason.clone(),
                records,
            );
        }

        let response = match action {
            FastAction::CreateTask => format!("Created task \"{}\".", args["title"].as_str().unwrap_or("")),
            FastAction::CreateProject => format!("Created project \"{}\".", args["name"].as_str().unwrap_or("")),
            FastAction::CreateTable => format!("Created table \"{}\".", args["title"].as_str().unwrap_or("")),
            FastAction::ListTasks => summarize_listing(&result, "task", "No tasks found."),
            FastAction::ListProjects => summarize_listing(&result, "project", "No projects found."),
        };

        ExecutionResult::success(response, records)
    }
}

impl Default for FastPathMatcher {
    fn default() -> Self {
        Self::new()
    }
}

async fn execute_recorded(
    executor: &dyn ToolExecutor,
    tool: &str,
    arguments: Value,
    ctx: &ExecutionContext,
    records: &mut Vec<ToolCallRecord>,
) -> ToolCallResult {
    let call = ToolCall {
        id: format!("fast_{}", Uuid::new_v4()),
        name: tool.into(),
        arguments: arguments.clone(),
    };
    let result = match executor.execute(&call, ctx).await {
        Ok(result) => result,
        Err(e) => ToolCallResult::failure(e.to_string()),
    };
    records.push(ToolCallRecord {
        tool: tool.into(),
        arguments,
        result: result.clone(),
    });
    result
}

fn summarize_listing(result: &ToolCallResult, noun: &str, empty: &str) -> String {
    let plural = format!("{noun}s");
    let count = result
        .data
        .as_ref()
        .and_then(|d| {
            for key in [plural.as_str(), "items", "results"] {
                if let Some(list) = d.get(key).and_then(Value::as_array) {
                    return Some(list.len());
                }
            }
            d.get("count").and_then(Value::as_u64).map(|n| n as usize)
        })
        .unwrap_or(0);

    if count == 0 {
        empty.to_string()
    } else if count == 1 {
        format!("Found 1 {noun}.")
    } else {
        format!("Found {count} {noun}s.")
    }
}

/// Parse the "table with columns" shorthand.
///
/// Accepted phrasings, tried in order:
/// - `create a table named Leads: columns Name / Email / Stage`
/// - `create a table called Budget with columns Item and Cost`
/// - `create a States table with columns Name, Region`
/// - `Leads table: Name, Email, Stage`
/// - `States with Name, Region, and Population`
///
/// Returns the title and the normalized column list; both a title and at
/// least one column are required.
pub fn parse_table_shorthand(text: &str) -> Option<(String, Vec<String>)> {
    let patterns = [
        // table called/named <title> : [columns] <cols>
        re(r#"^(?:create|add|make|build)\s+(?:a\s+|new\s+)?table\s+(?:called|named)\s+"?([^":]+?)"?\s*:\s*(?:columns?|fields?)?\s*(.+)$"#),
        // table called/named <title> with [columns] <cols>
        re(r#"^(?:create|add|make|build)\s+(?:a\s+|new\s+)?table\s+(?:called|named)\s+"?(.+?)"?\s+with\s+(?:the\s+)?(?:columns?|fields?)\s+(.+)$"#),
        // create a <title> table with columns <cols>
        re(r#"^(?:create|add|make|build)\s+(?:a\s+|new\s+)?"?(.+?)"?\s+table\s+with\s+(?:the\s+)?(?:columns?|fields?)\s+(.+)$"#),
        // <title> table: <cols>
        re(r#"^"?(.+?)"?\s+table\s*:\s*(?:columns?|fields?)?\s*(.+)$"#),
        // bare <title> with <cols> — title capped at three words
        re(r#"^([A-Za-z][\w&-]*(?:\s+[A-Za-z][\w&-]*){0,2})\s+with\s+(.+)$"#),
    ];

    for pattern in &patterns {
        let Some(captures) = pattern.captures(text) else {
            continue;
        };
        let title = captures[1].trim().trim_matches('"').to_string();
        if title.is_empty() || starts_with_command_verb(&title) {
            continue;
        }
        let columns = split_columns(captures[2].trim());
        if columns.is_empty() {
            continue;
        }
        return Some((title, columns));
    }
    None
}

fn starts_with_command_verb(title: &str) -> bool {
    let first = title.split_whitespace().next().unwrap_or_default().to_lowercase();
    matches!(
        first.as_str(),
        "create" | "add" | "make" | "build" | "new" | "list" | "show" | "update" | "delete" | "a" | "the"
    )
}

/// Normalize a delimited column list: comma/semicolon/slash-delimited with
/// "and"-joined tails.
fn split_columns(text: &str) -> Vec<String> {
    let text = text.trim();
    let text = strip_prefix_ci(text, "columns").unwrap_or(text);
    let text = strip_prefix_ci(text, "fields").unwrap_or(text);
    let text = text.trim_start_matches(':').trim();

    let segments: Vec<&str> = text.split([',', ';', '/']).collect();
    let last_index = segments.len() - 1;
    let mut columns = Vec::new();

    for (i, segment) in segments.iter().enumerate() {
        let mut segment = segment.trim();
        if let Some(rest) = strip_prefix_ci(segment, "and ") {
            segment = rest.trim();
        }
        if segment.is_empty() {
            continue;
        }
        // The final segment may itself be "and"-joined: "Item and Cost"
        if i == last_index && segment.to_lowercase().contains(" and ") {
            for part in split_on_and(segment) {
                if !part.is_empty() {
                    columns.push(part);
                }
            }
        } else {
            columns.push(segment.trim_matches('"').to_string());
        }
    }

    columns
}

fn split_on_and(segment: &str) -> Vec<String> {
    segment
        .split(" and ")
        .map(|part| part.trim().trim_matches('"').to_string())
        .collect()
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(text[prefix.len()..].trim_start())
    } else {
        None
    }
}

fn re(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){pattern}")).expect("fast path pattern")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bare_title_with_and_tail() {
        let (title, columns) = parse_table_shorthand("States with Name, Region, and Population").unwrap();
        assert_eq!(title, "States");
        assert_eq!(columns, vec!["Name", "Region", "Population"]);
    }

    #[test]
    fn parse_colon_phrasing_with_slashes() {
        let (title, columns) =
            parse_table_shorthand("create a table named Leads: columns Name / Email / Stage").unwrap();
        assert_eq!(title, "Leads");
        assert_eq!(columns, vec!["Name", "Email", "Stage"]);
    }

    #[test]
    fn parse_connector_phrasing() {
        let (title, columns) =
            parse_table_shorthand("create a table called Budget with columns Item and Cost").unwrap();
        assert_eq!(title, "Budget");
        assert_eq!(columns, vec!["Item", "Cost"]);
    }

    #[test]
    fn parse_title_table_colon_phrasing() {
        let (title, columns) = parse_table_shorthand("Leads table: Name, Email, Stage").unwrap();
        assert_eq!(title, "Leads");
        assert_eq!(columns, vec!["Name", "Email", "Stage"]);
    }

    #[test]
    fn parse_adjective_table_phrasing() {
        let (title, columns) =
            parse_table_shorthand("create a States table with columns Name, Region").unwrap();
        assert_eq!(title, "States");
        assert_eq!(columns, vec!["Name", "Region"]);
    }

    #[test]
    fn no_columns_is_no_match() {
        assert!(parse_table_shorthand("create a table called Notes").is_none());
    }

    #[test]
    fn prose_with_is_not_a_column_list_title() {
        // The bare-"with" pattern must not swallow a whole command sentence
        assert!(parse_table_shorthand("create a board with swimlanes").is_none());
    }

    // --- matcher-level tests use a scripted executor ---

    use async_trait::async_trait;
    use std::sync::Mutex;
    use worksmith_core::error::ToolError;

    /// Records calls; responds per tool name.
    struct ScriptedExecutor {
        calls: Mutex<Vec<ToolCall>>,
        responses: fn(&ToolCall) -> ToolCallResult,
    }

    #[async_trait]
    impl ToolExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            call: &ToolCall,
            _ctx: &ExecutionContext,
        ) -> Result<ToolCallResult, ToolError> {
            self.calls.lock().unwrap().push(call.clone());
            Ok((self.responses)(call))
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new("ws_1", "user_1")
    }

    #[tokio::test]
    async fn list_tasks_empty_workspace() {
        let executor = ScriptedExecutor {
            calls: Mutex::new(Vec::new()),
            responses: |_| ToolCallResult::ok(json!({"tasks": []})),
        };
        let matcher = FastPathMatcher::new();
        let result = matcher
            .try_execute("list my tasks", &ctx(), &executor)
            .await
            .expect("fast path should match");

        assert!(result.success);
        assert_eq!(result.response, "No tasks found.");
        assert_eq!(result.tool_calls_made.len(), 1);
        assert_eq!(result.tool_calls_made[0].tool, "searchTasks");
    }

    #[tokio::test]
    async fn budget_table_two_calls_in_order() {
        let executor = ScriptedExecutor {
            calls: Mutex::new(Vec::new()),
            responses: |call| match call.name.as_str() {
                "createTable" => ToolCallResult::ok(json!({"tableId": "tbl_9"})),
                _ => ToolCallResult::ok(json!({"created": 2})),
            },
        };
        let matcher = FastPathMatcher::new();
        let result = matcher
            .try_execute(
                "create a table called Budget with columns Item and Cost",
                &ctx(),
                &executor,
            )
            .await
            .expect("fast path should match");

        assert!(result.success);
        assert_eq!(result.tool_calls_made.len(), 2);
        assert_eq!(result.tool_calls_made[0].tool, "createTable");
        assert_eq!(result.tool_calls_made[1].tool, "bulkCreateFields");
        assert_eq!(result.tool_calls_made[1].arguments["tableId"], "tbl_9");
        assert!(result.response.contains("Budget"));
        assert!(result.response.contains("Item"));
        assert!(result.response.contains("Cost"));
    }

    #[tokio::test]
    async fn politeness_stripped_before_matching() {
        let executor = ScriptedExecutor {
            calls: Mutex::new(Vec::new()),
            responses: |_| ToolCallResult::ok(json!({"tasks": [{"id": "t1"}]})),
        };
        let matcher = FastPathMatcher::new();
        let result = matcher
            .try_execute("show my tasks, please!", &ctx(), &executor)
            .await
            .expect("fast path should match after politeness stripping");
        assert_eq!(result.response, "Found 1 task.");
    }

    #[tokio::test]
    async fn multi_step_command_rejected() {
        let executor = ScriptedExecutor {
            calls: Mutex::new(Vec::new()),
            responses: |_| ToolCallResult::ok(json!({})),
        };
        let matcher = FastPathMatcher::new();
        assert!(
            matcher
                .try_execute("create a task called Ship then assign it to Dana", &ctx(), &executor)
                .await
                .is_none()
        );
        assert!(
            matcher
                .try_execute("list my tasks and create a summary", &ctx(), &executor)
                .await
                .is_none()
        );
        assert!(executor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn matched_failure_is_a_result_not_a_fallthrough() {
        let executor = ScriptedExecutor {
            calls: Mutex::new(Vec::new()),
            responses: |_| ToolCallResult::failure("storage offline"),
        };
        let matcher = FastPathMatcher::new();
        let result = matcher
            .try_execute("create a task called Ship", &ctx(), &executor)
            .await
            .expect("matched command must yield a result");
        assert!(!result.success);
        assert_eq!(result.tool_calls_made.len(), 1);
        assert!(result.error.as_deref().unwrap().contains("storage offline"));
    }

    #[tokio::test]
    async fn create_project_by_name() {
        let executor = ScriptedExecutor {
            calls: Mutex::new(Vec::new()),
            responses: |_| ToolCallResult::ok(json!({"id": "proj_1"})),
        };
        let matcher = FastPathMatcher::new();
        let result = matcher
            .try_execute("create a project called Apollo", &ctx(), &executor)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.tool_calls_made[0].tool, "createProject");
        assert_eq!(result.tool_calls_made[0].arguments["name"], "Apollo");
        assert!(result.response.contains("Apollo"));
    }
}
