//! Tool capability selection and the schema cache.
//!
//! Given a classification and the raw command text, compute the minimal
//! tool set to expose to the model this turn. Narrowing trades recall for
//! schema-payload size; it must never remove the capability-escalation tool,
//! and the core search/control tools are only trimmed under a confidently
//! narrow classification.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;
use worksmith_core::capability::{EntityKind, ToolAction, ToolGroup, ToolKind, ToolSpec};
use worksmith_core::intent::IntentClassification;
use worksmith_core::provider::ToolDefinition;
use worksmith_toolspec::{ESCALATION_TOOL, ToolCatalog};

/// Classification confidence required before any narrowing applies.
const NARROWING_CONFIDENCE: f32 = 0.85;

pub struct ToolSelector {
    catalog: Arc<ToolCatalog>,
    trim_to_intent: bool,
}

impl ToolSelector {
    pub fn new(catalog: Arc<ToolCatalog>, trim_to_intent: bool) -> Self {
        Self {
            catalog,
            trim_to_intent,
        }
    }

    /// Compute the ordered, deduplicated tool set for this turn.
    pub fn select(&self, intent: &IntentClassification, command: &str) -> Vec<ToolSpec> {
        // Core is always included, then every classified group.
        let mut specs: Vec<ToolSpec> = self
            .catalog
            .expand(intent.tool_groups.iter().copied())
            .into_iter()
            .cloned()
            .collect();

        let non_core: Vec<ToolGroup> = intent
            .tool_groups
            .iter()
            .copied()
            .filter(|g| *g != ToolGroup::Core)
            .collect();

        // Narrow-to-intent: a purely table-oriented classification drops the
        // other entity searches, except those whose keyword literally
        // appears in the command.
        if self.trim_to_intent
            && non_core == [ToolGroup::Table]
            && intent.confidence >= NARROWING_CONFIDENCE
        {
            let lowered = command.to_lowercase();
            specs.retain(|spec| {
                if spec.group != ToolGroup::Core || spec.action != Some(ToolAction::Search) {
                    return true;
                }
                match spec.entity {
                    None => true,
                    Some(entity) => {
                        entity == EntityKind::Table
                            || entity == EntityKind::Workspace
                            || lowered.contains(entity.keyword())
                    }
                }
            });
            debug!(tools = specs.len(), "Narrowed search tools to table intent");
        }

        // Single-action narrowing: one group, one write action, high
        // confidence — restrict that group's write tools to the (action,
        // entity) registrations. Search/control tools are untouched and the
        // escalation tool always survives.
        if let [group] = non_core.as_slice() {
            if intent.confidence >= NARROWING_CONFIDENCE {
                if let [action] = intent.actions.as_slice() {
                    if matches!(
                        action,
                        ToolAction::Create | ToolAction::Update | ToolAction::Delete
                    ) {
                        if let Some(entity) = group.primary_entity() {
                            let allowed: Vec<String> = self
                                .catalog
                                .write_tools_for(*group, *action, entity)
                                .iter()
                                .map(|s| s.name.clone())
                                .collect();
                            specs.retain(|spec| {
                                spec.name == ESCALATION_TOOL
                                    || spec.kind == ToolKind::ReadOnly
                                    || spec.group != *group
                                    || allowed.contains(&spec.name)
                            });
                            debug!(
                                group = %group,
                                action = ?action,
                                tools = specs.len(),
                                "Narrowed write tools to single action"
                            );
                        }
                    }
                }
            }
        }

        specs
    }
}

/// A formatted schema with an approximate payload size.
pub struct SchemaEntry {
    pub definitions: Vec<ToolDefinition>,
    pub approx_bytes: usize,
}

/// Write-once-per-key cache of formatted tool schemas.
///
/// Keyed by the sorted tool-name signature of the selected set. A miss is
/// always safe — recomputation is pure — so there is no invalidation; the
/// key space is bounded by the number of distinct group combinations.
/// Owned by the engine instance, never process-global, so tests can assert
/// hit/miss behavior deterministically.
#[derive(Default)]
pub struct SchemaCache {
    entries: Mutex<HashMap<String, Arc<SchemaEntry>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the formatted schema for a tool set, building it on first use.
    pub fn get_or_build(&self, specs: &[ToolSpec]) -> Arc<SchemaEntry> {
        let mut names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        let key = names.join("|");

        let mut entries = self.entries.lock().expect("schema cache lock");
        if let Some(entry) = entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return entry.clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let definitions: Vec<ToolDefinition> = specs.iter().map(ToolSpec::to_definition).collect();
        let approx_bytes = definitions
            .iter()
            .map(|d| {
                d.name.len()
                    + d.description.len()
                    + serde_json::to_string(&d.parameters).map(|s| s.len()).unwrap_or(0)
            })
            .sum();
        let entry = Arc::new(SchemaEntry {
            definitions,
            approx_bytes,
        });
        entries.insert(key, entry.clone());
        entry
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("schema cache lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn selector(trim: bool) -> ToolSelector {
        ToolSelector::new(Arc::new(ToolCatalog::new()), trim)
    }

    fn intent(
        groups: &[ToolGroup],
        confidence: f32,
        actions: &[ToolAction],
    ) -> IntentClassification {
        let mut tool_groups: BTreeSet<ToolGroup> = groups.iter().copied().collect();
        tool_groups.insert(ToolGroup::Core);
        IntentClassification {
            tool_groups,
            confidence,
            entities: Vec::new(),
            actions: actions.to_vec(),
            reasoning: "test".into(),
        }
    }

    fn names(specs: &[ToolSpec]) -> Vec<&str> {
        specs.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn core_always_included() {
        let specs = selector(true).select(&intent(&[], 0.5, &[]), "anything");
        let names = names(&specs);
        assert!(names.contains(&"searchWorkspace"));
        assert!(names.contains(&ESCALATION_TOOL));
        assert!(!names.contains(&"createTable"));
    }

    #[test]
    fn classified_groups_add_their_tools() {
        let specs = selector(true).select(
            &intent(&[ToolGroup::Task], 0.7, &[ToolAction::Create]),
            "create a task and more words to lower confidence",
        );
        let names = names(&specs);
        assert!(names.contains(&"createTask"));
        assert!(names.contains(&"deleteTask"), "no narrowing below threshold");
    }

    #[test]
    fn table_intent_drops_unmentioned_searches() {
        let specs = selector(true).select(
            &intent(&[ToolGroup::Table], 0.9, &[ToolAction::Create]),
            "create a table called Budget",
        );
        let names = names(&specs);
        assert!(names.contains(&"searchTables"));
        assert!(names.contains(&"searchWorkspace"));
        assert!(!names.contains(&"searchClients"));
        assert!(!names.contains(&"searchTasks"), "task not mentioned");
        assert!(names.contains(&ESCALATION_TOOL));
    }

    #[test]
    fn table_intent_keeps_mentioned_entity_search() {
        let specs = selector(true).select(
            &intent(&[ToolGroup::Table], 0.9, &[ToolAction::Create]),
            "create a table from my task list",
        );
        assert!(names(&specs).contains(&"searchTasks"), "task is mentioned");
    }

    #[test]
    fn trim_toggle_off_keeps_all_searches() {
        let specs = selector(false).select(
            &intent(&[ToolGroup::Table], 0.9, &[ToolAction::Create]),
            "create a table called Budget",
        );
        assert!(names(&specs).contains(&"searchClients"));
    }

    #[test]
    fn single_action_narrowing_restricts_writes() {
        let specs = selector(true).select(
            &intent(&[ToolGroup::Table], 0.9, &[ToolAction::Create]),
            "create a table called Budget",
        );
        let names = names(&specs);
        assert!(names.contains(&"createTable"));
        assert!(names.contains(&"bulkCreateFields"));
        assert!(!names.contains(&"deleteTable"));
        assert!(!names.contains(&"updateTable"));
        assert!(names.contains(&ESCALATION_TOOL), "escalation never removed");
    }

    #[test]
    fn two_actions_disable_single_action_narrowing() {
        let specs = selector(true).select(
            &intent(
                &[ToolGroup::Table],
                0.9,
                &[ToolAction::Create, ToolAction::Update],
            ),
            "create and update tables",
        );
        let names = names(&specs);
        assert!(names.contains(&"updateTable"));
        assert!(names.contains(&"createTable"));
    }

    #[test]
    fn fast_path_canonical_tools_always_selected() {
        // Classification must never exclude a tool the deterministic path
        // considers canonical for the same command.
        let classifier = crate::IntentClassifier::new();
        let cases = [
            ("create a task called Ship", "createTask"),
            ("create a table called Budget with columns Item and Cost", "createTable"),
            ("list my tasks", "searchTasks"),
            ("list my projects", "searchProjects"),
        ];
        let sel = selector(true);
        for (command, tool) in cases {
            let intent = classifier.classify(command);
            let specs = sel.select(&intent, command);
            assert!(
                specs.iter().any(|s| s.name == tool),
                "{command:?} must select {tool}"
            );
        }
    }

    #[test]
    fn cache_hit_on_same_signature() {
        let cache = SchemaCache::new();
        let catalog = ToolCatalog::new();
        let specs: Vec<ToolSpec> = catalog.core_set().into_iter().cloned().collect();

        let first = cache.get_or_build(&specs);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 0);

        // Order must not matter: the key is the sorted name signature
        let mut reversed = specs.clone();
        reversed.reverse();
        let second = cache.get_or_build(&reversed);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(first.approx_bytes, second.approx_bytes);
        assert!(first.approx_bytes > 0);
    }

    #[test]
    fn cache_miss_on_different_set() {
        let cache = SchemaCache::new();
        let catalog = ToolCatalog::new();
        let core: Vec<ToolSpec> = catalog.core_set().into_iter().cloned().collect();
        let wide: Vec<ToolSpec> = catalog
            .expand([ToolGroup::Table])
            .into_iter()
            .cloned()
            .collect();

        cache.get_or_build(&core);
        cache.get_or_build(&wide);
        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn narrowing_preserves_entity_keyword_reexpansion() {
        // Keyword scan is on the literal command text, not the classification
        let sel = selector(true);
        let i = intent(&[ToolGroup::Table], 0.9, &[ToolAction::Create]);
        let with_client = sel.select(&i, "create a table of client contacts");
        assert!(names(&with_client).contains(&"searchClients"));
    }
}
