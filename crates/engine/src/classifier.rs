//! Heuristic intent classification.
//!
//! A pure function from command text to an `IntentClassification`. The
//! tables are data-driven so each pattern can be unit-tested in isolation.
//! This is best-effort: downstream stages tolerate under-classification
//! (the escalation handshake) and over-classification (a wider schema).

use std::collections::BTreeSet;

use regex_lite::Regex;
use worksmith_core::capability::{EntityKind, ToolAction, ToolGroup};
use worksmith_core::intent::IntentClassification;

/// Confidence assigned when a special pattern short-circuits.
const SPECIAL_CONFIDENCE: f32 = 0.95;

/// Confidence for the pure-search bias toward the smallest capability set.
const SEARCH_ONLY_CONFIDENCE: f32 = 0.85;

struct SpecialPattern {
    pattern: Regex,
    groups: &'static [ToolGroup],
    reasoning: &'static str,
}

pub struct IntentClassifier {
    special: Vec<SpecialPattern>,
    entities: Vec<(EntityKind, Regex)>,
    actions: Vec<(ToolAction, Regex)>,
    incidental_project: Regex,
    project_mention: Regex,
}

impl IntentClassifier {
    pub fn new() -> Self {
        let special = vec![
            SpecialPattern {
                pattern: re(r"\b(search|find)\b.*\band\s+organi[sz]e\b.*\binto\b.*\btable\b"),
                groups: &[ToolGroup::Task, ToolGroup::Table],
                reasoning: "compound search-and-organize into a table",
            },
            SpecialPattern {
                pattern: re(r"\bboard\s+(from|of|out of)\b.*\btasks\b"),
                groups: &[ToolGroup::Task],
                reasoning: "board derived from a task search",
            },
            SpecialPattern {
                pattern: re(r"\bimport\b.*\binto\b.*\btable\b"),
                groups: &[ToolGroup::Table, ToolGroup::File],
                reasoning: "file import into a table",
            },
        ];

        let entities = vec![
            (EntityKind::Task, re(r"\btasks?\b|\bto-?dos?\b")),
            (EntityKind::Project, re(r"\bprojects?\b")),
            (EntityKind::Table, re(r"\btables?\b")),
            (EntityKind::Timeline, re(r"\btimelines?\b|\bgantt\b")),
            (EntityKind::Block, re(r"\bblocks?\b")),
            (EntityKind::Tab, re(r"\btabs?\b|\bpages?\b")),
            (EntityKind::Doc, re(r"\bdocs?\b|\bdocuments?\b")),
            (EntityKind::File, re(r"\bfiles?\b|\battachments?\b")),
            (EntityKind::Client, re(r"\bclients?\b|\bcustomers?\b")),
            (EntityKind::Workspace, re(r"\bworkspace\b")),
            (EntityKind::Commerce, re(r"\bcatalog\b|\bproducts?\b")),
        ];

        let actions = vec![
            (
                ToolAction::Search,
                re(r"\b(search|find|list|show|display|look up|what|which|where)\b"),
            ),
            (
                ToolAction::Create,
                re(r"\b(create|add|make|build|new|set up)\b"),
            ),
            (
                ToolAction::Update,
                re(r"\b(update|change|edit|modify|rename|mark|assign|move|complete)\b"),
            ),
            (ToolAction::Delete, re(r"\b(delete|remove|clear|archive)\b")),
            (
                ToolAction::Organize,
                re(r"\b(organi[sz]e|group|sort|arrange|categori[sz]e)\b"),
            ),
        ];

        Self {
            special,
            entities,
            actions,
            incidental_project: re(
                r"\b(in|of|from|inside|within|into|under|on)\s+(the\s+|my\s+|this\s+|our\s+|that\s+)?projects?\b",
            ),
            project_mention: re(r"\bprojects?\b"),
        }
    }

    /// Classify one command. Pure: no I/O, no shared state.
    pub fn classify(&self, command: &str) -> IntentClassification {
        // (a) special compound phrasings short-circuit, first match wins
        for special in &self.special {
            if special.pattern.is_match(command) {
                let mut tool_groups: BTreeSet<ToolGroup> = special.groups.iter().copied().collect();
                tool_groups.insert(ToolGroup::Core);
                return IntentClassification {
                    tool_groups,
                    confidence: SPECIAL_CONFIDENCE,
                    entities: special
                        .groups
                        .iter()
                        .filter_map(ToolGroup::primary_entity)
                        .collect(),
                    actions: self.detect_actions(command),
                    reasoning: special.reasoning.into(),
                };
            }
        }

        // (b) independent entity and action detection
        let mut entities = self.detect_entities(command);
        let actions = self.detect_actions(command);

        // (c) pure search gets the smallest safe capability set
        let pure_search = !actions.is_empty() && actions.iter().all(|a| *a == ToolAction::Search);
        if pure_search {
            let mut intent = IntentClassification::core_only(
                SEARCH_ONLY_CONFIDENCE,
                "search-only command, core tools suffice",
            );
            intent.entities = entities;
            intent.actions = actions;
            return intent;
        }

        // (d) a "project" that only appears as locational context does not
        // imply project write tools
        if entities.contains(&EntityKind::Project) && self.project_is_incidental(command) {
            entities.retain(|e| *e != EntityKind::Project);
        }

        let mut tool_groups: BTreeSet<ToolGroup> = BTreeSet::from([ToolGroup::Core]);
        tool_groups.extend(entities.iter().filter_map(EntityKind::group));

        // (e) additive confidence, capped
        let confidence =
            (0.5 + 0.2 * entities.len() as f32 + 0.15 * actions.len() as f32).min(1.0);

        let reasoning = format!(
            "entities: [{}]; actions: [{}]",
            entities
                .iter()
                .map(|e| e.keyword())
                .collect::<Vec<_>>()
                .join(", "),
            actions
                .iter()
                .map(|a| format!("{a:?}").to_lowercase())
                .collect::<Vec<_>>()
                .join(", "),
        );

        IntentClassification {
            tool_groups,
            confidence,
            entities,
            actions,
            reasoning,
        }
    }

    fn detect_entities(&self, command: &str) -> Vec<EntityKind> {
        self.entities
            .iter()
            .filter(|(_, pattern)| pattern.is_match(command))
            .map(|(entity, _)| *entity)
            .collect()
    }

    fn detect_actions(&self, command: &str) -> Vec<ToolAction> {
        self.actions
            .iter()
            .filter(|(_, pattern)| pattern.is_match(command))
            .map(|(action, _)| *action)
            .collect()
    }

    /// True when every "project" mention is locational ("in the project").
    fn project_is_incidental(&self, command: &str) -> bool {
        let mentions = self.project_mention.find_iter(command).count();
        let incidental = self.incidental_project.find_iter(command).count();
        mentions > 0 && mentions == incidental
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn re(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){pattern}")).expect("classifier pattern")
}
