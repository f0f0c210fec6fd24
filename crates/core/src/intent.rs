//! Intent classification value object.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::capability::{EntityKind, ToolAction, ToolGroup};

/// The classifier's best-effort reading of a command.
///
/// Derived once per command, and once more on a capability-escalation
/// handshake — merged into a new value, never mutated in place. Downstream
/// stages must tolerate under- or over-classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentClassification {
    /// Tool groups the command appears to need.
    pub tool_groups: BTreeSet<ToolGroup>,

    /// Confidence in [0, 1].
    pub confidence: f32,

    /// Entities detected in the command text.
    pub entities: Vec<EntityKind>,

    /// Actions detected in the command text.
    pub actions: Vec<ToolAction>,

    /// Why the classifier chose this group set.
    pub reasoning: String,
}

impl IntentClassification {
    /// The smallest safe capability set: core only.
    pub fn core_only(confidence: f32, reasoning: impl Into<String>) -> Self {
        Self {
            tool_groups: BTreeSet::from([ToolGroup::Core]),
            confidence,
            entities: Vec::new(),
            actions: Vec::new(),
            reasoning: reasoning.into(),
        }
    }

    /// Derive a new classification with extra groups unioned in.
    ///
    /// Used by the escalation handshake; the original value stays intact in
    /// case the caller needs to audit what was initially classified.
    pub fn merge_groups(&self, extra: impl IntoIterator<Item = ToolGroup>) -> Self {
        let mut merged = self.clone();
        merged.tool_groups.extend(extra);
        merged.reasoning = format!("{} (escalated)", self.reasoning);
        merged
    }

    /// Whether any detected action mutates the data store.
    pub fn has_write_action(&self) -> bool {
        self.actions.iter().any(|a| a.is_write())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_only_has_single_group() {
        let intent = IntentClassification::core_only(0.85, "search only");
        assert_eq!(intent.tool_groups.len(), 1);
        assert!(intent.tool_groups.contains(&ToolGroup::Core));
        assert!(!intent.has_write_action());
    }

    #[test]
    fn merge_produces_new_value() {
        let intent = IntentClassification::core_only(0.85, "search only");
        let merged = intent.merge_groups([ToolGroup::Table]);
        assert_eq!(intent.tool_groups.len(), 1);
        assert_eq!(merged.tool_groups.len(), 2);
        assert!(merged.reasoning.contains("escalated"));
    }
}
