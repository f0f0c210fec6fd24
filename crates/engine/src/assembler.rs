//! Accumulates streamed tool-call fragments into complete tool calls.
//!
//! Tool-call deltas arrive keyed by a per-round index: the id and name are
//! set once (usually in the first fragment for an index) and the argument
//! string arrives as pieces to be concatenated in order. Partial JSON
//! arguments cannot be parsed safely, so fragments are buffered here until
//! the round's terminal chunk closes the set.

use std::collections::BTreeMap;

use worksmith_core::message::MessageToolCall;
use worksmith_core::provider::ToolCallDelta;

#[derive(Debug, Default)]
struct Slot {
    id: String,
    name: String,
    arguments: String,
}

/// Per-round accumulator for incremental tool-call deltas.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    slots: BTreeMap<u32, Slot>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one fragment.
    pub fn absorb(&mut self, delta: &ToolCallDelta) {
        let slot = self.slots.entry(delta.index).or_default();
        if let Some(id) = &delta.id {
            slot.id = id.clone();
        }
        if let Some(name) = &delta.name {
            slot.name = name.clone();
        }
        if let Some(arguments) = &delta.arguments {
            slot.arguments.push_str(arguments);
        }
    }

    /// Whether any fragments have been absorbed this round.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Close the round: the accumulated calls in index order.
    pub fn finish(self) -> Vec<MessageToolCall> {
        self.slots
            .into_values()
            .map(|slot| MessageToolCall {
                id: slot.id,
                name: slot.name,
                arguments: slot.arguments,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(index: u32, id: Option<&str>, name: Option<&str>, args: Option<&str>) -> ToolCallDelta {
        ToolCallDelta {
            index,
            id: id.map(String::from),
            name: name.map(String::from),
            arguments: args.map(String::from),
        }
    }

    #[test]
    fn assembles_fragmented_arguments() {
        let mut assembler = ToolCallAssembler::new();
        assembler.absorb(&delta(0, Some("call_1"), Some("createTask"), Some("")));
        assembler.absorb(&delta(0, None, None, Some("{\"title\"")));
        assembler.absorb(&delta(0, None, None, Some(": \"Ship it\"}")));

        let calls = assembler.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].name, "createTask");
        assert_eq!(calls[0].arguments, "{\"title\": \"Ship it\"}");
    }

    #[test]
    fn interleaved_indices_assemble_independently() {
        let mut assembler = ToolCallAssembler::new();
        assembler.absorb(&delta(0, Some("call_a"), Some("searchTasks"), Some("{")));
        assembler.absorb(&delta(1, Some("call_b"), Some("searchTables"), Some("{\"query\"")));
        assembler.absorb(&delta(0, None, None, Some("}")));
        assembler.absorb(&delta(1, None, None, Some(":\"budget\"}")));

        let calls = assembler.finish();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "searchTasks");
        assert_eq!(calls[0].arguments, "{}");
        assert_eq!(calls[1].name, "searchTables");
        assert_eq!(calls[1].arguments, "{\"query\":\"budget\"}");
    }

    #[test]
    fn finish_orders_by_index() {
        let mut assembler = ToolCallAssembler::new();
        assembler.absorb(&delta(2, Some("c"), Some("third"), None));
        assembler.absorb(&delta(0, Some("a"), Some("first"), None));
        assembler.absorb(&delta(1, Some("b"), Some("second"), None));

        let names: Vec<_> = assembler.finish().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn empty_assembler_yields_no_calls() {
        let assembler = ToolCallAssembler::new();
        assert!(assembler.is_empty());
        assert!(assembler.finish().is_empty());
    }
}
