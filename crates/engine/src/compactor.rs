//! Depth/size-bounded compaction of tool results.
//!
//! Tool outputs are echoed back into the conversation every round; without
//! a bound, a large search result would dominate the prompt for the rest of
//! the execution. Compaction applies only to the conversation copy — the
//! caller-facing `tool_calls_made` record always carries the full result.

use serde_json::{Map, Value};
use worksmith_core::tool::ToolCallResult;
use worksmith_config::LimitsConfig;

const TRUNCATION_MARKER: &str = "… [truncated]";

/// Size caps for one compaction pass.
#[derive(Debug, Clone, Copy)]
pub struct CompactionCaps {
    /// Max characters per string, marker included.
    pub max_string: usize,
    /// Max items per array, count marker included.
    pub max_items: usize,
    /// Max keys per object, count marker included.
    pub max_keys: usize,
    /// Max recursion depth; deeper values collapse to a marker.
    pub max_depth: usize,
}

impl CompactionCaps {
    pub fn from_limits(limits: &LimitsConfig) -> Self {
        Self {
            max_string: limits.compact_max_string,
            max_items: limits.compact_max_items,
            max_keys: limits.compact_max_keys,
            max_depth: limits.compact_max_depth,
        }
    }
}

impl Default for CompactionCaps {
    fn default() -> Self {
        Self::from_limits(&LimitsConfig::default())
    }
}

/// Recursively bound a JSON value. Pure: same (value, caps) always produces
/// the same output, and a compacted value passes through unchanged.
pub fn compact(value: &Value, caps: &CompactionCaps) -> Value {
    compact_at(value, caps, 0)
}

/// Bound a tool result for re-insertion into the conversation.
///
/// The top-level `success` field always passes through un-compacted.
pub fn compact_result(result: &ToolCallResult, caps: &CompactionCaps) -> Value {
    let mut out = Map::new();
    out.insert("success".into(), Value::Bool(result.success));
    if let Some(data) = &result.data {
        out.insert("data".into(), compact_at(data, caps, 1));
    }
    if let Some(error) = &result.error {
        out.insert("error".into(), compact_string(error, caps));
    }
    if let Some(hint) = &result.hint {
        out.insert("hint".into(), compact_string(hint, caps));
    }
    Value::Object(out)
}

fn compact_at(value: &Value, caps: &CompactionCaps, depth: usize) -> Value {
    if depth >= caps.max_depth && (value.is_array() || value.is_object()) {
        return Value::String(TRUNCATION_MARKER.into());
    }

    match value {
        Value::String(s) => compact_string(s, caps),
        Value::Array(items) => {
            if items.len() <= caps.max_items {
                Value::Array(
                    items
                        .iter()
                        .map(|v| compact_at(v, caps, depth + 1))
                        .collect(),
                )
            } else {
                // Keep max_items - 1 real items; the last slot is the count
                // marker, so a compacted array never re-truncates.
                let keep = caps.max_items.saturating_sub(1);
                let mut out: Vec<Value> = items
                    .iter()
                    .take(keep)
                    .map(|v| compact_at(v, caps, depth + 1))
                    .collect();
                out.push(Value::String(format!("… (+{} more)", items.len() - keep)));
                Value::Array(out)
            }
        }
        Value::Object(map) => {
            if map.len() <= caps.max_keys {
                Value::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), compact_at(v, caps, depth + 1)))
                        .collect(),
                )
            } else {
                let keep = caps.max_keys.saturating_sub(1);
                let mut out: Map<String, Value> = map
                    .iter()
                    .take(keep)
                    .map(|(k, v)| (k.clone(), compact_at(v, caps, depth + 1)))
                    .collect();
                out.insert(
                    "_truncated".into(),
                    Value::String(format!("… (+{} more keys)", map.len() - keep)),
                );
                Value::Object(out)
            }
        }
        other => other.clone(),
    }
}

fn compact_string(s: &str, caps: &CompactionCaps) -> Value {
    if s.chars().count() <= caps.max_string {
        return Value::String(s.into());
    }
    let keep = caps.max_string.saturating_sub(TRUNCATION_MARKER.chars().count());
    let truncated: String = s.chars().take(keep).collect();
    Value::String(format!("{truncated}{TRUNCATION_MARKER}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn small_caps() -> CompactionCaps {
        CompactionCaps {
            max_string: 20,
            max_items: 3,
            max_keys: 3,
            max_depth: 3,
        }
    }

    fn size_of(value: &Value) -> usize {
        serde_json::to_string(value).unwrap().len()
    }

    #[test]
    fn long_string_truncated_within_cap() {
        let caps = small_caps();
        let value = json!("a very long string that exceeds the cap");
        let compacted = compact(&value, &caps);
        let s = compacted.as_str().unwrap();
        assert!(s.chars().count() <= caps.max_string);
        assert!(s.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn long_array_keeps_count_marker() {
        let caps = small_caps();
        let value = json!([1, 2, 3, 4, 5, 6]);
        let compacted = compact(&value, &caps);
        let items = compacted.as_array().unwrap();
        assert_eq!(items.len(), caps.max_items);
        assert_eq!(items[0], 1);
        assert!(items[2].as_str().unwrap().contains("+4 more"));
    }

    #[test]
    fn wide_object_keeps_key_marker() {
        let caps = small_caps();
        let value = json!({"a": 1, "b": 2, "c": 3, "d": 4, "e": 5});
        let compacted = compact(&value, &caps);
        let map = compacted.as_object().unwrap();
        assert_eq!(map.len(), caps.max_keys);
        assert!(map.contains_key("_truncated"));
    }

    #[test]
    fn deep_value_collapses_at_depth_cap() {
        let caps = small_caps();
        let value = json!({"a": {"b": {"c": {"d": {"e": 1}}}}});
        let compacted = compact(&value, &caps);
        // Depth 3 composite replaced by a marker string
        assert_eq!(compacted["a"]["b"]["c"], TRUNCATION_MARKER);
    }

    #[test]
    fn compaction_never_grows() {
        let caps = small_caps();
        for value in [
            json!("short"),
            json!("a much longer string that will certainly be truncated by the cap"),
            json!([1, 2, 3, 4, 5, 6, 7, 8, 9, 10]),
            json!({"a": {"b": {"c": {"d": 1}}}, "x": "some text", "list": [1, 2, 3, 4, 5]}),
        ] {
            let compacted = compact(&value, &caps);
            assert!(
                size_of(&compacted) <= size_of(&value),
                "compaction grew {value}"
            );
        }
    }

    #[test]
    fn compaction_is_idempotent() {
        let caps = small_caps();
        let value = json!({
            "tasks": [1, 2, 3, 4, 5, 6, 7],
            "note": "a string long enough to be truncated by the small cap",
            "nested": {"a": {"b": {"c": 1}}},
            "k1": 1, "k2": 2, "k3": 3, "k4": 4
        });
        let once = compact(&value, &caps);
        let twice = compact(&once, &caps);
        assert_eq!(once, twice);
    }

    #[test]
    fn result_success_field_passes_through() {
        let caps = small_caps();
        let result = ToolCallResult::failure(
            "an error message that is much longer than the twenty character cap",
        );
        let compacted = compact_result(&result, &caps);
        assert_eq!(compacted["success"], false);
        assert!(compacted["error"].as_str().unwrap().ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn result_compaction_idempotent_via_value() {
        let caps = small_caps();
        let result = ToolCallResult::ok(json!({"items": [1, 2, 3, 4, 5, 6]}));
        let once = compact_result(&result, &caps);
        let twice = compact(&once, &caps);
        assert_eq!(once, twice);
    }
}
