//! Shared JSON-schema fragments for tool parameter definitions.

use serde_json::{Value, json};

/// An object schema with the given properties and required field names.
pub(crate) fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// A string property with a description.
pub(crate) fn string(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

/// An array-of-strings property with a description.
pub(crate) fn string_array(description: &str) -> Value {
    json!({
        "type": "array",
        "items": { "type": "string" },
        "description": description,
    })
}
