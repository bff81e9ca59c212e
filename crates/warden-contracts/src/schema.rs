//! Declared input schemas and validation report types.
//!
//! Each capability declares the JSON Schema its arguments must satisfy at
//! registration time. The validator checks arguments against it before the
//! handler is ever called.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// The JSON Schema document a capability's arguments must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    pub json_schema: Value,
}

impl InputSchema {
    pub fn new(json_schema: Value) -> Self {
        Self { json_schema }
    }

    /// Any JSON object is accepted.
    pub fn any_object() -> Self {
        Self::new(json!({ "type": "object" }))
    }

    /// An object whose listed properties are all required strings.
    pub fn required_strings(names: &[&str]) -> Self {
        let properties: serde_json::Map<String, Value> = names
            .iter()
            .map(|name| (name.to_string(), json!({ "type": "string" })))
            .collect();
        Self::new(json!({
            "type": "object",
            "properties": properties,
            "required": names,
        }))
    }

    /// Names listed under `required`, in declaration order.
    pub fn required_properties(&self) -> Vec<&str> {
        self.json_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Property names with their optional `description`, sorted by name.
    pub fn properties(&self) -> Vec<(&str, Option<&str>)> {
        self.json_schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, spec)| {
                        (name.as_str(), spec.get("description").and_then(Value::as_str))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for InputSchema {
    fn default() -> Self {
        Self::any_object()
    }
}

/// The result of checking arguments against an `InputSchema`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True only if no failure was recorded.
    pub passed: bool,
    pub failures: Vec<ValidationFailure>,
}

impl ValidationReport {
    pub fn pass() -> Self {
        Self {
            passed: true,
            failures: vec![],
        }
    }

    pub fn from_failures(failures: Vec<ValidationFailure>) -> Self {
        Self {
            passed: failures.is_empty(),
            failures,
        }
    }
}

/// One schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// JSON Pointer to the offending value; empty for the root.
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}
