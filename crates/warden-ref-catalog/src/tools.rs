//! Reference tools: small arithmetic operations.
//!
//! Tools take JSON arguments validated against the declared schema and return
//! a JSON result. Division by zero is reported as a handler error, which the
//! pipeline turns into an `InvocationError`.

use serde_json::{json, Value};

use warden_core::entry::{CapabilityEntry, HandlerError, Invocation};

/// Bounded to `i64` so out-of-range operands fail validation.
fn integer_pair(a: &str, b: &str) -> Value {
    let operand = |description: &str| {
        json!({
            "type": "integer",
            "minimum": i64::MIN,
            "maximum": i64::MAX,
            "description": description
        })
    };
    json!({
        "type": "object",
        "properties": { "a": operand(a), "b": operand(b) },
        "required": ["a", "b"]
    })
}

fn add(call: &Invocation<'_>) -> Result<Value, HandlerError> {
    let a = call.i64_arg("a")?;
    let b = call.i64_arg("b")?;
    a.checked_add(b)
        .map(Value::from)
        .ok_or_else(|| HandlerError::new("sum does not fit in a 64-bit integer"))
}

fn divide(call: &Invocation<'_>) -> Result<Value, HandlerError> {
    let a = call.f64_arg("a")?;
    let b = call.f64_arg("b")?;
    if b == 0.0 {
        return Err(HandlerError::new("cannot divide by zero"));
    }
    Ok(json!(a / b))
}

pub fn add_two_numbers() -> CapabilityEntry {
    CapabilityEntry::tool("add_two_numbers", add)
        .with_description("Add two numbers together.\n\nReturns the sum of the two numbers.")
        .with_schema(integer_pair("The first number", "The second number"))
}

/// Same operation under an explicit name and description.
pub fn add_two_numbers_v2() -> CapabilityEntry {
    CapabilityEntry::tool("add_two_numbers_v2", add)
        .with_description("Add two numbers together.")
        .with_schema(integer_pair("The first number", "The second number"))
}

// The misspelled name is the published tool name clients already call.
pub fn devide_two_numbers() -> CapabilityEntry {
    CapabilityEntry::tool("devide_two_numbers", divide)
        .with_description("Divide the first number by the second number.")
        .with_schema(json!({
            "type": "object",
            "properties": {
                "a": { "type": "number", "description": "The dividend" },
                "b": { "type": "number", "description": "The divisor" }
            },
            "required": ["a", "b"]
        }))
}

pub fn all() -> Vec<CapabilityEntry> {
    vec![add_two_numbers(), add_two_numbers_v2(), devide_two_numbers()]
}
