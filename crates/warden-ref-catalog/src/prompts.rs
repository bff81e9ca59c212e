//! Reference prompts.
//!
//! A prompt handler only formats text; the client decides what to do with it.

use serde_json::{json, Value};

use warden_core::entry::{CapabilityEntry, HandlerError, Invocation};

fn render_weather_report(call: &Invocation<'_>) -> Result<Value, HandlerError> {
    let city = call.str_arg("city")?;
    Ok(Value::String(format!(
        "Write a short weather report for {city}. Read weather://{city}/current for today's \
         conditions and summarize them in two or three sentences for a general audience."
    )))
}

pub fn weather_report() -> CapabilityEntry {
    CapabilityEntry::prompt("weather_report", render_weather_report)
        .with_description("Ask the model for a short weather report for a city.")
        .with_schema(json!({
            "type": "object",
            "properties": {
                "city": { "type": "string", "description": "The city to report on" }
            },
            "required": ["city"]
        }))
}

pub fn all() -> Vec<CapabilityEntry> {
    vec![weather_report()]
}
