//! # warden-ref-catalog
//!
//! The reference capability catalog served by `warden-server`.
//!
//! | kind              | address                                   |
//! |-------------------|-------------------------------------------|
//! | tool              | `add_two_numbers`, `add_two_numbers_v2`, `devide_two_numbers` |
//! | resource          | `resource://hello_world`, `resource://hello_world_v2`, `resource://tell_a_joke` |
//! | resource template | `weather://{city}/current`, `weather://{city}/{date}/past_weather` |
//! | prompt            | `weather_report`                          |
//!
//! Every payload is hardcoded and fictional. Nothing here contacts an external
//! system.

pub mod prompts;
pub mod resources;
pub mod tools;

use tracing::info;

use warden_contracts::error::GateResult;
use warden_core::entry::CapabilityEntry;
use warden_registry::CapabilityRegistry;

/// Every reference entry, tools first, then resources and templates, then
/// prompts.
pub fn entries() -> Vec<CapabilityEntry> {
    let mut all = tools::all();
    all.extend(resources::all());
    all.extend(prompts::all());
    all
}

/// Register the whole reference catalog into `registry`.
pub fn register_all(registry: &mut CapabilityRegistry) -> GateResult<()> {
    let entries = entries();
    let count = entries.len();
    registry.register_all(entries)?;
    info!(count, "reference catalog registered");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use serde_json::{json, Map, Value};

    use warden_contracts::{auth::AuthContext, capability::CapabilityKind, request::RequestId};
    use warden_core::{
        entry::{HandlerError, Invocation, ResolvedCapability},
        traits::CapabilityResolver,
    };
    use warden_registry::CapabilityRegistry;

    use super::register_all;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn catalog() -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        register_all(&mut registry).unwrap();
        registry
    }

    fn auth() -> AuthContext {
        AuthContext {
            subject: "test-user".to_string(),
            issuer: None,
            audience: Vec::new(),
            claims: Map::new(),
            expires_at: Utc::now(),
        }
    }

    /// Call a resolved entry the way the pipeline would: bindings merged into
    /// the arguments.
    fn call(resolved: &ResolvedCapability, args: Value) -> Result<Value, HandlerError> {
        let mut arguments = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (name, value) in &resolved.bindings {
            arguments.insert(name.clone(), Value::String(value.clone()));
        }
        let request_id = RequestId::new();
        let auth = auth();
        let invocation = Invocation {
            request_id: &request_id,
            auth: &auth,
            arguments: &arguments,
            bindings: &resolved.bindings,
        };
        resolved.entry.handler.call(&invocation)
    }

    fn resolve(registry: &CapabilityRegistry, kind: CapabilityKind, address: &str) -> ResolvedCapability {
        registry
            .resolve(kind, address)
            .unwrap_or_else(|| panic!("{kind} '{address}' should be registered"))
    }

    // ── Registration ──────────────────────────────────────────────────────────

    #[test]
    fn test_catalog_registers_every_kind() {
        let registry = catalog();

        let names = |kind: CapabilityKind| -> Vec<String> {
            registry.list(kind).iter().map(|e| e.address.clone()).collect()
        };
        assert_eq!(
            names(CapabilityKind::Tool),
            ["add_two_numbers", "add_two_numbers_v2", "devide_two_numbers"]
        );
        assert_eq!(
            names(CapabilityKind::Resource),
            ["resource://hello_world", "resource://hello_world_v2", "resource://tell_a_joke"]
        );
        assert_eq!(
            names(CapabilityKind::ResourceTemplate),
            ["weather://{city}/current", "weather://{city}/{date}/past_weather"]
        );
        assert_eq!(names(CapabilityKind::Prompt), ["weather_report"]);
    }

    /// Registering the catalog twice is a duplicate registration.
    #[test]
    fn test_registering_twice_fails() {
        let mut registry = catalog();
        assert!(register_all(&mut registry).is_err());
    }

    #[test]
    fn test_every_schema_describes_an_object() {
        for entry in super::entries() {
            assert_eq!(
                entry.input_schema.json_schema["type"], "object",
                "schema for {} is not an object schema",
                entry.address
            );
        }
    }

    /// Template schemas require exactly the pattern's placeholders.
    #[test]
    fn test_template_schemas_require_placeholders() {
        let registry = catalog();
        for entry in registry.list(CapabilityKind::ResourceTemplate) {
            let template = warden_registry::UriTemplate::parse(&entry.address).unwrap();
            let required = entry.input_schema.required_properties();
            assert_eq!(required, template.placeholders(), "template {}", entry.address);
        }
    }

    // ── Tools ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_add_two_numbers() {
        let registry = catalog();
        for name in ["add_two_numbers", "add_two_numbers_v2"] {
            let tool = resolve(&registry, CapabilityKind::Tool, name);
            assert_eq!(call(&tool, json!({ "a": 2, "b": 40 })).unwrap(), json!(42));
        }
    }

    #[test]
    fn test_add_accepts_integral_floats() {
        let tool = resolve(&catalog(), CapabilityKind::Tool, "add_two_numbers");
        assert_eq!(call(&tool, json!({ "a": 40.0, "b": 2 })).unwrap(), json!(42));
        assert!(call(&tool, json!({ "a": 40.5, "b": 2 })).is_err());
    }

    #[test]
    fn test_add_schema_bounds_operands_to_i64() {
        let tool = resolve(&catalog(), CapabilityKind::Tool, "add_two_numbers");
        let a = &tool.entry.input_schema.json_schema["properties"]["a"];
        assert_eq!(a["maximum"], json!(i64::MAX));
        assert_eq!(a["minimum"], json!(i64::MIN));
    }

    #[test]
    fn test_add_overflow_is_a_handler_error() {
        let tool = resolve(&catalog(), CapabilityKind::Tool, "add_two_numbers");
        assert!(call(&tool, json!({ "a": i64::MAX, "b": 1 })).is_err());
    }

    #[test]
    fn test_divide() {
        let tool = resolve(&catalog(), CapabilityKind::Tool, "devide_two_numbers");
        assert_eq!(call(&tool, json!({ "a": 9, "b": 2 })).unwrap(), json!(4.5));

        let err = call(&tool, json!({ "a": 1, "b": 0 })).unwrap_err();
        assert_eq!(err.message, "cannot divide by zero");
    }

    // ── Resources ─────────────────────────────────────────────────────────────

    #[test]
    fn test_static_resources() {
        let registry = catalog();

        let hello = resolve(&registry, CapabilityKind::Resource, "resource://hello_world");
        assert_eq!(hello.entry.mime_type.as_deref(), Some("text/plain"));
        assert!(call(&hello, Value::Null).unwrap().as_str().unwrap().starts_with("Hello"));

        let v2 = resolve(&registry, CapabilityKind::Resource, "resource://hello_world_v2");
        assert_eq!(v2.entry.name, "Greetings Resource");
        assert!(call(&v2, Value::Null).unwrap().as_str().unwrap().ends_with("(v2)"));

        let joke = resolve(&registry, CapabilityKind::Resource, "resource://tell_a_joke");
        assert!(call(&joke, Value::Null).unwrap().as_str().unwrap().contains("no charge"));
    }

    #[test]
    fn test_weather_templates() {
        let registry = catalog();

        let current = resolve(&registry, CapabilityKind::ResourceTemplate, "weather://oslo/current");
        assert_eq!(
            call(&current, Value::Null).unwrap(),
            json!({ "city": "oslo", "temperature": 20, "description": "Sunny", "units": "C" })
        );

        let past = resolve(
            &registry,
            CapabilityKind::ResourceTemplate,
            "weather://oslo/2024-03-01/past_weather",
        );
        let body = call(&past, Value::Null).unwrap();
        assert_eq!(body["date"], "2024-03-01");
        assert_eq!(body["description"], "Cloudy");
        assert_eq!(
            past.bindings,
            BTreeMap::from([
                ("city".to_string(), "oslo".to_string()),
                ("date".to_string(), "2024-03-01".to_string()),
            ])
        );
    }

    // ── Prompts ───────────────────────────────────────────────────────────────

    #[test]
    fn test_weather_report_prompt_mentions_city() {
        let prompt = resolve(&catalog(), CapabilityKind::Prompt, "weather_report");
        let text = call(&prompt, json!({ "city": "Lisbon" })).unwrap();
        assert!(text.as_str().unwrap().contains("Lisbon"));
    }
}
