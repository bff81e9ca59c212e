//! The capability registry.
//!
//! Entries are registered during startup through `&mut self` and the registry
//! is then shared read-only behind an `Arc`. Every per-kind list keeps
//! registration order, which is the order listings are returned in and the
//! tie-breaker for template resolution.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use warden_contracts::{
    capability::{CapabilityAddress, CapabilityKind},
    error::{GateError, GateResult},
};
use warden_core::{
    entry::{CapabilityEntry, ResolvedCapability},
    traits::CapabilityResolver,
};

use crate::template::UriTemplate;

struct TemplateSlot {
    template: UriTemplate,
    entry: Arc<CapabilityEntry>,
}

/// Catalog of every capability the server exposes.
#[derive(Default)]
pub struct CapabilityRegistry {
    /// All entries in registration order, across kinds.
    ordered: Vec<Arc<CapabilityEntry>>,
    /// Exact-address index for tools, resources, and prompts.
    exact: HashMap<CapabilityAddress, Arc<CapabilityEntry>>,
    /// Compiled resource templates in registration order.
    templates: Vec<TemplateSlot>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `entry` to the catalog.
    ///
    /// Fails with `DuplicateCapability` if the same kind already has an entry
    /// at this address, `InvalidTemplate` for a resource template whose
    /// pattern does not compile, and `ConfigError` for an empty address.
    pub fn register(&mut self, entry: CapabilityEntry) -> GateResult<()> {
        if entry.address.trim().is_empty() {
            return Err(GateError::config(format!(
                "{} registered with an empty address",
                entry.kind
            )));
        }

        let key = entry.key();
        let duplicate = match entry.kind {
            CapabilityKind::ResourceTemplate => self
                .templates
                .iter()
                .any(|slot| slot.template.pattern() == entry.address),
            _ => self.exact.contains_key(&key),
        };
        if duplicate {
            return Err(GateError::DuplicateCapability { address: key });
        }

        let entry = Arc::new(entry);
        match entry.kind {
            CapabilityKind::ResourceTemplate => {
                let template = UriTemplate::parse(&entry.address)?;
                self.templates.push(TemplateSlot {
                    template,
                    entry: Arc::clone(&entry),
                });
            }
            _ => {
                self.exact.insert(key, Arc::clone(&entry));
            }
        }

        info!(kind = %entry.kind, address = %entry.address, "capability registered");
        self.ordered.push(entry);
        Ok(())
    }

    /// Register several entries, stopping at the first failure.
    pub fn register_all<I>(&mut self, entries: I) -> GateResult<()>
    where
        I: IntoIterator<Item = CapabilityEntry>,
    {
        for entry in entries {
            self.register(entry)?;
        }
        Ok(())
    }

    /// Every registered entry in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &CapabilityEntry> {
        self.ordered.iter().map(|entry| entry.as_ref())
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Match a concrete URI against the registered templates.
    ///
    /// The template with the fewest placeholders wins; among equals, the one
    /// registered first.
    fn match_template(&self, uri: &str) -> Option<ResolvedCapability> {
        let mut best: Option<(usize, &TemplateSlot, _)> = None;
        for slot in &self.templates {
            let Some(bindings) = slot.template.match_uri(uri) else {
                continue;
            };
            let specificity = slot.template.placeholders().len();
            let better = best
                .as_ref()
                .map_or(true, |(current, _, _)| specificity < *current);
            if better {
                best = Some((specificity, slot, bindings));
            }
        }

        best.map(|(_, slot, bindings)| {
            debug!(uri, template = slot.template.pattern(), "template matched");
            ResolvedCapability {
                entry: Arc::clone(&slot.entry),
                bindings,
            }
        })
    }
}

impl CapabilityResolver for CapabilityRegistry {
    fn resolve(&self, kind: CapabilityKind, address: &str) -> Option<ResolvedCapability> {
        match kind {
            CapabilityKind::ResourceTemplate => self.match_template(address),
            _ => self
                .exact
                .get(&CapabilityAddress::new(kind, address))
                .map(|entry| ResolvedCapability::exact(Arc::clone(entry))),
        }
    }

    fn list(&self, kind: CapabilityKind) -> Vec<Arc<CapabilityEntry>> {
        self.ordered
            .iter()
            .filter(|entry| entry.kind == kind)
            .cloned()
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use warden_contracts::{capability::CapabilityKind, error::GateError};
    use warden_core::{entry::CapabilityEntry, traits::CapabilityResolver};

    use super::CapabilityRegistry;

    fn noop_tool(name: &str) -> CapabilityEntry {
        CapabilityEntry::tool(name, |_| Ok(json!(null)))
    }

    fn template(pattern: &str) -> CapabilityEntry {
        CapabilityEntry::resource_template(pattern, |_| Ok(json!(null)))
    }

    // ── Registration ──────────────────────────────────────────────────────────

    #[test]
    fn test_duplicate_tool_is_rejected() {
        let mut registry = CapabilityRegistry::new();
        registry.register(noop_tool("add")).unwrap();

        match registry.register(noop_tool("add")) {
            Err(GateError::DuplicateCapability { address }) => {
                assert_eq!(address.kind, CapabilityKind::Tool);
                assert_eq!(address.address, "add");
            }
            other => panic!("expected DuplicateCapability, got {:?}", other),
        }
        assert_eq!(registry.len(), 1);
    }

    /// The same address under a different kind is a different capability.
    #[test]
    fn test_same_address_different_kind_is_allowed() {
        let mut registry = CapabilityRegistry::new();
        registry.register(noop_tool("greeting")).unwrap();
        registry
            .register(CapabilityEntry::prompt("greeting", |_| Ok(json!([]))))
            .unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_template_is_rejected() {
        let mut registry = CapabilityRegistry::new();
        registry.register(template("weather://{city}/current")).unwrap();
        assert!(matches!(
            registry.register(template("weather://{city}/current")),
            Err(GateError::DuplicateCapability { .. })
        ));
    }

    #[test]
    fn test_invalid_template_is_rejected_without_side_effects() {
        let mut registry = CapabilityRegistry::new();
        assert!(matches!(
            registry.register(template("weather://{city/current")),
            Err(GateError::InvalidTemplate { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_empty_address_is_rejected() {
        let mut registry = CapabilityRegistry::new();
        assert!(matches!(
            registry.register(noop_tool("  ")),
            Err(GateError::ConfigError { .. })
        ));
    }

    // ── Resolution ────────────────────────────────────────────────────────────

    #[test]
    fn test_exact_resolution_is_kind_scoped() {
        let mut registry = CapabilityRegistry::new();
        registry.register(noop_tool("add")).unwrap();

        let resolved = registry.resolve(CapabilityKind::Tool, "add").unwrap();
        assert_eq!(resolved.entry.address, "add");
        assert!(resolved.bindings.is_empty());

        assert!(registry.resolve(CapabilityKind::Prompt, "add").is_none());
        assert!(registry.resolve(CapabilityKind::Tool, "ADD").is_none());
    }

    #[test]
    fn test_template_resolution_extracts_bindings() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register(template("weather://{city}/{date}/past_weather"))
            .unwrap();

        let resolved = registry
            .resolve(
                CapabilityKind::ResourceTemplate,
                "weather://paris/2024-05-01/past_weather",
            )
            .unwrap();
        assert_eq!(resolved.bindings["city"], "paris");
        assert_eq!(resolved.bindings["date"], "2024-05-01");
    }

    /// Each concrete URI resolves to the one template whose shape it has.
    #[test]
    fn test_templates_with_different_shapes_do_not_overlap() {
        let mut registry = CapabilityRegistry::new();
        registry.register(template("a/{x}/current")).unwrap();
        registry.register(template("a/{x}/{y}/past")).unwrap();

        let current = registry
            .resolve(CapabilityKind::ResourceTemplate, "a/london/current")
            .unwrap();
        assert_eq!(current.entry.address, "a/{x}/current");

        let past = registry
            .resolve(CapabilityKind::ResourceTemplate, "a/london/monday/past")
            .unwrap();
        assert_eq!(past.entry.address, "a/{x}/{y}/past");

        assert!(registry
            .resolve(CapabilityKind::ResourceTemplate, "a/london/monday/current")
            .is_none());
    }

    #[test]
    fn test_fewest_placeholders_wins() {
        let mut registry = CapabilityRegistry::new();
        registry.register(template("docs://{section}/{page}")).unwrap();
        registry.register(template("docs://intro/{page}")).unwrap();

        let resolved = registry
            .resolve(CapabilityKind::ResourceTemplate, "docs://intro/setup")
            .unwrap();
        assert_eq!(resolved.entry.address, "docs://intro/{page}");
        assert_eq!(resolved.bindings.len(), 1);
    }

    #[test]
    fn test_equal_specificity_prefers_first_registered() {
        let mut registry = CapabilityRegistry::new();
        registry.register(template("docs://{section}/index")).unwrap();
        registry.register(template("docs://{page}/index")).unwrap();

        let resolved = registry
            .resolve(CapabilityKind::ResourceTemplate, "docs://guide/index")
            .unwrap();
        assert_eq!(resolved.entry.address, "docs://{section}/index");
    }

    // ── Listing ───────────────────────────────────────────────────────────────

    #[test]
    fn test_list_keeps_registration_order_per_kind() {
        let mut registry = CapabilityRegistry::new();
        registry.register(noop_tool("zeta")).unwrap();
        registry.register(template("weather://{city}/current")).unwrap();
        registry.register(noop_tool("alpha")).unwrap();
        registry.register(noop_tool("mid")).unwrap();

        let names: Vec<String> = registry
            .list(CapabilityKind::Tool)
            .iter()
            .map(|e| e.address.clone())
            .collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
        assert_eq!(registry.list(CapabilityKind::ResourceTemplate).len(), 1);
        assert!(registry.list(CapabilityKind::Prompt).is_empty());
    }

    #[test]
    fn test_register_all_stops_at_first_failure() {
        let mut registry = CapabilityRegistry::new();
        let result = registry.register_all([noop_tool("a"), noop_tool("a"), noop_tool("b")]);
        assert!(result.is_err());
        assert_eq!(registry.len(), 1);
    }
}
