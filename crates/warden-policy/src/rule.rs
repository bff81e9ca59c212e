//! Permission rule types and configuration schema.
//!
//! A `PermissionConfig` is deserialized from TOML. It holds one default per
//! capability kind plus an ordered list of `PermissionRule`s; the first
//! matching rule wins.

use serde::{Deserialize, Serialize};

use warden_contracts::capability::CapabilityKind;

/// Whether each kind of capability asks for user consent when nothing more
/// specific applies.
///
/// Tools are side-effecting by nature and default to `true`; reads and prompt
/// rendering default to `false`.
///
/// ```toml
/// tool = true
/// resource = false
/// resource_template = false
/// prompt = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionDefaults {
    pub tool: bool,
    pub resource: bool,
    pub resource_template: bool,
    pub prompt: bool,
}

impl PermissionDefaults {
    pub fn for_kind(&self, kind: CapabilityKind) -> bool {
        match kind {
            CapabilityKind::Tool => self.tool,
            CapabilityKind::Resource => self.resource,
            CapabilityKind::ResourceTemplate => self.resource_template,
            CapabilityKind::Prompt => self.prompt,
        }
    }
}

impl Default for PermissionDefaults {
    fn default() -> Self {
        Self {
            tool: true,
            resource: false,
            resource_template: false,
            prompt: false,
        }
    }
}

/// An operator rule overriding the kind default for matching capabilities.
///
/// `kind` may be omitted to match every kind; `address = "*"` matches every
/// address.
///
/// ```toml
/// [[rules]]
/// id = "arithmetic-is-harmless"
/// description = "Pure arithmetic tools need no consent"
/// kind = "tool"
/// address = "add_two_numbers"
/// requires_permission = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    /// Stable identifier used in log events.
    pub id: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub kind: Option<CapabilityKind>,

    /// Exact address, URI, or template pattern, or `"*"`.
    pub address: String,

    pub requires_permission: bool,
}

impl PermissionRule {
    /// Case-sensitive exact match, with `"*"` matching any address.
    pub fn matches(&self, kind: CapabilityKind, address: &str) -> bool {
        let kind_matches = self.kind.map_or(true, |k| k == kind);
        let address_matches = self.address == "*" || self.address == address;
        kind_matches && address_matches
    }
}

/// The full permission policy as written in TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionConfig {
    #[serde(flatten)]
    pub defaults: PermissionDefaults,

    /// Evaluated in declaration order. First match wins.
    #[serde(default)]
    pub rules: Vec<PermissionRule>,
}
