//! Capability addressing types.
//!
//! Every capability the server hosts is identified by its kind and a
//! protocol-level address. Addresses are unique within their kind; the
//! registry rejects a second registration under the same key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The metadata key that overrides a capability's default permission
/// requirement. Its value must be a JSON boolean.
pub const REQUIRES_PERMISSION: &str = "requires_permission";

/// Arbitrary key/value metadata attached to a capability entry.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// The four families of capability a client can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    /// A named operation with a declared input schema.
    Tool,
    /// A data endpoint addressed by a fixed URI.
    Resource,
    /// A URI pattern with `{name}` placeholders resolved per request.
    ResourceTemplate,
    /// A named text template returned for client-side use.
    Prompt,
}

impl CapabilityKind {
    /// Stable lowercase tag used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Tool => "tool",
            CapabilityKind::Resource => "resource",
            CapabilityKind::ResourceTemplate => "resource_template",
            CapabilityKind::Prompt => "prompt",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The identifying key of a capability: its kind plus its address.
///
/// For tools and prompts the address is a plain name, for resources a literal
/// URI, and for resource templates the URI pattern itself
/// (e.g. `weather://{city}/current`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityAddress {
    pub kind: CapabilityKind,
    pub address: String,
}

impl CapabilityAddress {
    pub fn new(kind: CapabilityKind, address: impl Into<String>) -> Self {
        Self {
            kind,
            address: address.into(),
        }
    }
}

impl fmt::Display for CapabilityAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.address)
    }
}
