//! The parsed request handed to the dispatch pipeline by the transport.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::capability::CapabilityKind;

/// Unique identifier for a single inbound request.
///
/// Appears in every log line the pipeline emits for that request and in the
/// response envelope, so operators can correlate the two.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub uuid::Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Everything the pipeline needs to admit, resolve, and invoke a capability.
///
/// Header parsing and wire framing are the transport's job; by the time a
/// `DispatchRequest` exists they are done.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub request_id: RequestId,
    /// The caller's network address, if the transport knows it.
    pub origin: Option<String>,
    /// The raw bearer credential, without the `Bearer ` prefix.
    pub credential: Option<String>,
    pub kind: CapabilityKind,
    /// A name for tools and prompts, a concrete URI for resources.
    pub address: String,
    /// Call arguments. `Null` is treated as an empty object.
    pub input: serde_json::Value,
}

impl DispatchRequest {
    pub fn new(kind: CapabilityKind, address: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::new(),
            origin: None,
            credential: None,
            kind,
            address: address.into(),
            input: serde_json::Value::Null,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.input = input;
        self
    }
}
