//! Capability entries and the handler contract.
//!
//! A `CapabilityEntry` pairs a protocol address with the callable that serves
//! it and the metadata clients see in listings. Entries are built with the
//! kind-specific constructors and `with_*` methods, then handed to the
//! registry during startup.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use warden_contracts::{
    auth::AuthContext,
    capability::{CapabilityAddress, CapabilityKind, Metadata, REQUIRES_PERMISSION},
    request::RequestId,
    schema::InputSchema,
};

/// A failure reported by a capability's handler.
///
/// The message is returned to the client as the `InvocationError` reason, so
/// handlers should phrase it for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Everything a handler receives for one call.
pub struct Invocation<'a> {
    pub request_id: &'a RequestId,
    pub auth: &'a AuthContext,
    /// Validated arguments. For template resources this includes every
    /// placeholder binding as a string argument.
    pub arguments: &'a Map<String, Value>,
    /// Placeholder bindings extracted from a template URI. Empty otherwise.
    pub bindings: &'a BTreeMap<String, String>,
}

impl Invocation<'_> {
    pub fn arg(&self, name: &str) -> Result<&Value, HandlerError> {
        self.arguments
            .get(name)
            .ok_or_else(|| HandlerError::new(format!("missing argument '{name}'")))
    }

    pub fn str_arg(&self, name: &str) -> Result<&str, HandlerError> {
        self.arg(name)?
            .as_str()
            .ok_or_else(|| HandlerError::new(format!("argument '{name}' must be a string")))
    }

    /// Integral floats such as `2.0` count as integers, as they do for the
    /// JSON Schema `integer` type.
    pub fn i64_arg(&self, name: &str) -> Result<i64, HandlerError> {
        let value = self.arg(name)?;
        value
            .as_i64()
            .or_else(|| {
                value
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                    .map(|f| f as i64)
            })
            .ok_or_else(|| HandlerError::new(format!("argument '{name}' must be a 64-bit integer")))
    }

    pub fn f64_arg(&self, name: &str) -> Result<f64, HandlerError> {
        self.arg(name)?
            .as_f64()
            .ok_or_else(|| HandlerError::new(format!("argument '{name}' must be a number")))
    }
}

/// The callable behind a capability.
///
/// Handlers are untrusted from the pipeline's point of view: a returned
/// error or a panic is caught and converted to `InvocationError`.
pub trait Handler: Send + Sync {
    fn call(&self, invocation: &Invocation<'_>) -> Result<Value, HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(&Invocation<'_>) -> Result<Value, HandlerError> + Send + Sync,
{
    fn call(&self, invocation: &Invocation<'_>) -> Result<Value, HandlerError> {
        self(invocation)
    }
}

/// One registered capability.
#[derive(Clone)]
pub struct CapabilityEntry {
    pub kind: CapabilityKind,
    /// Name, URI, or URI pattern depending on `kind`.
    pub address: String,
    /// Human-readable name. Defaults to the address.
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
    /// Advertised content type for resources and resource templates.
    pub mime_type: Option<String>,
    pub metadata: Metadata,
    pub handler: Arc<dyn Handler>,
}

impl CapabilityEntry {
    pub fn new(kind: CapabilityKind, address: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        let address = address.into();
        Self {
            kind,
            name: address.clone(),
            address,
            description: String::new(),
            input_schema: InputSchema::any_object(),
            mime_type: None,
            metadata: Metadata::new(),
            handler,
        }
    }

    pub fn tool<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        Self::new(CapabilityKind::Tool, name, Arc::new(handler))
    }

    pub fn resource<F>(uri: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        Self::new(CapabilityKind::Resource, uri, Arc::new(handler))
    }

    pub fn resource_template<F>(pattern: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        Self::new(CapabilityKind::ResourceTemplate, pattern, Arc::new(handler))
    }

    pub fn prompt<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        Self::new(CapabilityKind::Prompt, name, Arc::new(handler))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_schema(mut self, json_schema: Value) -> Self {
        self.input_schema = InputSchema::new(json_schema);
        self
    }

    pub fn with_input_schema(mut self, schema: InputSchema) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Override the kind's default permission requirement.
    pub fn requires_permission(self, required: bool) -> Self {
        self.with_metadata(REQUIRES_PERMISSION, Value::Bool(required))
    }

    /// The explicit `requires_permission` override, if one was set as a bool.
    pub fn permission_override(&self) -> Option<bool> {
        self.metadata.get(REQUIRES_PERMISSION).and_then(Value::as_bool)
    }

    pub fn key(&self) -> CapabilityAddress {
        CapabilityAddress::new(self.kind, self.address.clone())
    }
}

impl fmt::Debug for CapabilityEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityEntry")
            .field("kind", &self.kind)
            .field("address", &self.address)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .field("mime_type", &self.mime_type)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// A successful registry lookup.
#[derive(Debug, Clone)]
pub struct ResolvedCapability {
    pub entry: Arc<CapabilityEntry>,
    /// Placeholder name → matched text. Empty unless a template matched.
    pub bindings: BTreeMap<String, String>,
}

impl ResolvedCapability {
    pub fn exact(entry: Arc<CapabilityEntry>) -> Self {
        Self {
            entry,
            bindings: BTreeMap::new(),
        }
    }
}
