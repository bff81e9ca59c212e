//! The uniform response envelope produced by every pipeline outcome.
//!
//! Whichever stage terminates a request, the protocol layer receives the
//! same shape: a stable status tag, an optional human-readable reason, and a
//! body. Only `Success` carries the `requires_permission` advisory flag.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    auth::AuthError,
    capability::CapabilityKind,
    request::RequestId,
    schema::ValidationFailure,
};

/// Terminal outcome of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    /// The origin address is not on the allowlist.
    Forbidden,
    /// The bearer credential is missing or failed verification.
    Unauthorized,
    /// No registered capability matches the address.
    NotFound,
    /// The arguments do not satisfy the declared input schema.
    InvalidInput,
    /// The capability's handler failed or panicked.
    InvocationError,
}

impl Status {
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }
}

/// The response shape the protocol layer serializes for every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub request_id: RequestId,
    pub status: Status,
    /// Human-readable explanation. Absent on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Machine-readable sub-reason, e.g. the `AuthError` code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
    /// Whether the client should obtain user consent. Success only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_permission: Option<bool>,
    /// MIME type declared by the entry that served the call. Success only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub body: Value,
}

impl ResponseEnvelope {
    pub fn success(request_id: RequestId, body: Value, requires_permission: bool) -> Self {
        Self {
            request_id,
            status: Status::Success,
            reason: None,
            reason_code: None,
            requires_permission: Some(requires_permission),
            mime_type: None,
            body,
        }
    }

    pub fn with_mime_type(mut self, mime_type: Option<String>) -> Self {
        self.mime_type = mime_type;
        self
    }

    /// The body echoes the rejected origin and nothing else.
    pub fn forbidden(request_id: RequestId, origin: Option<&str>) -> Self {
        let reason = match origin {
            Some(origin) => format!("origin '{origin}' is not allowed"),
            None => "request has no origin address".to_string(),
        };
        Self {
            request_id,
            status: Status::Forbidden,
            reason: Some(reason),
            reason_code: None,
            requires_permission: None,
            mime_type: None,
            body: json!({ "origin": origin }),
        }
    }

    pub fn unauthorized(request_id: RequestId, error: &AuthError) -> Self {
        Self {
            request_id,
            status: Status::Unauthorized,
            reason: Some(error.to_string()),
            reason_code: Some(error.code().to_string()),
            requires_permission: None,
            mime_type: None,
            body: Value::Null,
        }
    }

    pub fn not_found(request_id: RequestId, kind: CapabilityKind, address: &str) -> Self {
        Self {
            request_id,
            status: Status::NotFound,
            reason: Some(format!("no {kind} is registered for '{address}'")),
            reason_code: None,
            requires_permission: None,
            mime_type: None,
            body: json!({ "kind": kind, "address": address }),
        }
    }

    pub fn invalid_input(request_id: RequestId, failures: Vec<ValidationFailure>) -> Self {
        let reason = failures
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            request_id,
            status: Status::InvalidInput,
            reason: Some(reason),
            reason_code: None,
            requires_permission: None,
            mime_type: None,
            body: json!({ "failures": failures }),
        }
    }

    pub fn invocation_error(request_id: RequestId, reason: impl Into<String>) -> Self {
        Self {
            request_id,
            status: Status::InvocationError,
            reason: Some(reason.into()),
            reason_code: None,
            requires_permission: None,
            mime_type: None,
            body: Value::Null,
        }
    }
}
