//! Core trait definitions for the Warden dispatch pipeline.
//!
//! These five traits define the complete admission boundary:
//!
//! - `NetworkGate`: origin allowlist (evaluated first)
//! - `IdentityVerifier`: bearer credential check
//! - `CapabilityResolver`: address → entry lookup
//! - `InputValidator`: argument check against the declared schema
//! - `PermissionPolicy`: advisory consent flag for the response
//!
//! The pipeline wires them together in that order. A handler is never called
//! unless every gate before it has passed.

use std::sync::Arc;

use warden_contracts::{
    auth::{AuthContext, AuthError},
    capability::CapabilityKind,
    schema::{InputSchema, ValidationReport},
};

use crate::entry::{CapabilityEntry, ResolvedCapability};

/// The origin gate: decides whether a caller's address may proceed at all.
///
/// Must be cheap and side-effect free. It runs before credential
/// verification so excluded networks never cost a signature check.
pub trait NetworkGate: Send + Sync {
    /// Return true if `origin` is admitted. `None` means the transport could
    /// not determine the caller's address.
    fn admit(&self, origin: Option<&str>) -> bool;
}

/// Validates a bearer credential and produces the request's identity.
pub trait IdentityVerifier: Send + Sync {
    /// Verify `credential` (without the `Bearer ` prefix).
    ///
    /// Implementations must not log the credential or any key material, and
    /// must not retry a failed key-set fetch within one call.
    fn verify(&self, credential: &str) -> Result<AuthContext, AuthError>;
}

/// Maps protocol addresses to registered entries.
///
/// Resolution must never mutate the underlying registry.
pub trait CapabilityResolver: Send + Sync {
    /// Look up `address` among capabilities of `kind`.
    ///
    /// For `ResourceTemplate`, `address` is a concrete URI and the result
    /// carries the extracted placeholder bindings.
    fn resolve(&self, kind: CapabilityKind, address: &str) -> Option<ResolvedCapability>;

    /// Every entry of `kind`, in registration order.
    fn list(&self, kind: CapabilityKind) -> Vec<Arc<CapabilityEntry>>;
}

/// Checks call arguments against a declared input schema.
pub trait InputValidator: Send + Sync {
    fn validate(&self, arguments: &serde_json::Value, schema: &InputSchema) -> ValidationReport;
}

/// Decides whether the client should ask its user before invoking an entry.
///
/// Purely advisory: the result is attached to the response, never enforced.
pub trait PermissionPolicy: Send + Sync {
    fn requires_permission(&self, entry: &CapabilityEntry) -> bool;
}
