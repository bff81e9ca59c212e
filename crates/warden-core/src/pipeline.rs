//! The Warden dispatch pipeline: the admission-ordered request runner.
//!
//! The pipeline enforces the Warden request model:
//!
//!   Origin → Credential → Resolve → Validate → Permission → [Handler::call]
//!
//! The security invariant is absolute: `Handler::call()` is NEVER reached
//! unless the origin was admitted, the credential verified, the address
//! resolved, and the arguments validated. The code path to `call()` is only
//! reachable after all four checks pass.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use warden_contracts::{
    auth::{AuthContext, AuthError},
    capability::CapabilityKind,
    envelope::ResponseEnvelope,
    request::{DispatchRequest, RequestId},
    schema::ValidationFailure,
};

use crate::entry::{Invocation, ResolvedCapability};
use crate::traits::{CapabilityResolver, IdentityVerifier, InputValidator, NetworkGate, PermissionPolicy};

/// Reason returned to the client when a handler panics. The panic payload
/// itself stays in the server log.
const PANIC_REASON: &str = "capability failed unexpectedly";

/// The central pipeline shared by every request.
///
/// Construct one pipeline at startup and share it behind an `Arc`. All
/// components are read-only after construction, so concurrent dispatches
/// need no synchronization.
pub struct DispatchPipeline {
    gate: Arc<dyn NetworkGate>,
    verifier: Arc<dyn IdentityVerifier>,
    resolver: Arc<dyn CapabilityResolver>,
    validator: Arc<dyn InputValidator>,
    permissions: Arc<dyn PermissionPolicy>,
}

impl DispatchPipeline {
    pub fn new(
        gate: Arc<dyn NetworkGate>,
        verifier: Arc<dyn IdentityVerifier>,
        resolver: Arc<dyn CapabilityResolver>,
        validator: Arc<dyn InputValidator>,
        permissions: Arc<dyn PermissionPolicy>,
    ) -> Self {
        Self {
            gate,
            verifier,
            resolver,
            validator,
            permissions,
        }
    }

    /// The resolver, for protocol-level discovery listings.
    pub fn resolver(&self) -> &dyn CapabilityResolver {
        self.resolver.as_ref()
    }

    /// The permission policy, so listings can advertise the same flag the
    /// envelope carries.
    pub fn permissions(&self) -> &dyn PermissionPolicy {
        self.permissions.as_ref()
    }

    /// Run a request through every stage.
    ///
    /// # Pipeline
    ///
    /// 1. `authorize()`: network gate, then identity verifier
    /// 2. `invoke()`: resolve, validate, annotate, call
    ///
    /// Never fails: every outcome, including a panicking handler, is an
    /// envelope.
    pub fn dispatch(&self, request: DispatchRequest) -> ResponseEnvelope {
        let DispatchRequest {
            request_id,
            origin,
            credential,
            kind,
            address,
            input,
        } = request;

        match self.authorize(&request_id, origin.as_deref(), credential.as_deref()) {
            Ok(auth) => self.invoke(request_id, &auth, kind, &address, input),
            Err(envelope) => envelope,
        }
    }

    /// Run only the admission stages.
    ///
    /// Protocol layers call this directly for requests that do not address
    /// a capability (handshake, listings) so they are gated identically.
    ///
    /// # Errors
    ///
    /// Returns the terminal `Forbidden` or `Unauthorized` envelope.
    pub fn authorize(
        &self,
        request_id: &RequestId,
        origin: Option<&str>,
        credential: Option<&str>,
    ) -> Result<AuthContext, ResponseEnvelope> {
        // ── Stage 1: Network gate ────────────────────────────────────────────
        //
        // A rejected origin never reaches the verifier.
        if !self.gate.admit(origin) {
            warn!(
                request_id = %request_id,
                origin = origin.unwrap_or("<none>"),
                "origin rejected by allowlist"
            );
            return Err(ResponseEnvelope::forbidden(request_id.clone(), origin));
        }

        // ── Stage 2: Identity verification ───────────────────────────────────
        let result = match credential {
            Some(credential) if !credential.trim().is_empty() => {
                self.verifier.verify(credential.trim())
            }
            _ => Err(AuthError::Missing),
        };

        match result {
            Ok(auth) => {
                debug!(
                    request_id = %request_id,
                    subject = %auth.subject,
                    "credential verified"
                );
                Ok(auth)
            }
            Err(error) => {
                warn!(
                    request_id = %request_id,
                    reason_code = error.code(),
                    "credential rejected"
                );
                if let AuthError::KeySetUnavailable { reason } = &error {
                    warn!(request_id = %request_id, %reason, "published key set unavailable");
                }
                Err(ResponseEnvelope::unauthorized(request_id.clone(), &error))
            }
        }
    }

    /// Resolve, validate, and call a capability for an already-admitted caller.
    pub fn invoke(
        &self,
        request_id: RequestId,
        auth: &AuthContext,
        kind: CapabilityKind,
        address: &str,
        input: Value,
    ) -> ResponseEnvelope {
        // ── Stage 3: Resolution ──────────────────────────────────────────────
        //
        // Resource reads address fixed URIs and templates alike; an exact
        // resource always wins over a template.
        let resolved = match kind {
            CapabilityKind::Resource => self
                .resolver
                .resolve(CapabilityKind::Resource, address)
                .or_else(|| self.resolver.resolve(CapabilityKind::ResourceTemplate, address)),
            other => self.resolver.resolve(other, address),
        };

        let Some(ResolvedCapability { entry, bindings }) = resolved else {
            info!(
                request_id = %request_id,
                kind = %kind,
                address = %address,
                "no capability matched"
            );
            return ResponseEnvelope::not_found(request_id, kind, address);
        };

        debug!(
            request_id = %request_id,
            kind = %entry.kind,
            address = %entry.address,
            bindings = bindings.len(),
            "capability resolved"
        );

        // ── Stage 4: Input validation ────────────────────────────────────────
        let arguments = match build_arguments(input, &bindings) {
            Ok(arguments) => arguments,
            Err(failure) => {
                warn!(request_id = %request_id, address = %entry.address, "arguments are not an object");
                return ResponseEnvelope::invalid_input(request_id, vec![failure]);
            }
        };

        let report = self
            .validator
            .validate(&Value::Object(arguments.clone()), &entry.input_schema);
        if !report.passed {
            warn!(
                request_id = %request_id,
                address = %entry.address,
                failures = report.failures.len(),
                "input validation failed"
            );
            return ResponseEnvelope::invalid_input(request_id, report.failures);
        }

        // ── Stage 5: Permission annotation ───────────────────────────────────
        //
        // Advisory only. The client owns the consent prompt.
        let requires_permission = self.permissions.requires_permission(&entry);

        // ── Stage 6: Invocation ──────────────────────────────────────────────
        //
        // Only reachable after every gate above has passed. This is the ONLY
        // call site for Handler::call() in the server.
        let invocation = Invocation {
            request_id: &request_id,
            auth,
            arguments: &arguments,
            bindings: &bindings,
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| entry.handler.call(&invocation)));

        match outcome {
            Ok(Ok(body)) => {
                info!(
                    request_id = %request_id,
                    kind = %entry.kind,
                    address = %entry.address,
                    requires_permission,
                    "capability invoked"
                );
                ResponseEnvelope::success(request_id, body, requires_permission)
                    .with_mime_type(entry.mime_type.clone())
            }
            Ok(Err(error)) => {
                warn!(
                    request_id = %request_id,
                    address = %entry.address,
                    error = %error,
                    "capability returned an error"
                );
                ResponseEnvelope::invocation_error(request_id, error.message)
            }
            Err(payload) => {
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                warn!(
                    request_id = %request_id,
                    address = %entry.address,
                    panic = %detail,
                    "capability panicked"
                );
                ResponseEnvelope::invocation_error(request_id, PANIC_REASON)
            }
        }
    }
}

/// Merge template bindings into the caller's input object.
///
/// `Null` input becomes an empty object; any other non-object is rejected.
/// Bindings override same-named input keys because the URI is authoritative.
fn build_arguments(
    input: Value,
    bindings: &BTreeMap<String, String>,
) -> Result<Map<String, Value>, ValidationFailure> {
    let mut arguments = match input {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        _ => {
            return Err(ValidationFailure {
                path: String::new(),
                message: "arguments must be a JSON object".to_string(),
            })
        }
    };
    for (name, value) in bindings {
        arguments.insert(name.clone(), Value::String(value.clone()));
    }
    Ok(arguments)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use chrono::{Duration, Utc};
    use serde_json::{json, Value};

    use warden_contracts::{
        auth::{AuthContext, AuthError},
        capability::CapabilityKind,
        envelope::Status,
        request::DispatchRequest,
        schema::{InputSchema, ValidationFailure, ValidationReport},
    };

    use crate::entry::{CapabilityEntry, HandlerError, ResolvedCapability};
    use crate::traits::{
        CapabilityResolver, IdentityVerifier, InputValidator, NetworkGate, PermissionPolicy,
    };

    use super::DispatchPipeline;

    // ── Mock helpers ─────────────────────────────────────────────────────────

    /// Admits exactly the listed origins.
    struct MockGate {
        allowed: Vec<&'static str>,
    }

    impl NetworkGate for MockGate {
        fn admit(&self, origin: Option<&str>) -> bool {
            origin.is_some_and(|o| self.allowed.contains(&o))
        }
    }

    /// Accepts the credential "good" and counts every call.
    struct MockVerifier {
        calls: Arc<AtomicUsize>,
    }

    impl MockVerifier {
        fn new() -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl IdentityVerifier for MockVerifier {
        fn verify(&self, credential: &str) -> Result<AuthContext, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match credential {
                "good" => Ok(AuthContext {
                    subject: "test-user".to_string(),
                    issuer: None,
                    audience: vec![],
                    claims: serde_json::Map::new(),
                    expires_at: Utc::now() + Duration::hours(1),
                }),
                "expired" => Err(AuthError::Expired),
                _ => Err(AuthError::InvalidSignature),
            }
        }
    }

    /// Exact-match lookup plus a single hard-coded template for `weather://`.
    struct MockResolver {
        entries: HashMap<(CapabilityKind, String), Arc<CapabilityEntry>>,
        lookups: Arc<Mutex<Vec<(CapabilityKind, String)>>>,
    }

    impl MockResolver {
        fn new(entries: Vec<CapabilityEntry>) -> Self {
            Self {
                entries: entries
                    .into_iter()
                    .map(|e| ((e.kind, e.address.clone()), Arc::new(e)))
                    .collect(),
                lookups: Arc::new(Mutex::new(vec![])),
            }
        }
    }

    impl CapabilityResolver for MockResolver {
        fn resolve(&self, kind: CapabilityKind, address: &str) -> Option<ResolvedCapability> {
            self.lookups.lock().unwrap().push((kind, address.to_string()));
            if kind == CapabilityKind::ResourceTemplate {
                let city = address.strip_prefix("weather://")?.strip_suffix("/current")?;
                let entry = self
                    .entries
                    .get(&(kind, "weather://{city}/current".to_string()))?
                    .clone();
                let mut bindings = BTreeMap::new();
                bindings.insert("city".to_string(), city.to_string());
                return Some(ResolvedCapability { entry, bindings });
            }
            self.entries
                .get(&(kind, address.to_string()))
                .cloned()
                .map(ResolvedCapability::exact)
        }

        fn list(&self, kind: CapabilityKind) -> Vec<Arc<CapabilityEntry>> {
            self.entries.values().filter(|e| e.kind == kind).cloned().collect()
        }
    }

    /// Fails when any `required` name is absent from the arguments.
    struct MockValidator;

    impl InputValidator for MockValidator {
        fn validate(&self, arguments: &Value, schema: &InputSchema) -> ValidationReport {
            let failures = schema
                .required_properties()
                .into_iter()
                .filter(|name| arguments.get(*name).is_none())
                .map(|name| ValidationFailure {
                    path: String::new(),
                    message: format!("'{name}' is a required property"),
                })
                .collect();
            ValidationReport::from_failures(failures)
        }
    }

    /// Tools require permission, everything else does not, metadata wins.
    struct MockPermissions;

    impl PermissionPolicy for MockPermissions {
        fn requires_permission(&self, entry: &CapabilityEntry) -> bool {
            entry
                .permission_override()
                .unwrap_or(entry.kind == CapabilityKind::Tool)
        }
    }

    fn add_tool() -> CapabilityEntry {
        CapabilityEntry::tool("add", |inv| {
            Ok(json!(inv.i64_arg("a")? + inv.i64_arg("b")?))
        })
        .with_schema(json!({
            "type": "object",
            "properties": { "a": { "type": "integer" }, "b": { "type": "integer" } },
            "required": ["a", "b"]
        }))
    }

    fn make_pipeline(
        entries: Vec<CapabilityEntry>,
    ) -> (DispatchPipeline, Arc<AtomicUsize>, Arc<Mutex<Vec<(CapabilityKind, String)>>>) {
        let verifier = MockVerifier::new();
        let calls = verifier.calls.clone();
        let resolver = MockResolver::new(entries);
        let lookups = resolver.lookups.clone();
        let pipeline = DispatchPipeline::new(
            Arc::new(MockGate { allowed: vec!["10.0.0.1"] }),
            Arc::new(verifier),
            Arc::new(resolver),
            Arc::new(MockValidator),
            Arc::new(MockPermissions),
        );
        (pipeline, calls, lookups)
    }

    fn request(kind: CapabilityKind, address: &str, input: Value) -> DispatchRequest {
        DispatchRequest::new(kind, address)
            .with_origin("10.0.0.1")
            .with_credential("good")
            .with_input(input)
    }

    // ── Test cases ────────────────────────────────────────────────────────────

    /// Core security test: a rejected origin must never reach the verifier.
    #[test]
    fn test_forbidden_origin_skips_verifier() {
        let (pipeline, verify_calls, lookups) = make_pipeline(vec![add_tool()]);

        let req = request(CapabilityKind::Tool, "add", json!({ "a": 1, "b": 2 }))
            .with_origin("10.0.0.2");
        let env = pipeline.dispatch(req);

        assert_eq!(env.status, Status::Forbidden);
        assert_eq!(env.body, json!({ "origin": "10.0.0.2" }));
        assert_eq!(verify_calls.load(Ordering::SeqCst), 0, "verify() must not run for a forbidden origin");
        assert!(lookups.lock().unwrap().is_empty(), "registry must not be consulted");
    }

    #[test]
    fn test_missing_origin_is_forbidden() {
        let (pipeline, _, _) = make_pipeline(vec![add_tool()]);
        let mut req = request(CapabilityKind::Tool, "add", json!({ "a": 1, "b": 2 }));
        req.origin = None;

        let env = pipeline.dispatch(req);
        assert_eq!(env.status, Status::Forbidden);
        assert_eq!(env.body, json!({ "origin": null }));
    }

    #[test]
    fn test_missing_credential_is_unauthorized() {
        let (pipeline, verify_calls, _) = make_pipeline(vec![add_tool()]);
        let mut req = request(CapabilityKind::Tool, "add", json!({ "a": 1, "b": 2 }));
        req.credential = None;

        let env = pipeline.dispatch(req);
        assert_eq!(env.status, Status::Unauthorized);
        assert_eq!(env.reason_code.as_deref(), Some("missing"));
        assert_eq!(verify_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_auth_error_code_is_surfaced() {
        let (pipeline, _, lookups) = make_pipeline(vec![add_tool()]);
        let req = request(CapabilityKind::Tool, "add", json!({ "a": 1, "b": 2 }))
            .with_credential("expired");

        let env = pipeline.dispatch(req);
        assert_eq!(env.status, Status::Unauthorized);
        assert_eq!(env.reason_code.as_deref(), Some("expired"));
        assert!(lookups.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_tool_is_not_found() {
        let (pipeline, _, _) = make_pipeline(vec![add_tool()]);
        let env = pipeline.dispatch(request(CapabilityKind::Tool, "subtract", Value::Null));

        assert_eq!(env.status, Status::NotFound);
        assert!(env.reason.unwrap().contains("subtract"));
    }

    #[test]
    fn test_successful_tool_call_carries_permission_flag() {
        let (pipeline, verify_calls, _) = make_pipeline(vec![add_tool()]);
        let env = pipeline.dispatch(request(CapabilityKind::Tool, "add", json!({ "a": 2, "b": 3 })));

        assert_eq!(env.status, Status::Success);
        assert_eq!(env.body, json!(5));
        assert_eq!(env.requires_permission, Some(true));
        assert_eq!(verify_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_metadata_override_appears_in_envelope() {
        let tool = add_tool().requires_permission(false);
        let resource = CapabilityEntry::resource("resource://hello", |_| Ok(json!("hi")))
            .requires_permission(true);
        let (pipeline, _, _) = make_pipeline(vec![tool, resource]);

        let env = pipeline.dispatch(request(CapabilityKind::Tool, "add", json!({ "a": 1, "b": 1 })));
        assert_eq!(env.requires_permission, Some(false));

        let env = pipeline.dispatch(request(CapabilityKind::Resource, "resource://hello", Value::Null));
        assert_eq!(env.requires_permission, Some(true));
    }

    #[test]
    fn test_missing_argument_is_invalid_input_and_handler_not_called() {
        let called = Arc::new(AtomicUsize::new(0));
        let counter = called.clone();
        let tool = CapabilityEntry::tool("echo", move |inv| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(inv.arg("text")?.clone())
        })
        .with_input_schema(InputSchema::required_strings(&["text"]));
        let (pipeline, _, _) = make_pipeline(vec![tool]);

        let env = pipeline.dispatch(request(CapabilityKind::Tool, "echo", json!({})));
        assert_eq!(env.status, Status::InvalidInput);
        assert_eq!(called.load(Ordering::SeqCst), 0, "handler must not run on invalid input");
    }

    #[test]
    fn test_non_object_input_is_invalid() {
        let (pipeline, _, _) = make_pipeline(vec![add_tool()]);
        let env = pipeline.dispatch(request(CapabilityKind::Tool, "add", json!([1, 2])));

        assert_eq!(env.status, Status::InvalidInput);
        assert!(env.reason.unwrap().contains("JSON object"));
    }

    #[test]
    fn test_handler_error_is_invocation_error() {
        let tool = CapabilityEntry::tool("fail", |_| Err(HandlerError::new("division by zero")));
        let (pipeline, _, _) = make_pipeline(vec![tool]);

        let env = pipeline.dispatch(request(CapabilityKind::Tool, "fail", Value::Null));
        assert_eq!(env.status, Status::InvocationError);
        assert_eq!(env.reason.as_deref(), Some("division by zero"));
    }

    /// A panicking handler is contained and later requests still succeed.
    #[test]
    fn test_panicking_handler_does_not_poison_pipeline() {
        let boom = CapabilityEntry::tool("boom", |_| panic!("secret internal detail"));
        let (pipeline, _, _) = make_pipeline(vec![boom, add_tool()]);

        let env = pipeline.dispatch(request(CapabilityKind::Tool, "boom", Value::Null));
        assert_eq!(env.status, Status::InvocationError);
        assert!(
            !env.reason.as_deref().unwrap_or_default().contains("secret internal detail"),
            "panic payload must not reach the client"
        );

        let env = pipeline.dispatch(request(CapabilityKind::Tool, "add", json!({ "a": 4, "b": 4 })));
        assert_eq!(env.status, Status::Success);
        assert_eq!(env.body, json!(8));
    }

    #[test]
    fn test_resource_read_falls_back_to_template() {
        let template = CapabilityEntry::resource_template("weather://{city}/current", |inv| {
            Ok(json!({ "city": inv.str_arg("city")?, "temperature": 20 }))
        })
        .with_input_schema(InputSchema::required_strings(&["city"]))
        .with_mime_type("application/json");
        let (pipeline, _, lookups) = make_pipeline(vec![template]);

        let env = pipeline.dispatch(request(
            CapabilityKind::Resource,
            "weather://london/current",
            Value::Null,
        ));

        assert_eq!(env.status, Status::Success);
        assert_eq!(env.body["city"], "london");
        assert_eq!(env.requires_permission, Some(false));
        assert_eq!(env.mime_type.as_deref(), Some("application/json"));

        let lookups = lookups.lock().unwrap();
        assert_eq!(lookups[0].0, CapabilityKind::Resource);
        assert_eq!(lookups[1].0, CapabilityKind::ResourceTemplate);
    }

    #[test]
    fn test_bindings_override_input_arguments() {
        let template = CapabilityEntry::resource_template("weather://{city}/current", |inv| {
            Ok(json!(inv.str_arg("city")?))
        });
        let (pipeline, _, _) = make_pipeline(vec![template]);

        let env = pipeline.dispatch(request(
            CapabilityKind::Resource,
            "weather://paris/current",
            json!({ "city": "rome" }),
        ));
        assert_eq!(env.body, json!("paris"));
    }

    #[test]
    fn test_authorize_alone_returns_context() {
        let (pipeline, verify_calls, _) = make_pipeline(vec![]);
        let auth = pipeline
            .authorize(&Default::default(), Some("10.0.0.1"), Some("  good  "))
            .unwrap();

        assert_eq!(auth.subject, "test-user");
        assert_eq!(verify_calls.load(Ordering::SeqCst), 1);
    }
}
