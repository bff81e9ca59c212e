//! JSON-RPC 2.0 protocol layer.
//!
//! Maps MCP methods onto the dispatch pipeline. Every request is authorized
//! first, before the body is even parsed, so listings and the handshake are
//! gated exactly like capability calls. Capability-addressing methods then go
//! through `DispatchPipeline::invoke` with the identity already established.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use warden_contracts::{
    auth::AuthContext,
    capability::{CapabilityKind, REQUIRES_PERMISSION},
    envelope::{ResponseEnvelope, Status},
    request::RequestId,
};
use warden_core::{entry::CapabilityEntry, DispatchPipeline};

pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// JSON-RPC 2.0 request. A missing `id` marks a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }

    /// An error carrying the pipeline envelope as `data`.
    pub fn from_envelope(id: Value, envelope: &ResponseEnvelope) -> Self {
        let code = match envelope.status {
            Status::Forbidden => rpc_codes::FORBIDDEN,
            Status::Unauthorized => rpc_codes::UNAUTHORIZED,
            Status::NotFound => rpc_codes::NOT_FOUND,
            Status::InvalidInput => rpc_codes::INVALID_PARAMS,
            Status::InvocationError | Status::Success => rpc_codes::INTERNAL_ERROR,
        };
        let message = envelope
            .reason
            .clone()
            .unwrap_or_else(|| "request failed".to_string());
        let mut response = Self::error(id, code, message);
        if let Some(error) = response.error.as_mut() {
            error.data = serde_json::to_value(envelope).ok();
        }
        response
    }
}

/// Standard JSON-RPC error codes plus the server's own.
pub mod rpc_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    pub const UNAUTHORIZED: i64 = -32001;
    pub const NOT_FOUND: i64 = -32002;
    pub const FORBIDDEN: i64 = -32003;
}

/// What the transport should send back.
#[derive(Debug)]
pub enum Reply {
    /// A JSON-RPC response with HTTP 200.
    Rpc(JsonRpcResponse),
    /// The admission stages rejected the request. `status` is `Forbidden` or
    /// `Unauthorized`.
    Rejected {
        status: Status,
        response: JsonRpcResponse,
    },
    /// A notification was accepted; there is no response body.
    Accepted,
}

/// The MCP method router shared by every connection.
pub struct McpService {
    pipeline: Arc<DispatchPipeline>,
    server_name: String,
}

impl McpService {
    pub fn new(pipeline: Arc<DispatchPipeline>, server_name: impl Into<String>) -> Self {
        Self {
            pipeline,
            server_name: server_name.into(),
        }
    }

    /// Handle one HTTP request body.
    ///
    /// Blocking: the identity verifier may fetch a key set and handlers run
    /// synchronously. Call from a blocking-capable thread.
    pub fn handle(&self, origin: Option<&str>, credential: Option<&str>, body: &[u8]) -> Reply {
        let request_id = RequestId::new();

        let auth = match self.pipeline.authorize(&request_id, origin, credential) {
            Ok(auth) => auth,
            Err(envelope) => {
                return Reply::Rejected {
                    status: envelope.status,
                    response: JsonRpcResponse::from_envelope(Value::Null, &envelope),
                }
            }
        };

        let request: JsonRpcRequest = match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(e) => {
                return Reply::Rpc(JsonRpcResponse::error(
                    Value::Null,
                    rpc_codes::PARSE_ERROR,
                    format!("invalid JSON-RPC request: {e}"),
                ))
            }
        };

        let Some(id) = request.id.clone() else {
            debug!(request_id = %request_id, method = %request.method, "notification accepted");
            return Reply::Accepted;
        };

        if request.jsonrpc != "2.0" {
            return Reply::Rpc(JsonRpcResponse::error(
                id,
                rpc_codes::INVALID_REQUEST,
                "jsonrpc must be \"2.0\"",
            ));
        }

        info!(
            request_id = %request_id,
            subject = %auth.subject,
            method = %request.method,
            "handling request"
        );

        let params = request.params.unwrap_or(Value::Null);
        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.initialize(&params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.list_tools()),
            "resources/list" => Ok(self.list_resources()),
            "resources/templates/list" => Ok(self.list_resource_templates()),
            "prompts/list" => Ok(self.list_prompts()),
            "tools/call" => self.call_tool(request_id, &auth, &params),
            "resources/read" => self.read_resource(request_id, &auth, &params),
            "prompts/get" => self.get_prompt(request_id, &auth, &params),
            other => Err(JsonRpcResponse::error(
                Value::Null,
                rpc_codes::METHOD_NOT_FOUND,
                format!("method '{other}' is not supported"),
            )),
        };

        Reply::Rpc(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(mut response) => {
                response.id = id;
                response
            }
        })
    }

    // ── Handshake ────────────────────────────────────────────────────────────

    fn initialize(&self, params: &Value) -> Value {
        let version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);
        json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "subscribe": false, "listChanged": false },
                "prompts": { "listChanged": false }
            },
            "serverInfo": {
                "name": self.server_name,
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    // ── Listings ─────────────────────────────────────────────────────────────

    fn meta(&self, entry: &CapabilityEntry) -> Value {
        json!({ REQUIRES_PERMISSION: self.pipeline.permissions().requires_permission(entry) })
    }

    fn list_tools(&self) -> Value {
        let tools: Vec<Value> = self
            .pipeline
            .resolver()
            .list(CapabilityKind::Tool)
            .iter()
            .map(|entry| {
                json!({
                    "name": entry.address,
                    "description": entry.description,
                    "inputSchema": entry.input_schema.json_schema,
                    "_meta": self.meta(entry)
                })
            })
            .collect();
        json!({ "tools": tools })
    }

    fn list_resources(&self) -> Value {
        let resources: Vec<Value> = self
            .pipeline
            .resolver()
            .list(CapabilityKind::Resource)
            .iter()
            .map(|entry| {
                json!({
                    "uri": entry.address,
                    "name": entry.name,
                    "description": entry.description,
                    "mimeType": entry.mime_type,
                    "_meta": self.meta(entry)
                })
            })
            .collect();
        json!({ "resources": resources })
    }

    fn list_resource_templates(&self) -> Value {
        let templates: Vec<Value> = self
            .pipeline
            .resolver()
            .list(CapabilityKind::ResourceTemplate)
            .iter()
            .map(|entry| {
                json!({
                    "uriTemplate": entry.address,
                    "name": entry.name,
                    "description": entry.description,
                    "mimeType": entry.mime_type,
                    "_meta": self.meta(entry)
                })
            })
            .collect();
        json!({ "resourceTemplates": templates })
    }

    fn list_prompts(&self) -> Value {
        let prompts: Vec<Value> = self
            .pipeline
            .resolver()
            .list(CapabilityKind::Prompt)
            .iter()
            .map(|entry| {
                let required = entry.input_schema.required_properties();
                let arguments: Vec<Value> = entry
                    .input_schema
                    .properties()
                    .into_iter()
                    .map(|(name, description)| {
                        json!({
                            "name": name,
                            "description": description,
                            "required": required.contains(&name)
                        })
                    })
                    .collect();
                json!({
                    "name": entry.address,
                    "description": entry.description,
                    "arguments": arguments,
                    "_meta": self.meta(entry)
                })
            })
            .collect();
        json!({ "prompts": prompts })
    }

    // ── Capability calls ─────────────────────────────────────────────────────

    fn call_tool(
        &self,
        request_id: RequestId,
        auth: &AuthContext,
        params: &Value,
    ) -> Result<Value, JsonRpcResponse> {
        let name = required_str(params, "name")?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let envelope = self
            .pipeline
            .invoke(request_id, auth, CapabilityKind::Tool, name, arguments);

        match envelope.status {
            Status::Success => {
                let mut result = json!({
                    "content": [{ "type": "text", "text": as_text(&envelope.body) }],
                    "isError": false,
                    "_meta": { REQUIRES_PERMISSION: envelope.requires_permission }
                });
                if envelope.body.is_object() {
                    result["structuredContent"] = envelope.body.clone();
                }
                Ok(result)
            }
            // Tool failures are results, so the model can see and react to them.
            Status::InvocationError => Ok(json!({
                "content": [{
                    "type": "text",
                    "text": envelope.reason.clone().unwrap_or_default()
                }],
                "isError": true
            })),
            _ => Err(JsonRpcResponse::from_envelope(Value::Null, &envelope)),
        }
    }

    fn read_resource(
        &self,
        request_id: RequestId,
        auth: &AuthContext,
        params: &Value,
    ) -> Result<Value, JsonRpcResponse> {
        let uri = required_str(params, "uri")?;

        let envelope = self
            .pipeline
            .invoke(request_id, auth, CapabilityKind::Resource, uri, Value::Null);
        if !envelope.status.is_success() {
            return Err(JsonRpcResponse::from_envelope(Value::Null, &envelope));
        }

        Ok(json!({
            "contents": [{
                "uri": uri,
                "mimeType": envelope.mime_type,
                "text": as_text(&envelope.body)
            }],
            "_meta": { REQUIRES_PERMISSION: envelope.requires_permission }
        }))
    }

    fn get_prompt(
        &self,
        request_id: RequestId,
        auth: &AuthContext,
        params: &Value,
    ) -> Result<Value, JsonRpcResponse> {
        let name = required_str(params, "name")?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let envelope = self
            .pipeline
            .invoke(request_id, auth, CapabilityKind::Prompt, name, arguments);
        if !envelope.status.is_success() {
            return Err(JsonRpcResponse::from_envelope(Value::Null, &envelope));
        }

        let description = self
            .pipeline
            .resolver()
            .resolve(CapabilityKind::Prompt, name)
            .map(|resolved| resolved.entry.description.clone())
            .unwrap_or_default();

        // A handler may return ready-made messages or plain text.
        let messages = match &envelope.body {
            Value::Array(messages) => Value::Array(messages.clone()),
            body => json!([{
                "role": "user",
                "content": { "type": "text", "text": as_text(body) }
            }]),
        };

        Ok(json!({
            "description": description,
            "messages": messages,
            "_meta": { REQUIRES_PERMISSION: envelope.requires_permission }
        }))
    }
}

fn required_str<'a>(params: &'a Value, field: &str) -> Result<&'a str, JsonRpcResponse> {
    params.get(field).and_then(Value::as_str).ok_or_else(|| {
        JsonRpcResponse::error(
            Value::Null,
            rpc_codes::INVALID_PARAMS,
            format!("params.{field} must be a string"),
        )
    })
}

/// Strings pass through; anything else is serialized as JSON.
fn as_text(body: &Value) -> String {
    match body {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use warden_contracts::{envelope::ResponseEnvelope, request::RequestId};

    use super::{as_text, rpc_codes, JsonRpcResponse};

    #[test]
    fn test_envelope_becomes_error_data() {
        let envelope = ResponseEnvelope::invocation_error(RequestId::new(), "boom");
        let response = JsonRpcResponse::from_envelope(json!(7), &envelope);

        let error = response.error.unwrap();
        assert_eq!(error.code, rpc_codes::INTERNAL_ERROR);
        assert_eq!(error.message, "boom");
        assert_eq!(error.data.unwrap()["status"], "invocation_error");
        assert_eq!(response.id, json!(7));
    }

    #[test]
    fn test_as_text() {
        assert_eq!(as_text(&json!("plain")), "plain");
        assert_eq!(as_text(&json!(42)), "42");
        assert_eq!(as_text(&json!({ "a": 1 })), r#"{"a":1}"#);
    }
}
