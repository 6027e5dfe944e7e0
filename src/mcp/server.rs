//! The central Model Context Protocol engine
//!
//! Decodes JSON-RPC messages, routes `initialize`, `tools/list` and `tools/call`, and
//! writes one redacted audit line per routed request.

use rust_mcp_sdk::schema::{
    Implementation, InitializeResult, JsonrpcMessage, ListToolsResult, ProtocolVersion,
    ServerCapabilities, ServerCapabilitiesTools,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::tools::{build_tools_list, handle_tools_call};
use crate::mcp::rpc::{
    app_error_to_json_rpc, is_json_rpc_error, json_rpc_error, json_rpc_result,
    request_id_to_value, INVALID_REQUEST,
};
use crate::{errors::AppError, AppState};

pub const SUPPORTED_PROTOCOL_VERSION: &str = "2024-11-05";
/// Name advertised to MCP clients; kept stable independently of the package name.
pub const SERVER_NAME: &str = "sendgrid_mcp";
const MAX_AUDIT_STRING_CHARS: usize = 256;

pub async fn handle_json_rpc_value(state: &AppState, payload: Value) -> Option<Value> {
    if !payload.is_object() {
        return Some(json_rpc_error(None, INVALID_REQUEST, "Invalid Request"));
    }

    let request_id = payload.get("id").cloned();
    let parsed: JsonrpcMessage = match serde_json::from_value(payload) {
        Ok(message) => message,
        Err(_) => return Some(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request")),
    };

    match parsed {
        JsonrpcMessage::Request(request) => {
            let request_id = request_id_to_value(request.id);
            if request.method.trim().is_empty() {
                return Some(json_rpc_error(
                    Some(request_id),
                    INVALID_REQUEST,
                    "Invalid Request",
                ));
            }

            Some(
                handle_json_rpc_request(
                    state,
                    Some(request_id),
                    request.method,
                    request.params.map(Value::Object),
                )
                .await,
            )
        }
        JsonrpcMessage::Notification(notification) => {
            debug!(method = %notification.method, "notification acknowledged");
            None
        }
        JsonrpcMessage::ResultResponse(_) | JsonrpcMessage::ErrorResponse(_) => {
            Some(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request"))
        }
    }
}

pub async fn handle_json_rpc_request(
    state: &AppState,
    id: Option<Value>,
    method: String,
    params: Option<Value>,
) -> Value {
    let audit_params = redact_audit_params(params.as_ref());

    let response = match route(state, &method, params).await {
        Ok(result) => json_rpc_result(id, result),
        Err(err) => app_error_to_json_rpc(id, err),
    };

    let outcome = if is_json_rpc_error(&response) {
        "failure"
    } else if response["result"]["isError"] == Value::Bool(true) {
        "tool_error"
    } else {
        "success"
    };
    info!(
        method = %method,
        params = %audit_params,
        outcome,
        "mcp action audited"
    );

    response
}

/// Maps a method to its handler. Anything other than the three supported methods,
/// notifications included, fails with `MethodNotFound`.
pub async fn route(
    state: &AppState,
    method: &str,
    params: Option<Value>,
) -> Result<Value, AppError> {
    match method {
        "initialize" => to_result_value(initialize_result()),
        "tools/list" => to_result_value(ListToolsResult {
            meta: None,
            next_cursor: None,
            tools: build_tools_list(),
        }),
        "tools/call" => to_result_value(handle_tools_call(state, params).await?),
        other => Err(AppError::method_not_found(other)),
    }
}

/// Fixed capability descriptor; the client's initialize params are not inspected.
pub fn initialize_result() -> InitializeResult {
    InitializeResult {
        server_info: Implementation {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: None,
            description: None,
            icons: vec![],
            website_url: None,
        },
        capabilities: ServerCapabilities {
            tools: Some(ServerCapabilitiesTools { list_changed: None }),
            ..Default::default()
        },
        protocol_version: ProtocolVersion::V2024_11_05.into(),
        instructions: None,
        meta: None,
    }
}

fn to_result_value<T: serde::Serialize>(result: T) -> Result<Value, AppError> {
    serde_json::to_value(result)
        .map_err(|err| AppError::internal(format!("result serialization failed: {err}")))
}

pub fn redact_audit_params(params: Option<&Value>) -> Value {
    params.map(redact_audit_value).unwrap_or(Value::Null)
}

/// Masks sensitive keys and shortens long strings such as template html.
pub fn redact_audit_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (key.clone(), redact_audit_value(item))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_audit_value).collect()),
        Value::String(text) if text.chars().count() > MAX_AUDIT_STRING_CHARS => {
            let kept: String = text.chars().take(MAX_AUDIT_STRING_CHARS).collect();
            Value::String(format!("{kept}…[truncated]"))
        }
        _ => value.clone(),
    }
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "authorization" | "bearer" | "api_key" | "apikey" | "credentials" | "credential"
    ) || normalized.contains("token")
        || normalized.contains("secret")
        || normalized.contains("password")
        || normalized.contains("credential")
}
