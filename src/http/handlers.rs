//! Axum HTTP handlers for the web server
//!
//! Provides the MCP endpoint and the public metadata endpoints.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::mcp::rpc::{json_rpc_error, INVALID_REQUEST, PARSE_ERROR};
use crate::mcp::server::{handle_json_rpc_value, SERVER_NAME, SUPPORTED_PROTOCOL_VERSION};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub protocol_version: &'static str,
    pub mcp_endpoint: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn discovery() -> Json<DiscoveryResponse> {
    Json(DiscoveryResponse {
        name: SERVER_NAME,
        version: env!("CARGO_PKG_VERSION"),
        protocol_version: SUPPORTED_PROTOCOL_VERSION,
        mcp_endpoint: "/mcp",
    })
}

/// Single messages and batches are both accepted. A payload made only of
/// notifications is answered with `204 No Content`.
pub async fn mcp_endpoint(State(state): State<AppState>, body: Bytes) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => {
            return (
                StatusCode::OK,
                Json(json_rpc_error(None, PARSE_ERROR, "Parse error")),
            )
                .into_response()
        }
    };

    let Value::Array(batch) = payload else {
        return match handle_json_rpc_value(&state, payload).await {
            Some(response) => (StatusCode::OK, Json(response)).into_response(),
            None => StatusCode::NO_CONTENT.into_response(),
        };
    };

    if batch.is_empty() {
        return (
            StatusCode::OK,
            Json(vec![json_rpc_error(None, INVALID_REQUEST, "Invalid Request")]),
        )
            .into_response();
    }

    let mut responses = Vec::with_capacity(batch.len());
    for item in batch {
        if let Some(response) = handle_json_rpc_value(&state, item).await {
            responses.push(response);
        }
    }

    if responses.is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }

    (StatusCode::OK, Json(Value::Array(responses))).into_response()
}
