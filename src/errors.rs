use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unauthorized: {message}")]
    Unauthorized {
        code: &'static str,
        message: &'static str,
    },
    #[error("bad request: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("method not found: {method}")]
    MethodNotFound { method: String },
    #[error("upstream error: {message}")]
    Upstream { code: &'static str, message: String },
    #[error("internal error")]
    Internal { code: &'static str, message: String },
}

/// Failures talking to the SendGrid REST API.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to SendGrid failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("SendGrid returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected SendGrid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid SendGrid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("SendGrid API key contains characters not allowed in a header")]
    InvalidApiKey,
    #[error("template {template_id} has no versions")]
    NoVersions { template_id: String },
}

impl ProviderError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "provider_unreachable",
            Self::Status { .. } => "provider_status",
            Self::Decode(_) => "provider_decode",
            Self::InvalidUrl(_) | Self::InvalidApiKey => "provider_config",
            Self::NoVersions { .. } => "template_has_no_versions",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl AppError {
    pub fn unauthorized(code: &'static str, message: &'static str) -> Self {
        Self::Unauthorized { code, message }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            method: method.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: "internal_error",
            message: message.into(),
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        Self::Upstream {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Unauthorized { code, message } => {
                (StatusCode::UNAUTHORIZED, code, message.to_string())
            }
            Self::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            Self::MethodNotFound { method } => (
                StatusCode::NOT_FOUND,
                "method_not_found",
                format!("method not found: {method}"),
            ),
            Self::Upstream { code, message } => {
                tracing::warn!(error = %message, "request failed upstream");
                (StatusCode::BAD_GATEWAY, code, message)
            }
            Self::Internal { code, message } => {
                tracing::error!(error = %message, "request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    code,
                    "internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                code: code.to_string(),
                message,
                details: json!({}),
            }),
        )
            .into_response()
    }
}
