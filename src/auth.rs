use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tracing::debug;

use crate::{errors::AppError, AppState};

/// Guards `/mcp` with the static `MCP_API_TOKEN`. This token is unrelated to the
/// SendGrid key used for outbound calls.
pub async fn require_bearer_token(
    State(state): State<AppState>,
    auth_header: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(TypedHeader(auth)) = auth_header else {
        return Err(AppError::unauthorized(
            "missing_token",
            "missing authorization header",
        ));
    };

    if !tokens_match(auth.token(), &state.api_token) {
        debug!(path = %request.uri().path(), "rejected bearer token");
        return Err(AppError::unauthorized(
            "invalid_token",
            "invalid bearer token",
        ));
    }

    Ok(next.run(request).await)
}

/// Compares without short-circuiting on the first differing byte.
fn tokens_match(offered: &str, expected: &str) -> bool {
    let offered = offered.as_bytes();
    let expected = expected.as_bytes();
    if offered.len() != expected.len() {
        return false;
    }

    offered
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (left, right)| diff | (left ^ right))
        == 0
}

#[cfg(test)]
mod tests {
    use super::tokens_match;

    #[test]
    fn matches_identical_tokens_only() {
        assert!(tokens_match("token-1234567890ab", "token-1234567890ab"));
        assert!(!tokens_match("token-1234567890ac", "token-1234567890ab"));
        assert!(!tokens_match("token", "token-1234567890ab"));
        assert!(!tokens_match("", "token-1234567890ab"));
    }
}
