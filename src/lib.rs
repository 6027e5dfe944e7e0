use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod sendgrid_client;

use sendgrid_client::EmailProvider;

#[derive(Clone)]
pub struct AppState {
    pub api_token: Arc<str>,
    pub email_provider: Arc<dyn EmailProvider>,
}

impl AppState {
    pub fn new(api_token: String, email_provider: Arc<dyn EmailProvider>) -> Self {
        Self {
            api_token: Arc::<str>::from(api_token),
            email_provider,
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/mcp", post(http::handlers::mcp_endpoint))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer_token,
        ));

    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/.well-known/mcp", get(http::handlers::discovery))
        .merge(protected)
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}
