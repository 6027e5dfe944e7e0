use std::sync::Arc;

use sendgrid_mcp::{
    build_app, config::Config, domain::tools::verify_tool_registry, logging,
    sendgrid_client::HttpSendGridClient, AppState,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    verify_tool_registry()?;

    let provider = Arc::new(HttpSendGridClient::new(&config.sendgrid)?);
    let bind_socket = config.bind_socket()?;
    let state = AppState::new(config.api_token.clone(), provider);
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %config.bind_addr,
        bind_port = config.bind_port,
        sendgrid_base_url = %config.sendgrid.base_url,
        timeout_secs = config.sendgrid.timeout.as_secs(),
        "server starting"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
