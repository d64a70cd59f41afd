//! HTTP server setup and configuration.

use axum::{
    routing::{get, post},
    Router,
};
use reqwest::Client;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::session::SessionStore;
use crate::config::Config;
use crate::router::Router as ProviderRouter;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ProviderRouter>,
    pub config: Arc<Config>,
    /// Per-client sessions; each is locked for the whole turn, so one
    /// client's turns are processed one at a time.
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(router: ProviderRouter, config: Config) -> Self {
        let sessions = SessionStore::new(config.chat.clone());
        Self {
            router: Arc::new(router),
            config: Arc::new(config),
            sessions: Arc::new(sessions),
        }
    }
}

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/chat", post(handlers::chat))
        .route("/v1/history", get(handlers::history))
        .route(
            "/v1/settings",
            get(handlers::get_settings).put(handlers::update_settings),
        )
        .route("/v1/providers", get(handlers::list_providers))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let listen_addr = config.server.listen.clone();

    // One call per turn, no client-side timeout override
    let http_client = Client::builder().build()?;
    let provider_router = ProviderRouter::new(Arc::new(config.credentials.clone()), http_client);

    let app = create_router(AppState::new(provider_router, config));

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "Starting aether-chat server");

    axum::serve(listener, app).await?;

    Ok(())
}
