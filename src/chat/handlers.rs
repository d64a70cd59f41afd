//! HTTP request handlers.
//!
//! Session-scoped endpoints read the session id from the `x-session-id`
//! header and echo it back; a request without one starts a new session.

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::server::AppState;
use super::session::{resolve_model, ChatSettings, Role, SettingsUpdate, SharedSession};
use crate::error::Error;
use crate::providers::Provider;
use crate::router::{FailureKind, InvocationRequest, RoutingMode};

/// Header carrying the chat session id.
pub const SESSION_HEADER: &str = "x-session-id";

/// Body of POST /v1/chat. Absent fields fall back to the session settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub enterprise_mode: Option<bool>,
}

/// Assistant turn returned by POST /v1/chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub request_id: String,
    pub session_id: String,
    pub role: Role,
    pub response: String,
    pub provider: Provider,
    pub model: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

/// Look up (or start) the session named by the request headers.
fn session_for(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(Uuid, SharedSession), Error> {
    let id = match headers.get(SESSION_HEADER) {
        Some(value) => {
            let id = value
                .to_str()
                .ok()
                .and_then(|v| Uuid::parse_str(v.trim()).ok())
                .ok_or_else(|| {
                    Error::BadRequest(format!("Header '{}' must be a UUID", SESSION_HEADER))
                })?;
            Some(id)
        }
        None => None,
    };
    Ok(state.sessions.get_or_create(id))
}

fn with_session_header(session_id: Uuid, body: impl IntoResponse) -> Response {
    ([(SESSION_HEADER, session_id.to_string())], body).into_response()
}

/// Handle POST /v1/chat
pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Response, Error> {
    let request_id = Uuid::new_v4().to_string();
    let (session_id, session) = session_for(&state, &headers)?;
    let mut session = session.lock().await;
    let settings = session.settings().clone();

    let provider = match request.provider.as_deref() {
        Some(selector) => selector.parse::<Provider>()?,
        None => settings.provider,
    };
    let enterprise_mode = request.enterprise_mode.unwrap_or(settings.enterprise_mode);
    let requested_model = request.model.as_deref().unwrap_or(&settings.model);
    let model = resolve_model(&state.config, provider, Some(requested_model))?;

    tracing::info!(
        request_id = %request_id,
        session_id = %session_id,
        provider = %provider,
        model = %model,
        enterprise_mode,
        "Received chat turn"
    );

    session.push(Role::User, request.prompt.clone());

    let invocation =
        InvocationRequest::new(request.prompt, provider.as_str(), model.clone(), enterprise_mode);
    let result = state.router.invoke(&invocation).await;
    let failure = result.failure_kind();
    let response = result.into_text();

    session.push(Role::Assistant, response.clone());

    let reply = ChatReply {
        request_id,
        session_id: session_id.to_string(),
        role: Role::Assistant,
        response,
        provider,
        model,
        success: failure.is_none(),
        failure,
    };
    Ok(with_session_header(session_id, Json(reply)))
}

/// Handle GET /v1/history
pub async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    let (session_id, session) = session_for(&state, &headers)?;
    let session = session.lock().await;
    let body = Json(serde_json::json!({
        "session_id": session_id.to_string(),
        "messages": session.messages()
    }));
    Ok(with_session_header(session_id, body))
}

/// Handle GET /v1/settings
pub async fn get_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    let (session_id, session) = session_for(&state, &headers)?;
    let settings: ChatSettings = session.lock().await.settings().clone();
    Ok(with_session_header(session_id, Json(settings)))
}

/// Handle PUT /v1/settings
pub async fn update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<SettingsUpdate>,
) -> Result<Response, Error> {
    let (session_id, session) = session_for(&state, &headers)?;
    let mut session = session.lock().await;
    session.update_settings(&state.config.chat, update)?;
    tracing::info!(
        session_id = %session_id,
        settings = ?session.settings(),
        "Updated chat settings"
    );
    Ok(with_session_header(session_id, Json(session.settings().clone())))
}

/// Handle GET /v1/providers
pub async fn list_providers(State(state): State<AppState>) -> impl IntoResponse {
    let config = &state.config;
    let providers: Vec<serde_json::Value> = state
        .router
        .providers()
        .into_iter()
        .map(|p| {
            let models: Vec<String> = match p {
                Provider::GoogleGenerativeAi => config.chat.gemini_models.clone(),
                Provider::AzureOpenAi => {
                    config.credentials.azure_deployment.iter().cloned().collect()
                }
            };
            serde_json::json!({
                "name": p,
                "models": models,
                "direct": config.credentials.has_route(p, RoutingMode::Direct),
                "managed": config.credentials.has_route(p, RoutingMode::Managed),
            })
        })
        .collect();

    Json(serde_json::json!({
        "providers": providers
    }))
}

/// Handle GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "aether-chat"
    }))
}
