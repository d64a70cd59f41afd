//! In-memory chat sessions: transcript and picker settings per client.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::{ChatConfig, Config};
use crate::error::{Error, Result};
use crate::providers::Provider;

/// Greeting every transcript starts with.
pub const GREETING: &str = "How may I assist you today?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

/// Sidebar state: enterprise mode checkbox, provider and model pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatSettings {
    pub enterprise_mode: bool,
    pub provider: Provider,
    /// Selected Gemini model; Azure always uses the configured deployment.
    pub model: String,
}

/// Partial settings update; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub enterprise_mode: Option<bool>,
    pub provider: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    settings: ChatSettings,
    max_messages: usize,
}

impl ChatSession {
    pub fn new(chat: &ChatConfig) -> Self {
        let mut session = Self {
            messages: Vec::new(),
            max_messages: chat.max_messages.max(1),
            settings: ChatSettings {
                enterprise_mode: chat.enterprise_mode,
                provider: chat.default_provider,
                model: chat.gemini_models.first().cloned().unwrap_or_default(),
            },
        };
        session.push(Role::Assistant, GREETING);
        session
    }

    pub fn push(&mut self, role: Role, response: impl Into<String>) {
        self.messages.push(ChatMessage {
            role,
            response: response.into(),
            timestamp: Utc::now(),
        });
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Apply a settings update, rejecting unknown providers and models.
    pub fn update_settings(&mut self, config: &ChatConfig, update: SettingsUpdate) -> Result<()> {
        let provider = match update.provider {
            Some(selector) => selector.parse::<Provider>()?,
            None => self.settings.provider,
        };
        let model = match update.model {
            Some(model) => {
                check_gemini_model(config, &model)?;
                model
            }
            None => self.settings.model.clone(),
        };

        self.settings = ChatSettings {
            enterprise_mode: update.enterprise_mode.unwrap_or(self.settings.enterprise_mode),
            provider,
            model,
        };
        Ok(())
    }
}

/// A session shared between the requests that carry its id.
pub type SharedSession = Arc<Mutex<ChatSession>>;

struct SessionEntry {
    session: SharedSession,
    last_used: Instant,
}

/// Chat sessions keyed by the id clients send back on every request.
///
/// Holds at most `max_sessions` sessions; creating one more drops the least
/// recently used.
pub struct SessionStore {
    chat: ChatConfig,
    sessions: DashMap<Uuid, SessionEntry>,
}

impl SessionStore {
    pub fn new(chat: ChatConfig) -> Self {
        Self {
            chat,
            sessions: DashMap::new(),
        }
    }

    /// The session for `id`, created on first use. Without an id a new
    /// session is started.
    pub fn get_or_create(&self, id: Option<Uuid>) -> (Uuid, SharedSession) {
        let id = id.unwrap_or_else(Uuid::new_v4);

        if let Some(mut entry) = self.sessions.get_mut(&id) {
            entry.last_used = Instant::now();
            return (id, entry.session.clone());
        }

        while self.sessions.len() >= self.chat.max_sessions.max(1) {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|entry| entry.value().last_used)
                .map(|entry| *entry.key());
            match oldest {
                Some(oldest) => {
                    tracing::debug!(session_id = %oldest, "Evicting least recently used session");
                    self.sessions.remove(&oldest);
                }
                None => break,
            }
        }

        let session = self
            .sessions
            .entry(id)
            .or_insert_with(|| {
                tracing::info!(session_id = %id, "Started chat session");
                SessionEntry {
                    session: Arc::new(Mutex::new(ChatSession::new(&self.chat))),
                    last_used: Instant::now(),
                }
            })
            .session
            .clone();
        (id, session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn check_gemini_model(chat: &ChatConfig, model: &str) -> Result<()> {
    if chat.gemini_models.iter().any(|m| m == model) {
        Ok(())
    } else {
        Err(Error::BadRequest(format!(
            "Unknown Gemini model '{}'; expected one of: {}",
            model,
            chat.gemini_models.join(", ")
        )))
    }
}

/// Model a prompt to `provider` is sent to.
///
/// Gemini uses the picked model, which must be one of the offered models
/// (default: the first). Azure always uses the configured deployment.
pub fn resolve_model(
    config: &Config,
    provider: Provider,
    requested: Option<&str>,
) -> Result<String> {
    match provider {
        Provider::GoogleGenerativeAi => match requested {
            Some(model) => {
                check_gemini_model(&config.chat, model)?;
                Ok(model.to_string())
            }
            None => config
                .chat
                .gemini_models
                .first()
                .cloned()
                .ok_or_else(|| Error::BadRequest("No Gemini models configured".to_string())),
        },
        Provider::AzureOpenAi => config.credentials.azure_deployment.clone().ok_or_else(|| {
            Error::BadRequest("No Azure deployment configured (AZURE_PROVIDER_MODEL)".to_string())
        }),
    }
}
