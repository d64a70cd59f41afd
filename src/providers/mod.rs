//! LLM provider backends.
//!
//! Each supported provider has one [`Backend`] implementation that knows the
//! provider's request shape, how to pull the reply text out of its response,
//! and how to turn its error bodies into a message fit for display.

mod azure;
mod gemini;

pub use azure::{normalize_azure_error, AzureOpenAiBackend};
pub use gemini::{normalize_gemini_error, GeminiBackend};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ApiKey;
use crate::error::Error;

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    /// Google Generative AI (Gemini), generation-style API.
    #[serde(rename = "google-generativeai")]
    GoogleGenerativeAi,
    /// Azure OpenAI, chat-completion-style API.
    #[serde(rename = "azure-openai")]
    AzureOpenAi,
}

impl Provider {
    /// Every known provider, in display order.
    pub const ALL: [Provider; 2] = [Provider::GoogleGenerativeAi, Provider::AzureOpenAi];

    /// Selector string used by the chat front end and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GoogleGenerativeAi => "google-generativeai",
            Provider::AzureOpenAi => "azure-openai",
        }
    }

    /// Selector strings of all known providers.
    pub fn valid_names() -> Vec<&'static str> {
        Self::ALL.iter().map(Provider::as_str).collect()
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| Error::ProviderNotFound {
                requested: s.to_string(),
                valid: Self::valid_names(),
            })
    }
}

/// Key, base URL and API version a backend call is made with.
///
/// Produced by credential selection; the backend never looks at the
/// credential set itself.
#[derive(Debug, Clone)]
pub struct ResolvedEndpoint {
    pub api_key: ApiKey,
    pub base_url: String,
    pub api_version: Option<String>,
}

impl ResolvedEndpoint {
    /// Base URL without a trailing slash, with `https://` added to bare hosts.
    pub fn base(&self) -> String {
        let trimmed = self.base_url.trim_end_matches('/');
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("https://{}", trimmed)
        }
    }
}

/// Errors raised by a single backend call.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The request never produced an HTTP response.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-2xx status.
    #[error("api error (status {status}): {body}")]
    Api { status: u16, body: String },

    /// The provider answered 2xx with a body we could not parse.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl BackendError {
    /// The error body parsed as JSON, when there is one.
    pub fn json_body(&self) -> Option<serde_json::Value> {
        match self {
            BackendError::Api { body, .. } => serde_json::from_str(body).ok(),
            _ => None,
        }
    }
}

/// One LLM provider's generation capability.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Which provider this backend talks to.
    fn provider(&self) -> Provider;

    /// Send exactly one request for `prompt` to `model`.
    ///
    /// Returns `Ok(None)` when the provider answered successfully but without
    /// any text content.
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        endpoint: &ResolvedEndpoint,
    ) -> Result<Option<String>, BackendError>;

    /// Message shown to the user for a failed call.
    fn normalize_error(&self, error: &BackendError) -> String;
}

/// The production backends, sharing one HTTP client.
pub fn default_backends(http_client: reqwest::Client) -> Vec<Arc<dyn Backend>> {
    vec![
        Arc::new(GeminiBackend::new(http_client.clone())),
        Arc::new(AzureOpenAiBackend::new(http_client)),
    ]
}

/// Read a provider response, mapping non-2xx statuses to [`BackendError::Api`].
async fn read_json<T: DeserializeOwned>(
    provider: Provider,
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(BackendError::Api {
            status: status.as_u16(),
            body,
        });
    }

    tracing::debug!(provider = %provider, body = %body, "Raw provider response");
    serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
}
