//! Azure OpenAI chat-completion backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{read_json, Backend, BackendError, Provider, ResolvedEndpoint};
use crate::config::DEFAULT_AZURE_API_VERSION;

const API_KEY_HEADER: &str = "api-key";

pub struct AzureOpenAiBackend {
    client: reqwest::Client,
}

impl AzureOpenAiBackend {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Chat completion request (OpenAI-compatible).
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Chat completion response (OpenAI-compatible).
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

/// Content is null when the reply was filtered or only carries tool calls.
#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl ChatCompletionResponse {
    fn into_text(self) -> Option<String> {
        self.choices.into_iter().next()?.message?.content
    }
}

fn completions_url(endpoint: &ResolvedEndpoint, deployment: &str) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions",
        endpoint.base(),
        deployment
    )
}

#[async_trait]
impl Backend for AzureOpenAiBackend {
    fn provider(&self) -> Provider {
        Provider::AzureOpenAi
    }

    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        endpoint: &ResolvedEndpoint,
    ) -> Result<Option<String>, BackendError> {
        let body = ChatCompletionRequest {
            model,
            messages: vec![RequestMessage {
                role: "user",
                content: prompt,
            }],
        };
        let api_version = endpoint
            .api_version
            .as_deref()
            .unwrap_or(DEFAULT_AZURE_API_VERSION);

        let response = self
            .client
            .post(completions_url(endpoint, model))
            .query(&[("api-version", api_version)])
            .header(API_KEY_HEADER, endpoint.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let parsed: ChatCompletionResponse = read_json(self.provider(), response).await?;
        Ok(parsed.into_text())
    }

    fn normalize_error(&self, error: &BackendError) -> String {
        normalize_azure_error(error)
    }
}

/// Display message for a failed Azure OpenAI call.
///
/// Reads `message` from the error body; the REST API nests it under `error`,
/// so that is tried second. Falls back to the error's own text.
pub fn normalize_azure_error(error: &BackendError) -> String {
    error
        .json_body()
        .and_then(|body| {
            body.get("message")
                .or_else(|| body.get("error")?.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| error.to_string())
}
