//! Google Generative AI (Gemini) backend.
//!
//! Uses the REST `generateContent` method. In managed mode the same path is
//! served by the proxy endpoint, so only the base URL and key change.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{read_json, Backend, BackendError, Provider, ResolvedEndpoint};

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiBackend {
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<TextPart<'a>>,
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct PartResponse {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn into_text(self) -> Option<String> {
        let parts = self.candidates.into_iter().next()?.content?.parts;
        let texts: Vec<String> = parts.into_iter().filter_map(|p| p.text).collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }
}

fn generate_url(endpoint: &ResolvedEndpoint, model: &str) -> String {
    let model = model.strip_prefix("models/").unwrap_or(model);
    format!("{}/v1beta/models/{}:generateContent", endpoint.base(), model)
}

#[async_trait]
impl Backend for GeminiBackend {
    fn provider(&self) -> Provider {
        Provider::GoogleGenerativeAi
    }

    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        endpoint: &ResolvedEndpoint,
    ) -> Result<Option<String>, BackendError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![TextPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(generate_url(endpoint, model))
            .header(API_KEY_HEADER, endpoint.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let parsed: GenerateContentResponse = read_json(self.provider(), response).await?;
        Ok(parsed.into_text())
    }

    fn normalize_error(&self, error: &BackendError) -> String {
        normalize_gemini_error(error)
    }
}

/// Display message for a failed Gemini call: `error.message` from the JSON
/// error body, or the error's own text.
pub fn normalize_gemini_error(error: &BackendError) -> String {
    error
        .json_body()
        .and_then(|body| {
            body.get("error")?
                .get("message")?
                .as_str()
                .map(str::to_string)
        })
        .unwrap_or_else(|| error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiKey;

    fn endpoint(base: &str) -> ResolvedEndpoint {
        ResolvedEndpoint {
            api_key: ApiKey::from("test-key"),
            base_url: base.to_string(),
            api_version: None,
        }
    }

    #[test]
    fn test_generate_url() {
        let url = generate_url(
            &endpoint("https://generativelanguage.googleapis.com"),
            "gemini-1.5-flash",
        );
        assert_eq!(
            url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_generate_url_strips_models_prefix() {
        let url = generate_url(&endpoint("proxy.internal"), "models/gemini-1.5-pro");
        assert_eq!(
            url,
            "https://proxy.internal/v1beta/models/gemini-1.5-pro:generateContent"
        );
    }

    #[test]
    fn test_request_shape() {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![TextPart { text: "hi" }],
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"contents": [{"role": "user", "parts": [{"text": "hi"}]}]})
        );
    }

    #[test]
    fn test_text_joins_parts_of_first_candidate() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "hel"}, {"text": "lo"}]}},
                {"content": {"role": "model", "parts": [{"text": "ignored"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(response.into_text().as_deref(), Some("hello"));
    }

    #[test]
    fn test_text_absent_without_candidates() {
        let response: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({"promptFeedback": {"blockReason": "SAFETY"}}))
                .unwrap();
        assert!(response.into_text().is_none());

        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }))
        .unwrap();
        assert!(response.into_text().is_none());
    }

    #[test]
    fn test_normalize_reads_nested_message() {
        let err = BackendError::Api {
            status: 429,
            body: r#"{"error":{"code":429,"message":"quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#
                .to_string(),
        };
        assert_eq!(normalize_gemini_error(&err), "quota exceeded");
    }

    #[test]
    fn test_normalize_falls_back_to_error_text() {
        let err = BackendError::Api {
            status: 502,
            body: "Bad Gateway".to_string(),
        };
        assert_eq!(
            normalize_gemini_error(&err),
            "api error (status 502): Bad Gateway"
        );

        // Azure-shaped body is not what Gemini reports
        let err = BackendError::Api {
            status: 400,
            body: r#"{"message":"flat"}"#.to_string(),
        };
        assert_eq!(normalize_gemini_error(&err), err.to_string());
    }
}
