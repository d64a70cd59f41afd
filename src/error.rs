//! Error types for aether-chat.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::providers::Provider;

/// Result type alias for aether-chat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Message shown to the user for every failure that is not a normalized
/// backend error.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred while processing the request.";

/// Main error type for aether-chat.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("The LLM provider must be one of the following: {}", .valid.join(", "))]
    ProviderNotFound {
        requested: String,
        valid: Vec<&'static str>,
    },

    #[error("The LLM did not return a response.")]
    NoResponse { provider: Provider },

    /// A backend call failed; `message` is already normalized for display.
    #[error("{provider} call failed: {message}")]
    Backend { provider: Provider, message: String },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The string the chat front end shows for this failure.
    ///
    /// Only backend failures surface their own message; everything else
    /// collapses to [`GENERIC_ERROR_MESSAGE`].
    pub fn display_message(&self) -> String {
        match self {
            Error::Backend { message, .. } => message.clone(),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::ProviderNotFound { .. } => StatusCode::BAD_REQUEST,
            Error::NoResponse { .. } => StatusCode::BAD_GATEWAY,
            Error::Backend { .. } => StatusCode::BAD_GATEWAY,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": {
                "message": self.to_string(),
                "type": "aether_chat_error",
                "code": status.as_u16()
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_message_keeps_backend_text() {
        let err = Error::Backend {
            provider: Provider::GoogleGenerativeAi,
            message: "quota exceeded".to_string(),
        };
        assert_eq!(err.display_message(), "quota exceeded");
        assert_eq!(
            err.to_string(),
            "google-generativeai call failed: quota exceeded"
        );
    }

    #[test]
    fn test_display_message_generic_otherwise() {
        let errors = [
            Error::NoResponse {
                provider: Provider::AzureOpenAi,
            },
            Error::ProviderNotFound {
                requested: "x".to_string(),
                valid: Provider::valid_names(),
            },
            Error::Internal("boom".to_string()),
        ];
        for err in errors {
            assert_eq!(err.display_message(), GENERIC_ERROR_MESSAGE);
        }
    }

    #[test]
    fn test_status_codes() {
        let response = Error::BadRequest("nope".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = Error::NoResponse {
            provider: Provider::AzureOpenAi,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
