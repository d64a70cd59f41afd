//! Invocation request and result types.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Advisory returned instead of calling a backend for an empty prompt.
pub const EMPTY_PROMPT_ADVISORY: &str =
    "Your prompt is empty; please re-type your prompt and try again!";

/// One user turn to route to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    pub prompt: String,
    /// Provider selector, e.g. "google-generativeai"
    pub provider: String,
    pub model: String,
    pub use_managed_endpoint: bool,
}

impl InvocationRequest {
    pub fn new(
        prompt: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        use_managed_endpoint: bool,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            provider: provider.into(),
            model: model.into(),
            use_managed_endpoint,
        }
    }
}

/// Which failure path an invocation took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ProviderNotFound,
    NoResponse,
    BackendCall,
    Unhandled,
}

impl From<&Error> for FailureKind {
    fn from(error: &Error) -> Self {
        match error {
            Error::ProviderNotFound { .. } => FailureKind::ProviderNotFound,
            Error::NoResponse { .. } => FailureKind::NoResponse,
            Error::Backend { .. } => FailureKind::BackendCall,
            _ => FailureKind::Unhandled,
        }
    }
}

/// Outcome of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationResult {
    Success {
        text: String,
    },
    Failure {
        kind: FailureKind,
        display_message: String,
    },
}

impl InvocationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            InvocationResult::Success { .. } => None,
            InvocationResult::Failure { kind, .. } => Some(*kind),
        }
    }

    /// The string to show the user.
    pub fn text(&self) -> &str {
        match self {
            InvocationResult::Success { text } => text,
            InvocationResult::Failure {
                display_message, ..
            } => display_message,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            InvocationResult::Success { text } => text,
            InvocationResult::Failure {
                display_message, ..
            } => display_message,
        }
    }
}

impl From<std::result::Result<String, Error>> for InvocationResult {
    fn from(result: std::result::Result<String, Error>) -> Self {
        match result {
            Ok(text) => InvocationResult::Success { text },
            Err(error) => InvocationResult::Failure {
                kind: FailureKind::from(&error),
                display_message: error.display_message(),
            },
        }
    }
}
