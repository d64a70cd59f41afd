//! Provider dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use super::selector::{CredentialResolver, RoutingMode};
use super::types::{InvocationRequest, InvocationResult, EMPTY_PROMPT_ADVISORY};
use crate::config::CredentialSet;
use crate::error::{Error, Result};
use crate::providers::{default_backends, Backend, Provider};

/// Routes prompts to the configured provider backends.
///
/// Holds no mutable state: the credentials are shared read-only and every
/// call is independent of the ones before it.
#[derive(Clone)]
pub struct Router {
    credentials: Arc<dyn CredentialResolver>,
    backends: HashMap<Provider, Arc<dyn Backend>>,
}

impl Router {
    /// Create a router using the production backends.
    pub fn new(credentials: Arc<CredentialSet>, http_client: reqwest::Client) -> Self {
        Self::with_backends(credentials, default_backends(http_client))
    }

    /// Create a router with explicit credentials and backends.
    ///
    /// A later backend for the same provider replaces an earlier one.
    pub fn with_backends(
        credentials: Arc<dyn CredentialResolver>,
        backends: Vec<Arc<dyn Backend>>,
    ) -> Self {
        let backends = backends
            .into_iter()
            .map(|backend| (backend.provider(), backend))
            .collect();
        Self {
            credentials,
            backends,
        }
    }

    /// Route one request, keeping the failure kind.
    ///
    /// Backend errors arrive here already normalized into
    /// [`Error::Backend`]'s message.
    pub async fn try_invoke(&self, request: &InvocationRequest) -> Result<String> {
        if request.prompt.is_empty() {
            tracing::debug!("Empty prompt, skipping backend call");
            return Ok(EMPTY_PROMPT_ADVISORY.to_string());
        }

        let provider: Provider = request.provider.parse()?;
        let mode = RoutingMode::from(request.use_managed_endpoint);

        let backend = self.backends.get(&provider).ok_or_else(|| {
            Error::Internal(format!("No backend registered for provider '{}'", provider))
        })?;

        let endpoint = self.credentials.resolve(provider, mode)?;

        tracing::info!(
            provider = %provider,
            model = %request.model,
            mode = %mode,
            "Dispatching prompt"
        );

        match backend
            .generate(&request.prompt, &request.model, &endpoint)
            .await
        {
            Ok(Some(text)) => {
                tracing::info!(provider = %provider, response = %text, "LLM response");
                Ok(text)
            }
            Ok(None) => {
                tracing::warn!(provider = %provider, "LLM returned no text content");
                Err(Error::NoResponse { provider })
            }
            Err(e) => {
                tracing::error!(provider = %provider, error = ?e, "LLM call failed");
                Err(Error::Backend {
                    provider,
                    message: backend.normalize_error(&e),
                })
            }
        }
    }

    /// Route one request and normalize the outcome.
    pub async fn invoke(&self, request: &InvocationRequest) -> InvocationResult {
        let result = self.try_invoke(request).await;
        if let Err(e) = &result {
            tracing::error!(
                error = %e,
                provider = %request.provider,
                "Error in invoke"
            );
        }
        InvocationResult::from(result)
    }

    /// Ask an LLM and return the text to display.
    ///
    /// Never fails: failures come back as their display message.
    pub async fn ask(
        &self,
        prompt: &str,
        provider: &str,
        model: &str,
        use_managed_endpoint: bool,
    ) -> String {
        let request = InvocationRequest::new(prompt, provider, model, use_managed_endpoint);
        self.invoke(&request).await.into_text()
    }

    /// Providers with a registered backend.
    pub fn providers(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|p| self.backends.contains_key(p))
            .collect()
    }
}
