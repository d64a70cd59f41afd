//! Credential selection.
//!
//! Maps a (provider, routing mode) pair to the key and endpoint a backend
//! call is made with.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, CredentialSet};
use crate::error::Result;
use crate::providers::{Provider, ResolvedEndpoint};

/// Whether a call goes straight to the provider or through the managed proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    Direct,
    /// Enterprise mode: the managed proxy forwards with its own credentials.
    Managed,
}

impl From<bool> for RoutingMode {
    fn from(use_managed_endpoint: bool) -> Self {
        if use_managed_endpoint {
            RoutingMode::Managed
        } else {
            RoutingMode::Direct
        }
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoutingMode::Direct => "direct",
            RoutingMode::Managed => "managed",
        };
        f.pad(name)
    }
}

/// Source of per-call credentials.
pub trait CredentialResolver: Send + Sync {
    fn resolve(&self, provider: Provider, mode: RoutingMode) -> Result<ResolvedEndpoint>;
}

impl CredentialResolver for CredentialSet {
    fn resolve(&self, provider: Provider, mode: RoutingMode) -> Result<ResolvedEndpoint> {
        Ok(select_endpoint(self, provider, mode)?)
    }
}

/// Pick the key and endpoint for `provider` in `mode`.
///
/// Managed mode always uses the proxy pair; the Azure shape additionally
/// carries the configured API version in both modes.
pub fn select_endpoint(
    credentials: &CredentialSet,
    provider: Provider,
    mode: RoutingMode,
) -> std::result::Result<ResolvedEndpoint, ConfigError> {
    let (key, key_name, url, url_name) = match (provider, mode) {
        (_, RoutingMode::Managed) => (
            credentials.proxy_api_key.as_ref(),
            "proxy_api_key",
            credentials.proxy_endpoint.as_deref(),
            "proxy_endpoint",
        ),
        (Provider::GoogleGenerativeAi, RoutingMode::Direct) => (
            credentials.google_api_key.as_ref(),
            "google_api_key",
            Some(credentials.google_endpoint.as_str()),
            "google_endpoint",
        ),
        (Provider::AzureOpenAi, RoutingMode::Direct) => (
            credentials.azure_api_key.as_ref(),
            "azure_api_key",
            credentials.azure_endpoint.as_deref(),
            "azure_endpoint",
        ),
    };

    let missing = |name| ConfigError::MissingCredential {
        name,
        provider,
        mode,
    };
    let api_key = key.cloned().ok_or_else(|| missing(key_name))?;
    let base_url = url.map(str::to_string).ok_or_else(|| missing(url_name))?;

    let api_version = match provider {
        Provider::AzureOpenAi => Some(credentials.azure_api_version.clone()),
        Provider::GoogleGenerativeAi => None,
    };

    Ok(ResolvedEndpoint {
        api_key,
        base_url,
        api_version,
    })
}
