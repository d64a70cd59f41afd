//! Configuration parsing and validation for aether-chat.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;

use crate::providers::Provider;
use crate::router::RoutingMode;

/// API version used for Azure OpenAI when none is configured.
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-01";

/// Public Gemini REST endpoint.
pub const DEFAULT_GOOGLE_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Environment variables read by [`Config::from_env`].
pub mod env {
    pub const PROXY_API_KEY: &str = "AETHER_API_KEY";
    pub const PROXY_ENDPOINT: &str = "AETHER_PROXY_ENDPOINT";
    pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
    pub const GOOGLE_ENDPOINT: &str = "GOOGLE_ENDPOINT";
    pub const AZURE_API_KEY: &str = "AZURE_API_KEY";
    pub const AZURE_ENDPOINT: &str = "AZURE_ENDPOINT";
    pub const AZURE_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
    pub const AZURE_DEPLOYMENT: &str = "AZURE_PROVIDER_MODEL";
    pub const LISTEN: &str = "AETHER_CHAT_LISTEN";
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub credentials: CredentialSet,
    #[serde(default)]
    pub chat: ChatConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8501")
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "127.0.0.1:8501".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// API key wrapper that redacts in Debug/Display/Serialize and zeroizes on drop.
///
/// Only accessible via `.expose_secret()`, so every use is grep-auditable.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Access the raw key value.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> serde::Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| ApiKey(SecretString::from(s)))
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// Keys, endpoints and version strings for every provider in both modes.
///
/// Built once at startup and shared read-only by every invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialSet {
    /// Key for the managed proxy ("enterprise mode")
    pub proxy_api_key: Option<ApiKey>,
    /// Managed proxy endpoint, used for both provider shapes
    pub proxy_endpoint: Option<String>,
    pub google_api_key: Option<ApiKey>,
    #[serde(default = "default_google_endpoint")]
    pub google_endpoint: String,
    pub azure_api_key: Option<ApiKey>,
    pub azure_endpoint: Option<String>,
    #[serde(default = "default_azure_api_version")]
    pub azure_api_version: String,
    /// Azure deployment the chat front end sends Azure prompts to
    pub azure_deployment: Option<String>,
}

fn default_google_endpoint() -> String {
    DEFAULT_GOOGLE_ENDPOINT.to_string()
}

fn default_azure_api_version() -> String {
    DEFAULT_AZURE_API_VERSION.to_string()
}

impl Default for CredentialSet {
    fn default() -> Self {
        Self {
            proxy_api_key: None,
            proxy_endpoint: None,
            google_api_key: None,
            google_endpoint: default_google_endpoint(),
            azure_api_key: None,
            azure_endpoint: None,
            azure_api_version: default_azure_api_version(),
            azure_deployment: None,
        }
    }
}

impl CredentialSet {
    /// Whether both a key and an endpoint exist for `provider` in `mode`.
    pub fn has_route(&self, provider: Provider, mode: RoutingMode) -> bool {
        crate::router::select_endpoint(self, provider, mode).is_ok()
    }
}

/// Chat front end configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Provider selected when a session starts
    #[serde(default = "default_provider")]
    pub default_provider: Provider,
    /// Whether new sessions start in enterprise mode
    #[serde(default)]
    pub enterprise_mode: bool,
    /// Gemini models offered by the model picker; the first is the default
    #[serde(default = "default_gemini_models")]
    pub gemini_models: Vec<String>,
    /// Sessions kept in memory; the least recently used is dropped past this
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Transcript entries kept per session, oldest dropped first
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
}

fn default_provider() -> Provider {
    Provider::GoogleGenerativeAi
}

fn default_gemini_models() -> Vec<String> {
    ["gemini-1.5-flash", "gemini-1.5-pro", "gemini-1.0-pro"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_sessions() -> usize {
    1000
}

fn default_max_messages() -> usize {
    200
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            enterprise_mode: false,
            gemini_models: default_gemini_models(),
            max_sessions: default_max_sessions(),
            max_messages: default_max_messages(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, expanding `${VAR}` references
    /// in credential values from the environment.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::parse_str(&content)
    }

    /// Parse configuration from a TOML string using real environment variables.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse_str_with(content, |name| std::env::var(name).ok())
    }

    /// Parse configuration from a TOML string with a custom variable lookup.
    pub fn parse_str_with<F>(content: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: RawConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        let config = Self::from_raw(raw, lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    /// Build configuration from environment-style variables.
    ///
    /// Empty values count as unset.
    pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let credentials = CredentialSet {
            proxy_api_key: var(env::PROXY_API_KEY).map(ApiKey::from),
            proxy_endpoint: var(env::PROXY_ENDPOINT),
            google_api_key: var(env::GOOGLE_API_KEY).map(ApiKey::from),
            google_endpoint: var(env::GOOGLE_ENDPOINT).unwrap_or_else(default_google_endpoint),
            azure_api_key: var(env::AZURE_API_KEY).map(ApiKey::from),
            azure_endpoint: var(env::AZURE_ENDPOINT),
            azure_api_version: var(env::AZURE_API_VERSION)
                .unwrap_or_else(default_azure_api_version),
            azure_deployment: var(env::AZURE_DEPLOYMENT),
        };

        let config = Config {
            server: ServerConfig {
                listen: var(env::LISTEN).unwrap_or_else(default_listen),
            },
            credentials,
            chat: ChatConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let creds = &self.credentials;
        let endpoints = [
            ("proxy_endpoint", creds.proxy_endpoint.as_deref()),
            ("google_endpoint", Some(creds.google_endpoint.as_str())),
            ("azure_endpoint", creds.azure_endpoint.as_deref()),
        ];
        for (name, value) in endpoints {
            if let Some(url) = value {
                if url.trim().is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "Credential '{}' has empty URL",
                        name
                    )));
                }
            }
        }

        if creds.azure_api_version.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Credential 'azure_api_version' is empty".to_string(),
            ));
        }

        if self.chat.gemini_models.is_empty() {
            return Err(ConfigError::Validation(
                "chat.gemini_models must list at least one model".to_string(),
            ));
        }

        if self.chat.max_sessions == 0 || self.chat.max_messages == 0 {
            return Err(ConfigError::Validation(
                "chat.max_sessions and chat.max_messages must be at least 1".to_string(),
            ));
        }

        for provider in Provider::ALL {
            let routable = [RoutingMode::Direct, RoutingMode::Managed]
                .into_iter()
                .any(|mode| creds.has_route(provider, mode));
            if !routable {
                tracing::warn!(
                    provider = %provider,
                    "No credentials configured - prompts to this provider will fail"
                );
            }
        }

        if creds.azure_deployment.is_none() {
            tracing::warn!(
                "No Azure deployment configured - chat front end cannot pick an Azure model"
            );
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}' not set for credential '{field}': {message}")]
    EnvVar {
        var: String,
        field: String,
        message: String,
    },

    #[error("Credential '{name}' is not configured (needed for {provider} in {mode} mode)")]
    MissingCredential {
        name: &'static str,
        provider: Provider,
        mode: RoutingMode,
    },
}

/// Raw credentials deserialized directly from TOML.
/// Values may contain `${VAR}` references not yet expanded.
#[derive(Deserialize, Default)]
pub struct RawCredentialSet {
    proxy_api_key: Option<String>,
    proxy_endpoint: Option<String>,
    google_api_key: Option<String>,
    google_endpoint: Option<String>,
    azure_api_key: Option<String>,
    azure_endpoint: Option<String>,
    azure_api_version: Option<String>,
    azure_deployment: Option<String>,
}

/// Raw configuration deserialized directly from TOML.
#[derive(Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    credentials: RawCredentialSet,
    #[serde(default)]
    chat: ChatConfig,
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// Supports multiple `${VAR}` in one string (e.g., `${SCHEME}://${HOST}`).
/// Fails on first missing variable, unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(input: &str, field: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let end = after.find('}').ok_or_else(|| ConfigError::EnvVar {
            var: "<unclosed>".to_string(),
            field: field.to_string(),
            message: format!("Unclosed '${{' in config value: {}", input),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                var: "".to_string(),
                field: field.to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVar {
            var: var_name.to_string(),
            field: field.to_string(),
            message: format!(
                "Environment variable '{}' is not set (referenced in '{}')",
                var_name, field
            ),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

impl Config {
    /// Convert raw (deserialized) config to final config with env var expansion.
    pub fn from_raw<F>(raw: RawConfig, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expand = |field: &str, value: Option<String>| -> Result<Option<String>, ConfigError> {
            value
                .map(|v| expand_env_vars_with(&v, field, &lookup))
                .transpose()
        };

        let rc = raw.credentials;
        let credentials = CredentialSet {
            proxy_api_key: expand("proxy_api_key", rc.proxy_api_key)?.map(ApiKey::from),
            proxy_endpoint: expand("proxy_endpoint", rc.proxy_endpoint)?,
            google_api_key: expand("google_api_key", rc.google_api_key)?.map(ApiKey::from),
            google_endpoint: expand("google_endpoint", rc.google_endpoint)?
                .unwrap_or_else(default_google_endpoint),
            azure_api_key: expand("azure_api_key", rc.azure_api_key)?.map(ApiKey::from),
            azure_endpoint: expand("azure_endpoint", rc.azure_endpoint)?,
            azure_api_version: expand("azure_api_version", rc.azure_api_version)?
                .unwrap_or_else(default_azure_api_version),
            azure_deployment: expand("azure_deployment", rc.azure_deployment)?,
        };

        Ok(Config {
            server: raw.server,
            credentials,
            chat: raw.chat,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = Config::parse_str_with("", no_env).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:8501");
        assert_eq!(config.credentials.google_endpoint, DEFAULT_GOOGLE_ENDPOINT);
        assert_eq!(config.credentials.azure_api_version, "2024-02-01");
        assert_eq!(config.chat.default_provider, Provider::GoogleGenerativeAi);
        assert_eq!(config.chat.gemini_models[0], "gemini-1.5-flash");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [server]
            listen = "0.0.0.0:8080"

            [credentials]
            proxy_api_key = "aether-key"
            proxy_endpoint = "https://aether.example.com"
            google_api_key = "google-key"
            azure_api_key = "azure-key"
            azure_endpoint = "https://res.openai.azure.com"
            azure_api_version = "2024-06-01"
            azure_deployment = "gpt-4o"

            [chat]
            default_provider = "azure-openai"
            enterprise_mode = true
            gemini_models = ["gemini-1.5-pro"]
        "#;

        let config = Config::parse_str_with(toml, no_env).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:8080");
        let creds = &config.credentials;
        assert_eq!(creds.proxy_api_key.as_ref().unwrap().expose_secret(), "aether-key");
        assert_eq!(creds.azure_api_version, "2024-06-01");
        assert_eq!(creds.azure_deployment.as_deref(), Some("gpt-4o"));
        assert_eq!(config.chat.default_provider, Provider::AzureOpenAi);
        assert!(config.chat.enterprise_mode);
        assert_eq!(config.chat.gemini_models, vec!["gemini-1.5-pro"]);
    }

    #[test]
    fn test_unknown_default_provider_rejected() {
        let toml = r#"
            [chat]
            default_provider = "openai"
        "#;
        assert!(matches!(
            Config::parse_str_with(toml, no_env),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let toml = r#"
            [credentials]
            azure_endpoint = ""
        "#;
        let err = Config::parse_str_with(toml, no_env).unwrap_err();
        assert!(err.to_string().contains("azure_endpoint"));
    }

    #[test]
    fn test_empty_model_list_rejected() {
        let toml = r#"
            [chat]
            gemini_models = []
        "#;
        assert!(matches!(
            Config::parse_str_with(toml, no_env),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_session_limits() {
        let config = Config::parse_str_with("", no_env).unwrap();
        assert_eq!(config.chat.max_sessions, 1000);
        assert_eq!(config.chat.max_messages, 200);

        let toml = r#"
            [chat]
            max_sessions = 0
        "#;
        assert!(matches!(
            Config::parse_str_with(toml, no_env),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_api_key_debug_redaction() {
        let key = ApiKey::from("super-secret-key");
        let debug_output = format!("{:?}", key);
        assert_eq!(debug_output, "[REDACTED]");
        assert!(!debug_output.contains("super-secret"));
    }

    #[test]
    fn test_api_key_display_redaction() {
        let key = ApiKey::from("super-secret-key");
        assert_eq!(format!("{}", key), "[REDACTED]");
    }

    #[test]
    fn test_api_key_serialize_redaction() {
        let key = ApiKey::from("real-secret-value");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"[REDACTED]\"");
    }

    #[test]
    fn test_credential_set_debug_redaction() {
        let creds = CredentialSet {
            proxy_api_key: Some(ApiKey::from("aether-secret-123")),
            google_api_key: Some(ApiKey::from("google-secret-456")),
            ..CredentialSet::default()
        };
        let debug = format!("{:?}", creds);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("aether-secret-123"));
        assert!(!debug.contains("google-secret-456"));
    }

    // ── Expansion tests (using expand_env_vars_with, no global env state) ──

    #[test]
    fn test_expand_single_var() {
        let lookup = |name: &str| match name {
            "MY_KEY" => Some("abc".to_string()),
            _ => None,
        };
        assert_eq!(
            expand_env_vars_with("${MY_KEY}", "test", lookup).unwrap(),
            "abc"
        );
    }

    #[test]
    fn test_expand_multiple_vars() {
        let lookup = |name: &str| match name {
            "SCHEME" => Some("https".to_string()),
            "HOST" => Some("example.com".to_string()),
            _ => None,
        };
        let result = expand_env_vars_with("${SCHEME}://${HOST}/v1", "test", lookup).unwrap();
        assert_eq!(result, "https://example.com/v1");
    }

    #[test]
    fn test_expand_no_vars_passthrough() {
        let lookup = |_: &str| -> Option<String> { panic!("should not be called") };
        let result = expand_env_vars_with("literal-value", "test", lookup).unwrap();
        assert_eq!(result, "literal-value");
    }

    #[test]
    fn test_expand_missing_var_fails() {
        let result = expand_env_vars_with("${MISSING}", "proxy_api_key", no_env);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("MISSING"), "Error should name the variable");
        assert!(err.contains("proxy_api_key"), "Error should name the field");
    }

    #[test]
    fn test_expand_unclosed_brace_fails() {
        let lookup = |_: &str| -> Option<String> { panic!("should not be called") };
        let err = expand_env_vars_with("${UNCLOSED", "test", lookup)
            .unwrap_err()
            .to_string()
            .to_lowercase();
        assert!(err.contains("unclosed"));
    }

    #[test]
    fn test_expand_empty_var_name_fails() {
        let lookup = |_: &str| -> Option<String> { panic!("should not be called") };
        let err = expand_env_vars_with("${}", "test", lookup)
            .unwrap_err()
            .to_string()
            .to_lowercase();
        assert!(err.contains("empty"));
    }

    #[test]
    fn test_expand_dollar_without_brace_passthrough() {
        let lookup = |_: &str| -> Option<String> { panic!("should not be called") };
        let result = expand_env_vars_with("$NOT_A_VAR", "test", lookup).unwrap();
        assert_eq!(result, "$NOT_A_VAR");
    }

    #[test]
    fn test_parse_expands_credentials() {
        let toml = r#"
            [credentials]
            proxy_api_key = "${AETHER_API_KEY}"
            proxy_endpoint = "https://${AETHER_HOST}"
        "#;
        let lookup = |name: &str| match name {
            "AETHER_API_KEY" => Some("expanded-key".to_string()),
            "AETHER_HOST" => Some("aether.internal".to_string()),
            _ => None,
        };
        let config = Config::parse_str_with(toml, lookup).unwrap();
        assert_eq!(
            config.credentials.proxy_api_key.unwrap().expose_secret(),
            "expanded-key"
        );
        assert_eq!(
            config.credentials.proxy_endpoint.as_deref(),
            Some("https://aether.internal")
        );
    }

    // ── from_env tests ──

    #[test]
    fn test_from_env_reads_all_variables() {
        let lookup = |name: &str| {
            let value = match name {
                env::PROXY_API_KEY => "aether",
                env::PROXY_ENDPOINT => "https://aether.example.com",
                env::GOOGLE_API_KEY => "google",
                env::AZURE_API_KEY => "azure",
                env::AZURE_ENDPOINT => "https://res.openai.azure.com",
                env::AZURE_DEPLOYMENT => "gpt-4o",
                _ => return None,
            };
            Some(value.to_string())
        };

        let config = Config::from_env_with(lookup).unwrap();
        let creds = &config.credentials;
        assert_eq!(creds.proxy_api_key.as_ref().unwrap().expose_secret(), "aether");
        assert_eq!(creds.google_api_key.as_ref().unwrap().expose_secret(), "google");
        assert_eq!(creds.google_endpoint, DEFAULT_GOOGLE_ENDPOINT);
        assert_eq!(creds.azure_api_version, DEFAULT_AZURE_API_VERSION);
        assert_eq!(creds.azure_deployment.as_deref(), Some("gpt-4o"));
        assert_eq!(config.server.listen, "127.0.0.1:8501");
    }

    #[test]
    fn test_from_env_treats_empty_as_unset() {
        let lookup = |name: &str| match name {
            env::AZURE_API_VERSION => Some(String::new()),
            env::GOOGLE_API_KEY => Some(String::new()),
            _ => None,
        };
        let config = Config::from_env_with(lookup).unwrap();
        assert_eq!(config.credentials.azure_api_version, DEFAULT_AZURE_API_VERSION);
        assert!(config.credentials.google_api_key.is_none());
    }

    #[test]
    fn test_has_route() {
        let creds = CredentialSet {
            google_api_key: Some(ApiKey::from("g")),
            ..CredentialSet::default()
        };
        assert!(creds.has_route(Provider::GoogleGenerativeAi, RoutingMode::Direct));
        assert!(!creds.has_route(Provider::GoogleGenerativeAi, RoutingMode::Managed));
        assert!(!creds.has_route(Provider::AzureOpenAi, RoutingMode::Direct));
    }
}
