//! Configuration types for recipe-api
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables.

use crate::util::SecretString;
use serde::Deserialize;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Deployment environment
    pub environment: Environment,

    /// HTTP listener settings
    pub server: ServerConfig,

    /// Bearer token settings
    pub auth: AuthConfig,

    /// Access gate and allow-list settings
    pub access: AccessConfig,

    /// Remote allow-list store
    pub key_vault: KeyVaultConfig,

    /// Vision model used for image-to-recipe extraction
    pub openai: OpenAiConfig,
}

impl AppConfig {
    /// Unauthenticated access is only honoured in development.
    pub fn dev_bypass_enabled(&self) -> bool {
        self.environment == Environment::Development && self.access.allow_unauthenticated
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[serde(alias = "Development", alias = "dev")]
    Development,
    #[default]
    #[serde(alias = "Production", alias = "prod")]
    Production,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,

    pub port: u16,

    /// Origins allowed by the CORS layer
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

/// Bearer token configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC signing key (prefer env var JWT_SECRET_KEY)
    pub jwt_secret: Option<SecretString>,

    pub issuer: String,

    pub audience: String,

    /// Lifetime of issued tokens in seconds
    pub token_lifetime_secs: u64,

    /// Leeway applied to `exp` during validation
    pub clock_skew_secs: u64,

    /// Header the hosting platform uses for the base64 JSON principal
    pub principal_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            issuer: "RecipeApi".to_string(),
            audience: "RecipeFrontend".to_string(),
            token_lifetime_secs: 24 * 60 * 60,
            clock_skew_secs: 5 * 60,
            principal_header: "x-ms-client-principal".to_string(),
        }
    }
}

/// Access gate configuration
///
/// The allow-list comes from Key Vault when `[key_vault] url` is set and from
/// `approved_emails` otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Skip identity checks entirely (development only)
    pub allow_unauthenticated: bool,

    /// Path prefixes that never require identity resolution
    pub public_paths: Vec<String>,

    /// Local allow-list used when no Key Vault is configured
    pub approved_emails: Vec<String>,

    /// Freshness window of the allow-list cache
    pub cache_ttl_secs: u64,

    /// Upper bound on a single allow-list fetch
    pub refresh_timeout_secs: u64,

    /// First retry delay after a failed refresh (0 disables backoff)
    pub retry_backoff_initial_secs: u64,

    /// Ceiling for the retry delay
    pub retry_backoff_max_secs: u64,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            allow_unauthenticated: false,
            public_paths: vec![
                "/health".to_string(),
                "/.auth".to_string(),
                "/api/auth/token".to_string(),
            ],
            approved_emails: Vec::new(),
            cache_ttl_secs: 300,
            refresh_timeout_secs: 10,
            retry_backoff_initial_secs: 5,
            retry_backoff_max_secs: 300,
        }
    }
}

impl AccessConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }
}

/// Azure Key Vault configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeyVaultConfig {
    /// Vault URL (e.g., `https://my-vault.vault.azure.net`)
    pub url: Option<String>,

    /// Secret holding the JSON array of approved emails
    pub secret_name: String,

    /// Static access token; managed identity is used when absent
    pub access_token: Option<SecretString>,

    pub api_version: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries for failed requests
    pub max_retries: u32,
}

impl Default for KeyVaultConfig {
    fn default() -> Self {
        Self {
            url: None,
            secret_name: "approved-users".to_string(),
            access_token: None,
            api_version: "7.4".to_string(),
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl KeyVaultConfig {
    pub fn is_enabled(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    /// Full URL of a secret's latest version
    pub fn secret_url(&self, name: &str) -> Option<String> {
        self.url.as_ref().map(|base| {
            format!(
                "{}/secrets/{}?api-version={}",
                base.trim_end_matches('/'),
                urlencoding::encode(name),
                self.api_version
            )
        })
    }
}

/// Azure OpenAI configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub endpoint: Option<String>,

    pub api_key: Option<SecretString>,

    /// Deployment name of a vision-capable chat model
    pub deployment: Option<String>,

    pub api_version: String,

    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            deployment: None,
            api_version: "2024-10-21".to_string(),
            timeout_secs: 60,
        }
    }
}

impl OpenAiConfig {
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some() && self.api_key.is_some() && self.deployment.is_some()
    }

    /// Chat completions URL for the configured deployment
    pub fn completions_url(&self) -> Option<String> {
        match (&self.endpoint, &self.deployment) {
            (Some(endpoint), Some(deployment)) => Some(format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint.trim_end_matches('/'),
                deployment,
                self.api_version
            )),
            _ => None,
        }
    }
}
