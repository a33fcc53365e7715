//! Credential providers for the secret store
//!
//! Key Vault expects an Entra ID bearer token. Deployments either hand one in
//! directly (static token) or let the platform's managed identity endpoint
//! mint it on demand.

use crate::error::AuthError;
use crate::util::SecretString;
// async_trait required for dyn-compatibility with Box<dyn CredentialProvider>
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Resource identifier for Key Vault tokens
pub const KEY_VAULT_RESOURCE: &str = "https://vault.azure.net";

/// Tokens are renewed this long before they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Supplies bearer tokens for secret store requests
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Get a currently valid access token
    async fn access_token(&self) -> Result<SecretString, AuthError>;

    /// Short description of the credential (for logging)
    fn credential_type(&self) -> &'static str;
}

/// Box type alias for credential providers
pub type BoxedCredentialProvider = Box<dyn CredentialProvider>;

/// A fixed, externally managed access token
#[derive(Debug, Clone)]
pub struct StaticTokenCredential {
    token: SecretString,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<SecretString>) -> Result<Self, AuthError> {
        let token = token.into();
        if token.is_empty() {
            return Err(AuthError::Credential("access token is empty".into()));
        }
        Ok(Self { token })
    }

    /// Create from the AZURE_KEY_VAULT_TOKEN environment variable
    pub fn from_env() -> Option<Self> {
        std::env::var("AZURE_KEY_VAULT_TOKEN")
            .ok()
            .and_then(|token| Self::new(token).ok())
    }
}

#[async_trait]
impl CredentialProvider for StaticTokenCredential {
    async fn access_token(&self) -> Result<SecretString, AuthError> {
        Ok(self.token.clone())
    }

    fn credential_type(&self) -> &'static str {
        "static token"
    }
}

#[derive(Clone)]
struct CachedToken {
    token: SecretString,
    expires_at: SystemTime,
}

impl CachedToken {
    fn is_usable(&self, now: SystemTime) -> bool {
        now + EXPIRY_MARGIN < self.expires_at
    }
}

/// Token response of the managed identity endpoint
#[derive(Deserialize)]
struct IdentityTokenResponse {
    access_token: String,
    /// Unix seconds; App Service sends a string, IMDS a number
    expires_on: serde_json::Value,
}

/// Managed identity via the App Service identity endpoint
pub struct ManagedIdentityCredential {
    http: Client,
    endpoint: String,
    identity_header: SecretString,
    resource: String,
    cached: RwLock<Option<CachedToken>>,
}

impl ManagedIdentityCredential {
    pub fn new(http: Client, endpoint: impl Into<String>, identity_header: SecretString) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            identity_header,
            resource: KEY_VAULT_RESOURCE.to_string(),
            cached: RwLock::new(None),
        }
    }

    /// Create from IDENTITY_ENDPOINT and IDENTITY_HEADER, if both are set
    pub fn from_env(http: Client) -> Option<Self> {
        let endpoint = std::env::var("IDENTITY_ENDPOINT").ok()?;
        let header = std::env::var("IDENTITY_HEADER").ok()?;
        if endpoint.is_empty() || header.is_empty() {
            return None;
        }
        Some(Self::new(http, endpoint, SecretString::new(header)))
    }

    async fn fetch(&self) -> Result<CachedToken, AuthError> {
        debug!(endpoint = %self.endpoint, "Requesting managed identity token");

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("resource", self.resource.as_str()), ("api-version", "2019-08-01")])
            .header("X-IDENTITY-HEADER", self.identity_header.expose_secret())
            .send()
            .await
            .map_err(|e| AuthError::Credential(format!("identity endpoint unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Credential(format!(
                "identity endpoint returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let body: IdentityTokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Credential(format!("invalid token response: {}", e)))?;

        let expires_on = parse_expires_on(&body.expires_on).ok_or_else(|| {
            AuthError::Credential(format!("invalid expires_on: {}", body.expires_on))
        })?;

        Ok(CachedToken {
            token: SecretString::new(body.access_token),
            expires_at: UNIX_EPOCH + Duration::from_secs(expires_on),
        })
    }
}

fn parse_expires_on(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl CredentialProvider for ManagedIdentityCredential {
    async fn access_token(&self) -> Result<SecretString, AuthError> {
        if let Some(cached) = self.cached.read().await.as_ref()
            && cached.is_usable(SystemTime::now())
        {
            return Ok(cached.token.clone());
        }

        let mut slot = self.cached.write().await;
        // Another caller may have renewed while we waited for the lock
        if let Some(cached) = slot.as_ref()
            && cached.is_usable(SystemTime::now())
        {
            return Ok(cached.token.clone());
        }

        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *slot = Some(fresh);
        Ok(token)
    }

    fn credential_type(&self) -> &'static str {
        "managed identity"
    }
}

/// Pick a credential: configured token, then AZURE_KEY_VAULT_TOKEN, then managed identity
pub fn create_credential(
    access_token: Option<&SecretString>,
    http: Client,
) -> Result<BoxedCredentialProvider, AuthError> {
    let provider: BoxedCredentialProvider = if let Some(token) = access_token {
        Box::new(StaticTokenCredential::new(token.clone())?)
    } else if let Some(credential) = StaticTokenCredential::from_env() {
        Box::new(credential)
    } else if let Some(credential) = ManagedIdentityCredential::from_env(http) {
        Box::new(credential)
    } else {
        return Err(AuthError::Credential(
            "no Key Vault credential: set key_vault.access_token, AZURE_KEY_VAULT_TOKEN, \
             or run with a managed identity"
                .into(),
        ));
    };

    info!(credential = provider.credential_type(), "Key Vault credential selected");
    Ok(provider)
}
