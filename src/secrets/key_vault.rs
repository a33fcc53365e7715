//! Azure Key Vault client
//!
//! Reads secrets over the Key Vault REST API. The allow-list lives in a single
//! secret whose value is a JSON array of email addresses.

use crate::config::KeyVaultConfig;
use crate::error::{SecretStoreError, SecretStoreResult};
use crate::secrets::SecretStore;
use crate::secrets::credential::BoxedCredentialProvider;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Secret bundle returned by `GET /secrets/{name}`
#[derive(Debug, Deserialize)]
struct SecretBundle {
    value: String,
}

/// Key Vault REST client
pub struct KeyVaultClient {
    http: Client,
    config: KeyVaultConfig,
    credential: BoxedCredentialProvider,
}

impl KeyVaultClient {
    /// Create a new client from configuration
    pub fn new(
        config: &KeyVaultConfig,
        credential: BoxedCredentialProvider,
    ) -> SecretStoreResult<Self> {
        if !config.is_enabled() {
            return Err(SecretStoreError::NotConfigured);
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(format!("recipe-api/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SecretStoreError::Request)?;

        Ok(Self {
            http,
            config: config.clone(),
            credential,
        })
    }

    /// Add the bearer token to a request
    async fn authenticate(&self, request: RequestBuilder) -> SecretStoreResult<RequestBuilder> {
        let token = self.credential.access_token().await?;
        Ok(request.bearer_auth(token.expose_secret()))
    }

    /// Execute a request with retries
    async fn execute(&self, request: RequestBuilder, name: &str) -> SecretStoreResult<Response> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(retry_delay(attempt)).await;
                debug!("Retrying secret request (attempt {})", attempt + 1);
            }

            let req = request
                .try_clone()
                .ok_or_else(|| SecretStoreError::Api {
                    status: 0,
                    message: "Cannot clone request".to_string(),
                })?;

            let error = match req.send().await {
                Ok(response) => match self.handle_response(response, name).await {
                    Ok(response) => return Ok(response),
                    Err(e) => e,
                },
                Err(e) => {
                    warn!("Secret request failed: {}", e);
                    SecretStoreError::Request(e)
                }
            };

            let retryable = is_retryable(&error);
            last_error = Some(error);
            if !retryable {
                break;
            }
        }

        Err(last_error.unwrap_or(SecretStoreError::Api {
            status: 0,
            message: "Unknown error".to_string(),
        }))
    }

    async fn handle_response(&self, response: Response, name: &str) -> SecretStoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(SecretStoreError::from_response(status.as_u16(), name, &body))
    }

    /// Fetch the current value of a secret
    #[instrument(skip(self))]
    pub async fn get_secret(&self, name: &str) -> SecretStoreResult<String> {
        let url = self
            .config
            .secret_url(name)
            .ok_or(SecretStoreError::NotConfigured)?;

        let request = self.authenticate(self.http.get(&url)).await?;
        let response = self.execute(request, name).await?;

        let bundle: SecretBundle = response.json().await.map_err(|e| SecretStoreError::Api {
            status: StatusCode::OK.as_u16(),
            message: format!("Failed to parse secret bundle: {}", e),
        })?;

        Ok(bundle.value)
    }
}

#[async_trait]
impl SecretStore for KeyVaultClient {
    async fn fetch_allow_list(&self, name: &str) -> SecretStoreResult<Vec<String>> {
        let value = self.get_secret(name).await?;
        parse_allow_list(name, &value)
    }

    fn store_type(&self) -> &'static str {
        "Key Vault"
    }
}

/// Parse a secret value holding a JSON array of strings
pub fn parse_allow_list(name: &str, value: &str) -> SecretStoreResult<Vec<String>> {
    serde_json::from_str::<Vec<String>>(value).map_err(|e| SecretStoreError::InvalidSecret {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Longest pause between two attempts
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Exponential backoff before retry number `attempt` (starting at 1)
fn retry_delay(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(100u64.saturating_mul(factor)).min(MAX_RETRY_DELAY)
}

/// Check if an error is retryable
fn is_retryable(error: &SecretStoreError) -> bool {
    match error {
        SecretStoreError::Request(e) => e.is_timeout() || e.is_connect(),
        SecretStoreError::Api { status, .. } => *status >= 500 || *status == 429,
        _ => false,
    }
}
