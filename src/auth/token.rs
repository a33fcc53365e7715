//! Bearer token issuance and validation
//!
//! HS256 JWTs carrying the caller's email. Tokens are minted by
//! `POST /api/auth/token` from the platform principal and validated by the
//! access gate on every request.

use crate::config::AuthConfig;
use crate::error::AuthError;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    get_current_timestamp,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Claims carried by issued tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Same value as `email`, under the claim type the hosting platform uses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emails: Option<String>,

    #[serde(default)]
    pub jti: String,

    pub iss: String,

    pub aud: String,

    #[serde(default)]
    pub iat: u64,

    pub exp: u64,
}

impl TokenClaims {
    /// The email claim, if the token carries a non-blank one.
    pub fn email(&self) -> Option<&str> {
        [self.email.as_deref(), self.emails.as_deref()]
            .into_iter()
            .flatten()
            .find(|e| !e.trim().is_empty())
    }
}

/// Response body of the token endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub email: String,
    /// Seconds until expiry
    pub expires_in: u64,
}

/// Signs and verifies bearer tokens with a shared HMAC key
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    lifetime: Duration,
}

impl TokenService {
    /// Create a token service from configuration
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let secret = config
            .jwt_secret
            .as_ref()
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::NotConfigured)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = config.clock_skew_secs;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            lifetime: Duration::from_secs(config.token_lifetime_secs),
        })
    }

    /// Issue a token for an email address
    pub fn issue(&self, email: &str) -> Result<IssuedToken, AuthError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AuthError::Issue("email must not be empty".into()));
        }

        let now = get_current_timestamp();
        let claims = TokenClaims {
            sub: email.to_string(),
            email: Some(email.to_string()),
            emails: Some(email.to_string()),
            jti: format!("{:032x}", rand::random::<u128>()),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now,
            exp: now.saturating_add(self.lifetime.as_secs()),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Issue(e.to_string()))?;

        Ok(IssuedToken {
            token,
            email: email.to_string(),
            expires_in: self.lifetime.as_secs(),
        })
    }

    /// Validate a token's signature, issuer, audience and lifetime
    pub fn validate(&self, token: &str) -> Result<TokenClaims, AuthError> {
        decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "Token rejected");
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::InvalidToken(e.to_string()),
                }
            })
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }
}
