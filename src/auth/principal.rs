//! Platform principal header
//!
//! The hosting platform authenticates users itself and forwards the result as
//! a base64-encoded JSON document in a request header:
//!
//! ```json
//! {
//!   "identityProvider": "aad",
//!   "userId": "d75b260a64504067bfc5b2905e3b8182",
//!   "userDetails": "jane@example.com",
//!   "userRoles": ["anonymous", "authenticated"],
//!   "claims": [{ "typ": "emails", "val": "jane@example.com" }]
//! }
//! ```

use crate::error::AuthError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

/// Claim types that carry an email address
pub const EMAIL_CLAIM_TYPES: &[&str] = &[
    "emails",
    "email",
    "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/emailaddress",
];

/// Decoded platform principal
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPrincipal {
    #[serde(default)]
    pub identity_provider: Option<String>,

    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub user_details: Option<String>,

    #[serde(default)]
    pub user_roles: Option<Vec<String>>,

    #[serde(default)]
    pub claims: Vec<PrincipalClaim>,
}

/// A single `{typ, val}` claim
#[derive(Debug, Clone, Deserialize)]
pub struct PrincipalClaim {
    #[serde(default)]
    pub typ: String,

    #[serde(default)]
    pub val: Option<String>,
}

impl ClientPrincipal {
    /// Decode the raw header value (base64 of UTF-8 JSON)
    pub fn from_header(value: &str) -> Result<Self, AuthError> {
        let bytes = STANDARD
            .decode(value.trim())
            .map_err(|e| AuthError::MalformedPrincipal(format!("invalid base64: {}", e)))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::MalformedPrincipal(format!("invalid JSON: {}", e)))
    }

    /// Email of the principal.
    ///
    /// The first email-typed claim wins. Without one, `userId` is used when it
    /// contains an `@`. That fallback is a heuristic for providers that put
    /// the address there and must not be treated as proof of an email.
    pub fn email(&self) -> Option<&str> {
        let from_claims = self
            .claims
            .iter()
            .filter(|c| EMAIL_CLAIM_TYPES.contains(&c.typ.as_str()))
            .find_map(|c| c.val.as_deref().filter(|v| !v.trim().is_empty()));

        from_claims.or_else(|| {
            self.user_id
                .as_deref()
                .filter(|id| id.contains('@') && !id.trim().is_empty())
        })
    }
}
