//! Authentication module
//!
//! Two ways a caller proves who they are:
//! - a bearer JWT issued by this service ([`TokenService`])
//! - the principal header injected by the hosting platform ([`ClientPrincipal`])
//!
//! Neither decides access; the access gate compares the resulting email
//! against the allow-list.

pub mod principal;
pub mod token;

pub use principal::{ClientPrincipal, EMAIL_CLAIM_TYPES, PrincipalClaim};
pub use token::{IssuedToken, TokenClaims, TokenService};

use crate::config::AuthConfig;
use crate::error::AuthError;
use std::sync::Arc;

/// Create a shared token service from configuration
pub fn create_token_service(config: &AuthConfig) -> Result<Arc<TokenService>, AuthError> {
    TokenService::new(config).map(Arc::new)
}
