//! Allow-list sources
//!
//! The access gate refreshes its allow-list from one of two places:
//! - a remote [`SecretStore`] (Azure Key Vault in deployed environments)
//! - a local [`ConfigSource`] (the `access.approved_emails` setting)

pub mod config_source;
pub mod credential;
pub mod key_vault;

pub use config_source::{ConfigSource, StaticAllowList};
pub use credential::{
    BoxedCredentialProvider, CredentialProvider, ManagedIdentityCredential, StaticTokenCredential,
    create_credential,
};
pub use key_vault::KeyVaultClient;

use crate::error::SecretStoreResult;
use async_trait::async_trait;

/// Remote key/value secret store
///
/// Failures are expected to be transient; callers keep their previous data
/// instead of propagating the error.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the named secret and parse it as a list of emails
    async fn fetch_allow_list(&self, name: &str) -> SecretStoreResult<Vec<String>>;

    /// Short description of the store (for logging)
    fn store_type(&self) -> &'static str;
}
