//! Access control module
//!
//! Gates every inbound request on an email allow-list.
//!
//! ## Decision Model
//!
//! ```text
//! OPTIONS / public path → dev bypass → identity → allow-list membership
//! ```
//!
//! - Identity comes from an ordered chain: a bearer JWT issued by this
//!   service, then the platform principal header. First success wins.
//! - The allow-list is cached and refreshed at most once per freshness
//!   window. A failed refresh keeps the previous entries.
//! - No identity means 401; an identity outside the allow-list means 403.
//!
//! ## Example Configuration
//!
//! ```toml
//! [access]
//! public_paths = ["/health", "/.auth", "/api/auth/token"]
//! cache_ttl_secs = 300
//! approved_emails = ["dev@example.com"]   # used when Key Vault is not set
//!
//! [key_vault]
//! url = "https://my-vault.vault.azure.net"
//! secret_name = "approved-users"
//! ```

pub mod allow_list;
pub mod gate;
pub mod identity;

pub use allow_list::{AllowListCache, AllowListSource, MAX_RETRY_DELAY, RefreshPolicy};
pub use gate::{AccessGate, DecisionReason, GateDecision, RejectionBody};
pub use identity::{
    BearerTokenResolver, BoxedIdentityResolver, GateRequest, Identity, IdentityChain,
    IdentityResolver, PRINCIPAL_HEADER, PrincipalHeaderResolver,
};
