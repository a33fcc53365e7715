//! Recipe API
//!
//! A recipe catalog served over HTTP behind an email allow-list.
//!
//! ## Features
//!
//! - **Access gate** admitting only callers whose email is on the allow-list
//! - **Bearer tokens** issued in exchange for the hosting platform's principal header
//! - **Allow-list from Azure Key Vault**, cached and refreshed in the background of requests
//! - **Recipe extraction** from photos through an Azure OpenAI vision deployment
//!
//! ## Request Flow
//!
//! ```text
//! preflight / public path → dev bypass → identity (bearer, principal) → allow-list → handler
//! ```
//!
//! ## Example Configuration
//!
//! ```toml
//! environment = "production"
//!
//! [server]
//! port = 8080
//! cors_origins = ["https://recipes.example.com"]
//!
//! [auth]
//! # jwt_secret from JWT_SECRET_KEY env var
//!
//! [key_vault]
//! url = "https://my-vault.vault.azure.net"
//! secret_name = "approved-users"
//! ```

pub mod access_control;
pub mod auth;
pub mod config;
pub mod error;
pub mod recipes;
pub mod secrets;
pub mod server;
pub mod util;

// Re-export main types
pub use access_control::{AccessGate, AllowListCache, GateDecision};
pub use config::{AppConfig, load_config};
pub use server::{AppState, build_router};
