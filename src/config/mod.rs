//! Configuration module
//!
//! Layered settings for the listener, bearer tokens, the access gate and its
//! allow-list sources, and the vision model used for recipe extraction.

pub mod loader;
pub mod types;

pub use loader::{load_config, load_config_from_str};
pub use types::{
    AccessConfig, AppConfig, AuthConfig, Environment, KeyVaultConfig, OpenAiConfig, ServerConfig,
};
