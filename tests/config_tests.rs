//! Configuration loading tests

use recipe_api::config::{Environment, load_config, load_config_from_str};
use std::time::Duration;

const MINIMAL_CONFIG: &str = r#"
[auth]
jwt_secret = "minimal-config-signing-key-0123456789"
"#;

const FULL_CONFIG: &str = r#"
environment = "development"

[server]
host = "0.0.0.0"
port = 9000
cors_origins = ["http://localhost:3000", "https://recipes.example.com"]

[auth]
jwt_secret = "full-config-signing-key-0123456789abcdef"
issuer = "RecipeApi"
audience = "RecipeFrontend"
token_lifetime_secs = 3600
principal_header = "X-Forwarded-Principal"

[access]
allow_unauthenticated = true
public_paths = ["/health", "/.auth", "/api/auth/token", "/metrics"]
approved_emails = ["alice@x.com", "bob@x.com"]
cache_ttl_secs = 120
refresh_timeout_secs = 5
retry_backoff_initial_secs = 2
retry_backoff_max_secs = 30

[key_vault]
url = "https://recipes-kv.vault.azure.net"
secret_name = "approved-users"

[openai]
endpoint = "https://recipes.openai.azure.com"
api_key = "sk-test"
deployment = "gpt-4o"
"#;

/// Unset every variable the loader reads
fn clear_env() {
    unsafe {
        for var in [
            "JWT_SECRET_KEY",
            "KEY_VAULT_URL",
            "AZURE_OPENAI_ENDPOINT",
            "AZURE_OPENAI_API_KEY",
            "AZURE_OPENAI_DEPLOYMENT",
            "RECIPE_API__SERVER__PORT",
            "RECIPE_API__ACCESS__APPROVED_EMAILS",
            "RECIPE_API__ENVIRONMENT",
        ] {
            std::env::remove_var(var);
        }
    }
}

#[test]
fn test_minimal_config_uses_defaults() {
    let config = load_config_from_str(MINIMAL_CONFIG).unwrap();

    assert_eq!(config.environment, Environment::Production);
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.access.cache_ttl(), Duration::from_secs(300));
    assert_eq!(
        config.access.public_paths,
        vec!["/health", "/.auth", "/api/auth/token"]
    );
    assert!(!config.key_vault.is_enabled());
    assert!(!config.openai.is_configured());
    assert!(!config.dev_bypass_enabled());
}

#[test]
fn test_full_config() {
    let config = load_config_from_str(FULL_CONFIG).unwrap();

    assert_eq!(config.environment, Environment::Development);
    assert!(config.dev_bypass_enabled());
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.cors_origins.len(), 2);
    assert_eq!(config.auth.token_lifetime_secs, 3600);
    assert_eq!(config.auth.principal_header, "X-Forwarded-Principal");
    assert_eq!(config.access.approved_emails, vec!["alice@x.com", "bob@x.com"]);
    assert_eq!(config.access.refresh_timeout(), Duration::from_secs(5));
    assert_eq!(
        config.key_vault.secret_url("approved-users").as_deref(),
        Some("https://recipes-kv.vault.azure.net/secrets/approved-users?api-version=7.4")
    );
    assert_eq!(
        config.openai.completions_url().as_deref(),
        Some(
            "https://recipes.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-10-21"
        )
    );
}

#[test]
fn test_jwt_secret_is_redacted_in_debug() {
    let config = load_config_from_str(FULL_CONFIG).unwrap();
    let debug = format!("{:?}", config.auth);
    assert!(!debug.contains("full-config-signing-key"));
    assert!(debug.contains("[REDACTED]"));
}

#[test]
fn test_bypass_requires_development() {
    let config = load_config_from_str(
        r#"
environment = "production"

[access]
allow_unauthenticated = true
"#,
    )
    .unwrap();
    assert!(!config.dev_bypass_enabled());
}

#[test]
fn test_unknown_environment_rejected() {
    assert!(load_config_from_str(r#"environment = "staging-ish""#).is_err());
}

#[test]
#[serial_test::serial]
fn test_load_config_requires_signing_key() {
    use std::fs;
    use tempfile::tempdir;

    clear_env();
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("recipe-api.toml");
    fs::write(&config_path, "[server]\nport = 8081\n").unwrap();

    let err = load_config(Some(config_path.to_str().unwrap())).unwrap_err();
    assert!(err.to_string().contains("auth.jwt_secret"));
}

#[test]
#[serial_test::serial]
fn test_missing_explicit_file_is_error() {
    clear_env();
    let err = load_config(Some("/nonexistent/recipe-api.toml")).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
#[serial_test::serial]
fn test_conventional_env_vars_override_file() {
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    clear_env();
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("recipe-api.toml");
    fs::write(
        &config_path,
        r#"
[auth]
jwt_secret = "file-signing-key-0123456789abcdefghij"

[key_vault]
url = "https://file-kv.vault.azure.net"
"#,
    )
    .unwrap();

    unsafe {
        env::set_var("JWT_SECRET_KEY", "env-signing-key-0123456789abcdefghijk");
        env::set_var("KEY_VAULT_URL", "https://env-kv.vault.azure.net");
    }

    let config = load_config(Some(config_path.to_str().unwrap())).unwrap();

    assert_eq!(
        config.auth.jwt_secret.as_ref().unwrap().expose_secret(),
        "env-signing-key-0123456789abcdefghijk"
    );
    assert_eq!(
        config.key_vault.url.as_deref(),
        Some("https://env-kv.vault.azure.net")
    );

    clear_env();
}

#[test]
#[serial_test::serial]
fn test_prefixed_env_vars() {
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    clear_env();
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("recipe-api.toml");
    fs::write(
        &config_path,
        "[auth]\njwt_secret = \"prefixed-env-signing-key-0123456789ab\"\n",
    )
    .unwrap();

    unsafe {
        env::set_var("RECIPE_API__SERVER__PORT", "9191");
        env::set_var("RECIPE_API__ACCESS__APPROVED_EMAILS", "a@x.com,b@x.com");
    }

    let config = load_config(Some(config_path.to_str().unwrap())).unwrap();

    assert_eq!(config.server.port, 9191);
    assert_eq!(config.access.approved_emails, vec!["a@x.com", "b@x.com"]);

    clear_env();
}
