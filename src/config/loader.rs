//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Conventional environment variables (JWT_SECRET_KEY, KEY_VAULT_URL, AZURE_OPENAI_*)
//! 2. Environment variables (RECIPE_API__*)
//! 3. Configuration file (TOML)
//! 4. Default values

use crate::access_control::MAX_RETRY_DELAY;
use crate::config::types::AppConfig;
use crate::error::ConfigError;
use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use std::path::Path;
use tracing::warn;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "recipe-api.toml",
    ".recipe-api.toml",
    "~/.config/recipe-api/config.toml",
    "/etc/recipe-api/config.toml",
];

/// Conventional variables mapped onto nested keys
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("JWT_SECRET_KEY", "auth.jwt_secret"),
    ("KEY_VAULT_URL", "key_vault.url"),
    ("AZURE_OPENAI_ENDPOINT", "openai.endpoint"),
    ("AZURE_OPENAI_API_KEY", "openai.api_key"),
    ("AZURE_OPENAI_DEPLOYMENT", "openai.deployment"),
];

/// Upper bound on Key Vault request retries
const MAX_VAULT_RETRIES: u32 = 10;

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    // No signing key requirement for tests
    validate_config_relaxed(&app_config)?;

    Ok(app_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        // Explicit path provided - must exist
        if !Path::new(path).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::new(path, FileFormat::Toml));
    } else {
        // First existing default path wins
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // e.g., RECIPE_API__SERVER__PORT, RECIPE_API__ACCESS__APPROVED_EMAILS=a@x.com,b@x.com
    builder = builder.add_source(
        Environment::with_prefix("RECIPE_API")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("access.approved_emails")
            .with_list_parse_key("access.public_paths")
            .with_list_parse_key("server.cors_origins")
            .try_parsing(true),
    );

    builder = apply_env_overrides(builder)?;

    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

fn apply_env_overrides(
    mut builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    for (var, key) in ENV_OVERRIDES {
        if let Ok(value) = std::env::var(var)
            && !value.is_empty()
        {
            builder = builder
                .set_override(*key, value)
                .map_err(|e| ConfigError::Load(e.to_string()))?;
        }
    }
    Ok(builder)
}

/// Validate configuration values (relaxed - for testing without a signing key)
fn validate_config_relaxed(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::Invalid {
            message: "server.port must be greater than 0".to_string(),
        });
    }

    if config.access.cache_ttl_secs == 0 {
        return Err(ConfigError::Invalid {
            message: "access.cache_ttl_secs must be greater than 0".to_string(),
        });
    }

    if config.access.refresh_timeout_secs == 0 {
        return Err(ConfigError::Invalid {
            message: "access.refresh_timeout_secs must be greater than 0".to_string(),
        });
    }

    if config.access.retry_backoff_max_secs < config.access.retry_backoff_initial_secs {
        return Err(ConfigError::Invalid {
            message: "access.retry_backoff_max_secs must not be below retry_backoff_initial_secs"
                .to_string(),
        });
    }

    if config.access.retry_backoff_max_secs > MAX_RETRY_DELAY.as_secs() {
        return Err(ConfigError::Invalid {
            message: format!(
                "access.retry_backoff_max_secs must be at most {}",
                MAX_RETRY_DELAY.as_secs()
            ),
        });
    }

    if config.key_vault.max_retries > MAX_VAULT_RETRIES {
        return Err(ConfigError::Invalid {
            message: format!("key_vault.max_retries must be at most {}", MAX_VAULT_RETRIES),
        });
    }

    for path in &config.access.public_paths {
        if !path.starts_with('/') {
            return Err(ConfigError::Invalid {
                message: format!("access.public_paths entries must start with '/', got: {}", path),
            });
        }
    }

    if let Some(url) = &config.key_vault.url
        && !url.trim().is_empty()
    {
        validate_url(url, "key_vault.url")?;
        if config.key_vault.secret_name.is_empty() {
            return Err(ConfigError::Missing {
                field: "key_vault.secret_name".to_string(),
            });
        }
    }

    let openai = &config.openai;
    let set = [
        openai.endpoint.is_some(),
        openai.api_key.is_some(),
        openai.deployment.is_some(),
    ];
    if set.iter().any(|s| *s) && !set.iter().all(|s| *s) {
        return Err(ConfigError::Invalid {
            message: "openai.endpoint, openai.api_key and openai.deployment must be set together"
                .to_string(),
        });
    }
    if let Some(endpoint) = &openai.endpoint {
        validate_url(endpoint, "openai.endpoint")?;
    }

    Ok(())
}

/// Validate configuration values
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_config_relaxed(config)?;

    match &config.auth.jwt_secret {
        None => {
            return Err(ConfigError::Missing {
                field: "auth.jwt_secret (set JWT_SECRET_KEY environment variable)".to_string(),
            });
        }
        Some(secret) if secret.is_empty() => {
            return Err(ConfigError::Invalid {
                message: "auth.jwt_secret must not be empty".to_string(),
            });
        }
        Some(secret) if secret.as_bytes().len() < 32 => {
            warn!("auth.jwt_secret is shorter than 32 bytes; use a longer key for HS256");
        }
        Some(_) => {}
    }

    if config.access.allow_unauthenticated && !config.dev_bypass_enabled() {
        warn!("access.allow_unauthenticated is ignored outside the development environment");
    }

    if !config.key_vault.is_enabled() && config.access.approved_emails.is_empty() {
        warn!("No Key Vault configured and access.approved_emails is empty; every identity will be denied");
    }

    Ok(())
}

fn validate_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Invalid {
            message: format!("{} must start with http:// or https://, got: {}", field, url),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment as DeployEnvironment;

    #[test]
    fn test_load_config_from_str_basic() {
        let toml = r#"
environment = "development"

[server]
port = 9090

[access]
allow_unauthenticated = true
approved_emails = ["Dev@Local.test"]
"#;

        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.environment, DeployEnvironment::Development);
        assert_eq!(config.server.port, 9090);
        assert!(config.dev_bypass_enabled());
        assert_eq!(config.access.approved_emails, vec!["Dev@Local.test"]);
    }

    #[test]
    fn test_invalid_vault_url_error() {
        let toml = r#"
[key_vault]
url = "vault.example.net"
"#;

        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_partial_openai_config_rejected() {
        let toml = r#"
[openai]
endpoint = "https://ai.example.com"
"#;

        assert!(load_config_from_str(toml).is_err());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let toml = r#"
[access]
cache_ttl_secs = 0
"#;

        assert!(load_config_from_str(toml).is_err());
    }

    #[test]
    fn test_backoff_ceiling_below_initial_rejected() {
        let toml = r#"
[access]
retry_backoff_initial_secs = 60
retry_backoff_max_secs = 10
"#;

        assert!(load_config_from_str(toml).is_err());
    }

    #[test]
    fn test_huge_backoff_rejected() {
        let toml = r#"
[access]
retry_backoff_initial_secs = 9223372036854775807
retry_backoff_max_secs = 9223372036854775807
"#;

        let result = load_config_from_str(toml);
        assert!(
            matches!(result, Err(ConfigError::Invalid { message }) if message.contains("retry_backoff_max_secs"))
        );
    }

    #[test]
    fn test_day_long_backoff_accepted() {
        let toml = r#"
[access]
retry_backoff_max_secs = 86400
"#;

        assert!(load_config_from_str(toml).is_ok());
    }

    #[test]
    fn test_excessive_vault_retries_rejected() {
        let toml = r#"
[key_vault]
max_retries = 64
"#;

        assert!(matches!(
            load_config_from_str(toml),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_public_path_must_be_absolute() {
        let toml = r#"
[access]
public_paths = ["health"]
"#;

        assert!(load_config_from_str(toml).is_err());
    }

    #[test]
    fn test_missing_jwt_secret() {
        let config = AppConfig::default();
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_blank_jwt_secret() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = Some("   ".into());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_valid_full_config() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = Some("0123456789abcdef0123456789abcdef".into());
        config.key_vault.url = Some("https://vault.example.net".to_string());
        assert!(validate_config(&config).is_ok());
    }
}
