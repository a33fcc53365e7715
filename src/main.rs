//! Recipe API server
//!
//! Serves the recipe catalog behind the email allow-list gate.

use axum::http::HeaderName;
use clap::Parser;
use recipe_api::{
    access_control::{AccessGate, AllowListCache},
    auth::create_token_service,
    config::{AppConfig, load_config},
    recipes::{InMemoryRecipeStore, RecipeImageProcessor},
    secrets::{KeyVaultClient, SecretStore, StaticAllowList, create_credential},
    server::{AppState, build_router, serve},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Recipe API - recipe catalog behind an email allow-list
#[derive(Parser, Debug)]
#[command(name = "recipe-api")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "RECIPE_API_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RECIPE_API_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (pretty, json)
    #[arg(long, env = "RECIPE_API_LOG_FORMAT", default_value = "pretty")]
    log_format: String,

    /// Override the configured bind host
    #[arg(long, env = "RECIPE_API_HOST")]
    host: Option<String>,

    /// Override the configured bind port
    #[arg(long, env = "RECIPE_API_PORT")]
    port: Option<u16>,
}

fn init_logging(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if args.log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Key Vault when configured, otherwise `access.approved_emails`
fn create_allow_list(config: &AppConfig) -> anyhow::Result<Arc<AllowListCache>> {
    let local = Arc::new(StaticAllowList::from_config(&config.access));

    let store: Option<Arc<dyn SecretStore>> = if config.key_vault.is_enabled() {
        let credential =
            create_credential(config.key_vault.access_token.as_ref(), reqwest::Client::new())
                .inspect_err(|e| error!(error = %e, "Failed to create Key Vault credential"))?;
        let client = KeyVaultClient::new(&config.key_vault, credential)
            .inspect_err(|e| error!(error = %e, "Failed to create Key Vault client"))?;
        info!(
            vault = config.key_vault.url.as_deref().unwrap_or_default(),
            secret = %config.key_vault.secret_name,
            "Using Key Vault allow-list"
        );
        let client: Arc<dyn SecretStore> = Arc::new(client);
        Some(client)
    } else {
        info!(
            count = config.access.approved_emails.len(),
            "Using allow-list from configuration"
        );
        None
    };

    Ok(Arc::new(AllowListCache::from_config(
        &config.access,
        &config.key_vault.secret_name,
        store,
        local,
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before clap reads env fallbacks
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Recipe API");

    // Load configuration
    let mut config = load_config(args.config.as_deref())
        .inspect_err(|e| error!(error = %e, "Failed to load configuration"))?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let tokens = create_token_service(&config.auth)
        .inspect_err(|e| error!(error = %e, "Failed to create token service"))?;

    let allow_list = create_allow_list(&config)?;
    if !allow_list.refresh_now().await {
        warn!("Initial allow-list load failed; requests will be denied until a refresh succeeds");
    }

    let gate = AccessGate::from_config(&config, tokens.clone(), allow_list)
        .inspect_err(|e| error!(error = %e, "Failed to create access gate"))?;
    if gate.dev_bypass() {
        warn!("Unauthenticated access is enabled; every request is admitted");
    }

    let extractor = match RecipeImageProcessor::new(&config.openai) {
        Ok(processor) => Some(Arc::new(processor)),
        Err(e) => {
            info!(reason = %e, "Recipe extraction from images is disabled");
            None
        }
    };

    let principal_header: HeaderName = config.auth.principal_header.trim().parse()?;
    let state = AppState::new(
        Arc::new(gate),
        tokens,
        Arc::new(InMemoryRecipeStore::with_seed_data()),
    )
    .with_extractor(extractor)
    .with_principal_header(principal_header);

    let router = build_router(state, &config.server.cors_origins);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
        }
        signal.cancel();
    });

    serve(&config.server, router, shutdown).await
}
