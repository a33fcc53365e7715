//! HTTP server
//!
//! Routes, the access gate middleware, and the serve loop.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use crate::config::ServerConfig;
use crate::recipes::MAX_IMAGE_BYTES;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Slack on top of the image limit for multipart framing and other fields
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// CORS policy for the configured frontend origins
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the application router with the gate applied to every route
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let gate = axum::middleware::from_fn_with_state(state.clone(), middleware::gate_requests);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/auth/token", post(handlers::issue_token))
        .route(
            "/api/recipes",
            get(handlers::list_recipes).post(handlers::create_recipe),
        )
        .route(
            "/api/recipes/{id}",
            get(handlers::get_recipe).delete(handlers::delete_recipe),
        )
        .route(
            "/api/recipes/from-image",
            post(handlers::extract_from_image)
                .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + MULTIPART_OVERHEAD)),
        )
        .route("/api/recipes/save-extracted", post(handlers::save_extracted))
        .layer(gate)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` is cancelled
pub async fn serve(
    config: &ServerConfig,
    router: Router,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Recipe API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}
