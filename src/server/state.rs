//! Shared handler state

use crate::access_control::{AccessGate, PRINCIPAL_HEADER};
use crate::auth::TokenService;
use crate::recipes::{RecipeImageProcessor, RecipeStore};
use axum::http::HeaderName;
use std::sync::Arc;

/// State shared by the gate middleware and all handlers
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AccessGate>,
    pub tokens: Arc<TokenService>,
    pub recipes: Arc<dyn RecipeStore>,
    /// `None` when Azure OpenAI is not configured
    pub extractor: Option<Arc<RecipeImageProcessor>>,
    /// Header the token endpoint reads the platform principal from
    pub principal_header: HeaderName,
}

impl AppState {
    pub fn new(
        gate: Arc<AccessGate>,
        tokens: Arc<TokenService>,
        recipes: Arc<dyn RecipeStore>,
    ) -> Self {
        Self {
            gate,
            tokens,
            recipes,
            extractor: None,
            principal_header: HeaderName::from_static(PRINCIPAL_HEADER),
        }
    }

    pub fn with_extractor(mut self, extractor: Option<Arc<RecipeImageProcessor>>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_principal_header(mut self, header: HeaderName) -> Self {
        self.principal_header = header;
        self
    }
}
