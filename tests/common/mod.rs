//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http_body_util::BodyExt;
use recipe_api::access_control::{
    AccessGate, AllowListCache, AllowListSource, IdentityChain, RefreshPolicy,
};
use recipe_api::auth::TokenService;
use recipe_api::config::AuthConfig;
use recipe_api::error::{SecretStoreError, SecretStoreResult};
use recipe_api::recipes::{InMemoryRecipeStore, RecipeImageProcessor};
use recipe_api::secrets::SecretStore;
use recipe_api::server::{AppState, build_router};
use recipe_api::util::SecretString;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-signing-key-0123456789abcdef";

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: Some(SecretString::new(TEST_SECRET)),
        ..Default::default()
    }
}

pub fn token_service() -> Arc<TokenService> {
    Arc::new(TokenService::new(&auth_config()).unwrap())
}

/// Base64 principal header carrying an `emails` claim
pub fn principal_header(email: &str) -> String {
    STANDARD.encode(
        json!({
            "identityProvider": "aad",
            "userId": "0f3c9a",
            "userDetails": email,
            "claims": [{ "typ": "emails", "val": email }]
        })
        .to_string(),
    )
}

/// Secret store that plays back a script of responses and counts fetches
///
/// `None` entries fail with a 503. Once the script runs out the last
/// successful list is repeated.
pub struct ScriptedStore {
    script: Mutex<VecDeque<Option<Vec<String>>>>,
    last: Mutex<Vec<String>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedStore {
    pub fn new(script: Vec<Option<Vec<&str>>>) -> Self {
        Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|step| step.map(|emails| emails.into_iter().map(String::from).collect()))
                    .collect(),
            ),
            last: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn serving(emails: &[&str]) -> Self {
        Self::new(vec![Some(emails.to_vec())])
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for ScriptedStore {
    async fn fetch_allow_list(&self, _name: &str) -> SecretStoreResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Some(emails)) => {
                *self.last.lock().unwrap() = emails.clone();
                Ok(emails)
            }
            Some(None) => Err(SecretStoreError::Api {
                status: 503,
                message: "Service unavailable".into(),
            }),
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }

    fn store_type(&self) -> &'static str {
        "scripted"
    }
}

pub fn cache_over(store: Arc<ScriptedStore>, policy: RefreshPolicy) -> Arc<AllowListCache> {
    Arc::new(AllowListCache::new(
        AllowListSource::SecretStore {
            store,
            secret_name: "approved-users".into(),
        },
        policy,
    ))
}

/// Gate with the standard identity chain over a scripted store
pub fn gate_over(store: Arc<ScriptedStore>, policy: RefreshPolicy) -> (AccessGate, Arc<TokenService>) {
    let tokens = token_service();
    let chain = IdentityChain::standard(tokens.clone(), "x-ms-client-principal").unwrap();
    (AccessGate::new(chain, cache_over(store, policy)), tokens)
}

/// Single-field multipart body; returns the content type and the body
pub fn multipart_body(field: &str, content_type: &str, data: &[u8]) -> (String, Vec<u8>) {
    let boundary = "recipe-api-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; \
             filename=\"recipe.png\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

/// Full router over a seeded recipe store and a fixed allow-list
pub fn app(
    allowed: &[&str],
    extractor: Option<Arc<RecipeImageProcessor>>,
) -> (Router, Arc<TokenService>) {
    let store = Arc::new(ScriptedStore::serving(allowed));
    let (gate, tokens) = gate_over(store, RefreshPolicy::default());
    let state = AppState::new(
        Arc::new(gate),
        tokens.clone(),
        Arc::new(InMemoryRecipeStore::with_seed_data()),
    )
    .with_extractor(extractor);

    let router = build_router(state, &["http://localhost:3000".to_string()]);
    (router, tokens)
}

/// Send a request and decode the JSON body (`Null` when empty)
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}
