//! Access gate
//!
//! Decides, per request, whether it reaches the application. The order of
//! checks is:
//! 1. CORS preflight (`OPTIONS`) and public paths are admitted untouched
//! 2. development bypass, when enabled
//! 3. identity resolution; no identity means 401
//! 4. allow-list freshness check (may refresh)
//! 5. membership; absent means 403 echoing the identity

use crate::access_control::allow_list::AllowListCache;
use crate::access_control::identity::{GateRequest, Identity, IdentityChain};
use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::error::ConfigError;
use axum::http::{Method, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Why a request was admitted or rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    Preflight,
    PublicPath,
    DevelopmentBypass,
    Authorized,
    AuthenticationRequired,
    AccessDenied,
}

/// Outcome of [`AccessGate::evaluate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub admit: bool,
    pub reason: DecisionReason,
    pub identity: Option<Identity>,
}

/// JSON body sent with a 401 or 403
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectionBody {
    pub error: &'static str,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl GateDecision {
    fn admitted(reason: DecisionReason, identity: Option<Identity>) -> Self {
        Self {
            admit: true,
            reason,
            identity,
        }
    }

    fn authentication_required() -> Self {
        Self {
            admit: false,
            reason: DecisionReason::AuthenticationRequired,
            identity: None,
        }
    }

    fn access_denied(identity: Identity) -> Self {
        Self {
            admit: false,
            reason: DecisionReason::AccessDenied,
            identity: Some(identity),
        }
    }

    pub fn is_admitted(&self) -> bool {
        self.admit
    }

    /// HTTP status for a rejection (200 for admitted requests)
    pub fn status(&self) -> StatusCode {
        match self.reason {
            DecisionReason::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            DecisionReason::AccessDenied => StatusCode::FORBIDDEN,
            _ => StatusCode::OK,
        }
    }

    /// Body to send back when the request is rejected
    pub fn rejection(&self) -> Option<RejectionBody> {
        match self.reason {
            DecisionReason::AuthenticationRequired => Some(RejectionBody {
                error: "Authentication required",
                message: "Please log in to access this resource.",
                email: None,
            }),
            DecisionReason::AccessDenied => Some(RejectionBody {
                error: "Access denied",
                message: "Your account is not authorized to access this application. \
                          Please contact an administrator.",
                email: self.identity.as_ref().map(|i| i.as_str().to_string()),
            }),
            _ => None,
        }
    }
}

/// Request gate backed by the allow-list cache
pub struct AccessGate {
    identities: IdentityChain,
    allow_list: Arc<AllowListCache>,
    public_paths: Vec<String>,
    dev_bypass: bool,
}

impl AccessGate {
    /// Gate with the default public paths and no development bypass
    pub fn new(identities: IdentityChain, allow_list: Arc<AllowListCache>) -> Self {
        Self {
            identities,
            allow_list,
            public_paths: vec!["/health".into(), "/.auth".into(), "/api/auth/token".into()],
            dev_bypass: false,
        }
    }

    /// Standard identity chain, configured public paths and bypass flag
    pub fn from_config(
        config: &AppConfig,
        tokens: Arc<TokenService>,
        allow_list: Arc<AllowListCache>,
    ) -> Result<Self, ConfigError> {
        let identities = IdentityChain::standard(tokens, &config.auth.principal_header)?;
        Ok(Self::new(identities, allow_list)
            .with_public_paths(&config.access.public_paths)
            .with_dev_bypass(config.dev_bypass_enabled()))
    }

    /// Replace the public path prefixes (matched case-insensitively)
    pub fn with_public_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.public_paths = paths
            .into_iter()
            .map(|p| p.as_ref().to_lowercase())
            .collect();
        self
    }

    /// Admit everything without identity checks (local development only)
    pub fn with_dev_bypass(mut self, enabled: bool) -> Self {
        self.dev_bypass = enabled;
        self
    }

    pub fn allow_list(&self) -> &Arc<AllowListCache> {
        &self.allow_list
    }

    pub fn dev_bypass(&self) -> bool {
        self.dev_bypass
    }

    fn is_public(&self, path: &str) -> bool {
        let path = path.to_lowercase();
        self.public_paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Admit or reject a request
    pub async fn evaluate(&self, request: &GateRequest<'_>) -> GateDecision {
        let path = request.path;

        if request.method == Method::OPTIONS {
            trace!(path, "Preflight request admitted");
            return GateDecision::admitted(DecisionReason::Preflight, None);
        }

        if self.is_public(path) {
            trace!(path, "Public path admitted");
            return GateDecision::admitted(DecisionReason::PublicPath, None);
        }

        if self.dev_bypass {
            info!(path, "Development mode: skipping authentication");
            return GateDecision::admitted(DecisionReason::DevelopmentBypass, None);
        }

        let Some((identity, source)) = self.identities.resolve(request) else {
            warn!(path, "Unauthenticated access attempt");
            return GateDecision::authentication_required();
        };

        self.allow_list.ensure_fresh().await;

        if !self.allow_list.contains(identity.as_str()) {
            warn!(email = %identity, path, source, "Unauthorized access attempt");
            return GateDecision::access_denied(identity);
        }

        debug!(email = %identity, path, source, "Authorized access");
        GateDecision::admitted(DecisionReason::Authorized, Some(identity))
    }
}
