//! Caller identity resolution
//!
//! Identity comes from an ordered chain of resolvers. Each one looks at the
//! request and either produces an [`Identity`] or passes. The first success
//! wins and results are never merged. A resolver that finds a broken
//! credential logs it and passes; it never rejects the request itself.

use crate::auth::{ClientPrincipal, TokenService};
use crate::error::ConfigError;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, Method, header};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default name of the platform principal header
pub const PRINCIPAL_HEADER: &str = "x-ms-client-principal";

/// Normalized (trimmed, lower-cased) email used as the authorization key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Normalize a raw email; blank input yields `None`
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The parts of an inbound request the gate looks at
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub headers: &'a HeaderMap,
}

impl<'a> GateRequest<'a> {
    pub fn new(method: &'a Method, path: &'a str, headers: &'a HeaderMap) -> Self {
        Self {
            method,
            path,
            headers,
        }
    }

    pub fn from_parts(parts: &'a Parts) -> Self {
        Self::new(&parts.method, parts.uri.path(), &parts.headers)
    }

    /// First value of a header, if it is valid visible ASCII
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&'a str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Token from `Authorization: Bearer <token>` (scheme is case-insensitive)
    pub fn bearer_token(&self) -> Option<&'a str> {
        let value = self.header(header::AUTHORIZATION)?;
        let (scheme, token) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        (!token.is_empty()).then_some(token)
    }
}

/// One source of caller identity
pub trait IdentityResolver: Send + Sync {
    /// Produce an identity, or `None` to let the next resolver try
    fn resolve(&self, request: &GateRequest<'_>) -> Option<Identity>;

    /// Short name of the source (for logging)
    fn name(&self) -> &'static str;
}

/// Box type alias for identity resolvers
pub type BoxedIdentityResolver = Box<dyn IdentityResolver>;

/// Identity from a bearer JWT issued by this service
pub struct BearerTokenResolver {
    tokens: Arc<TokenService>,
}

impl BearerTokenResolver {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }
}

impl IdentityResolver for BearerTokenResolver {
    fn resolve(&self, request: &GateRequest<'_>) -> Option<Identity> {
        let token = request.bearer_token()?;

        match self.tokens.validate(token) {
            Ok(claims) => {
                let identity = claims.email().and_then(Identity::parse);
                if identity.is_none() {
                    warn!(path = request.path, "Bearer token has no email claim");
                }
                identity
            }
            Err(e) => {
                warn!(path = request.path, error = %e, "Bearer token rejected, trying next source");
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "bearer"
    }
}

/// Identity from the platform principal header
pub struct PrincipalHeaderResolver {
    header: HeaderName,
}

impl PrincipalHeaderResolver {
    pub fn new(header: &str) -> Result<Self, ConfigError> {
        let header = HeaderName::from_bytes(header.trim().as_bytes()).map_err(|e| {
            ConfigError::Invalid {
                message: format!("auth.principal_header '{}' is not a header name: {}", header, e),
            }
        })?;
        Ok(Self { header })
    }
}

impl Default for PrincipalHeaderResolver {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static(PRINCIPAL_HEADER),
        }
    }
}

impl IdentityResolver for PrincipalHeaderResolver {
    fn resolve(&self, request: &GateRequest<'_>) -> Option<Identity> {
        let raw = request.header(&self.header)?;
        if raw.trim().is_empty() {
            return None;
        }

        match ClientPrincipal::from_header(raw) {
            Ok(principal) => principal.email().and_then(Identity::parse),
            Err(e) => {
                warn!(path = request.path, error = %e, "Failed to parse principal header");
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "principal"
    }
}

/// Ordered resolvers; first success wins
#[derive(Default)]
pub struct IdentityChain {
    resolvers: Vec<BoxedIdentityResolver>,
}

impl IdentityChain {
    pub fn new(resolvers: Vec<BoxedIdentityResolver>) -> Self {
        Self { resolvers }
    }

    /// Bearer token first, then the principal header
    pub fn standard(tokens: Arc<TokenService>, principal_header: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(vec![
            Box::new(BearerTokenResolver::new(tokens)),
            Box::new(PrincipalHeaderResolver::new(principal_header)?),
        ]))
    }

    pub fn push(&mut self, resolver: BoxedIdentityResolver) {
        self.resolvers.push(resolver);
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Resolve the caller, returning the identity and the name of its source
    pub fn resolve(&self, request: &GateRequest<'_>) -> Option<(Identity, &'static str)> {
        self.resolvers.iter().find_map(|resolver| {
            let identity = resolver.resolve(request)?;
            debug!(source = resolver.name(), identity = %identity, "Resolved caller identity");
            Some((identity, resolver.name()))
        })
    }
}
