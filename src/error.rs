//! Error types for recipe-api
//!
//! Each subsystem has its own `thiserror` enum. The binary reports startup
//! failures through `anyhow`; handlers convert to HTTP responses in
//! `server::error`.

use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },
}

/// Authentication errors
///
/// Raised by the token service and the principal header decoder. The access
/// gate never surfaces these to callers; they demote a source to "no identity".
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No signing key configured")]
    NotConfigured,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Malformed principal header: {0}")]
    MalformedPrincipal(String),

    #[error("Failed to issue token: {0}")]
    Issue(String),

    #[error("Credential error: {0}")]
    Credential(String),
}

/// Errors from the remote secret store
#[derive(Error, Debug)]
pub enum SecretStoreError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Secret store error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Secret not found: {name}")]
    NotFound { name: String },

    #[error("Unauthorized: secret store rejected the access token")]
    Unauthorized,

    #[error("Forbidden: identity lacks permission to read '{name}'")]
    Forbidden { name: String },

    #[error("Secret '{name}' is not a JSON array of strings: {reason}")]
    InvalidSecret { name: String, reason: String },

    #[error("Allow-list source returned no entries")]
    Empty,

    #[error("Secret store is not configured")]
    NotConfigured,

    #[error("Credential error: {0}")]
    Credential(#[from] AuthError),

    #[error("Timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}

impl SecretStoreError {
    /// Create an appropriate error from an HTTP status code and response body
    pub fn from_response(status: u16, name: &str, body: &str) -> Self {
        match status {
            401 => SecretStoreError::Unauthorized,
            403 => SecretStoreError::Forbidden {
                name: name.to_string(),
            },
            404 => SecretStoreError::NotFound {
                name: name.to_string(),
            },
            _ => SecretStoreError::Api {
                status,
                message: if body.is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.to_string()
                },
            },
        }
    }
}

/// Recipe catalog errors
#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("Recipe {id} not found")]
    NotFound { id: i64 },

    #[error("Invalid recipe: {field} {reason}")]
    Validation { field: &'static str, reason: String },
}

impl RecipeError {
    pub fn required(field: &'static str) -> Self {
        Self::Validation {
            field,
            reason: "is required".into(),
        }
    }

    pub fn too_long(field: &'static str, max: usize) -> Self {
        Self::Validation {
            field,
            reason: format!("must be at most {} characters", max),
        }
    }
}

/// Image-to-recipe extraction errors
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("No image file provided")]
    NoImage,

    #[error("Image file size exceeds maximum allowed size of {max_mb}MB")]
    TooLarge { max_mb: usize },

    #[error("Invalid file type. Allowed types: {allowed}")]
    UnsupportedType { allowed: String },

    #[error("Image extraction is not configured")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Vision API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to extract recipe information from image")]
    NoRecipe,

    #[error("Invalid response from vision API: {0}")]
    InvalidResponse(String),
}

impl ExtractionError {
    /// Whether the error is the caller's fault (bad upload) rather than upstream
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ExtractionError::NoImage
                | ExtractionError::TooLarge { .. }
                | ExtractionError::UnsupportedType { .. }
        )
    }
}

/// Result type alias for secret store operations
pub type SecretStoreResult<T> = std::result::Result<T, SecretStoreError>;

/// Result type alias for recipe operations
pub type RecipeResult<T> = std::result::Result<T, RecipeError>;
