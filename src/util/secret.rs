//! Secret string type for signing keys and API credentials.
//!
//! Keeps sensitive configuration values out of `Debug` output, logs and
//! error messages.

use serde::Deserialize;
use std::fmt;

/// A wrapper for secrets that prevents accidental logging.
///
/// Used for the JWT signing key, Key Vault access tokens and the vision API
/// key. `Debug` and `Display` both print `[REDACTED]`; reading the value needs
/// an explicit [`SecretString::expose_secret`] call.
#[derive(Clone, Default)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Explicitly expose the secret value.
    #[inline]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Raw bytes, for HMAC key construction.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        // Best-effort only; copies made elsewhere are not cleared.
        self.0.clear();
        self.0.shrink_to_fit();
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString::new)
    }
}
