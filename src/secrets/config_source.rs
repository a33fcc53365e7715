//! Local allow-list source

use crate::config::AccessConfig;

/// Synchronous, local allow-list read
pub trait ConfigSource: Send + Sync {
    fn approved_emails(&self) -> Vec<String>;
}

/// Allow-list fixed at startup from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticAllowList {
    emails: Vec<String>,
}

impl StaticAllowList {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            emails: emails.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &AccessConfig) -> Self {
        Self::new(config.approved_emails.iter().cloned())
    }
}

impl ConfigSource for StaticAllowList {
    fn approved_emails(&self) -> Vec<String> {
        self.emails.clone()
    }
}
