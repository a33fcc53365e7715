//! Time-windowed allow-list cache
//!
//! Entries and their refresh metadata live in one immutable [`Snapshot`]
//! that is swapped wholesale, so a reader sees either the old set or the new
//! one. Refreshes are serialised by an async mutex and double-checked after
//! the lock is taken, so a burst of requests on a stale cache triggers one
//! fetch.
//!
//! A failed refresh keeps the previous entries and timestamp. The next
//! attempt is scheduled with exponential backoff instead of on every request;
//! until then callers use the stale entries.
//!
//! If the future driving a refresh is dropped (the inbound request was
//! cancelled), the lock is released and the snapshot stays untouched, which
//! is the same outcome as a failed fetch.

use crate::config::AccessConfig;
use crate::error::{SecretStoreError, SecretStoreResult};
use crate::secrets::{ConfigSource, SecretStore};
use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, trace};

/// Longest delay between attempts, whatever the policy says
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Where the allow-list comes from
#[derive(Clone)]
pub enum AllowListSource {
    /// Remote secret holding a JSON array of emails
    SecretStore {
        store: Arc<dyn SecretStore>,
        secret_name: String,
    },
    /// Local configuration (development)
    Config(Arc<dyn ConfigSource>),
}

impl AllowListSource {
    async fn fetch(&self) -> SecretStoreResult<Vec<String>> {
        match self {
            AllowListSource::SecretStore { store, secret_name } => {
                store.fetch_allow_list(secret_name).await
            }
            AllowListSource::Config(source) => {
                let emails = source.approved_emails();
                if emails.is_empty() {
                    Err(SecretStoreError::Empty)
                } else {
                    Ok(emails)
                }
            }
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            AllowListSource::SecretStore { store, .. } => store.store_type(),
            AllowListSource::Config(_) => "configuration",
        }
    }
}

/// Timing rules for refreshes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Maximum age before entries are refreshed
    pub freshness: Duration,
    /// Upper bound on one fetch
    pub timeout: Duration,
    /// First retry delay after a failure; zero retries on every request
    pub backoff_initial: Duration,
    /// Ceiling for the retry delay
    pub backoff_max: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            freshness: Duration::from_secs(300),
            timeout: Duration::from_secs(10),
            backoff_initial: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
        }
    }
}

impl RefreshPolicy {
    pub fn from_config(config: &AccessConfig) -> Self {
        Self {
            freshness: config.cache_ttl(),
            timeout: config.refresh_timeout(),
            backoff_initial: Duration::from_secs(config.retry_backoff_initial_secs),
            backoff_max: Duration::from_secs(config.retry_backoff_max_secs),
        }
    }

    /// Delay before the next attempt after `failures` consecutive failures
    pub fn backoff_for(&self, failures: u32) -> Duration {
        if self.backoff_initial.is_zero() || failures == 0 {
            return Duration::ZERO;
        }
        let exponent = (failures - 1).min(16);
        self.backoff_initial
            .saturating_mul(1u32 << exponent)
            .min(self.backoff_max)
            .min(MAX_RETRY_DELAY)
    }
}

/// Immutable view of the cache
#[derive(Debug, Clone, Default)]
struct Snapshot {
    entries: Arc<HashSet<String>>,
    refreshed_at: Option<Instant>,
    retry_at: Option<Instant>,
    failures: u32,
}

/// Allow-list cache shared by all requests
pub struct AllowListCache {
    source: AllowListSource,
    policy: RefreshPolicy,
    state: RwLock<Arc<Snapshot>>,
    refresh_lock: Mutex<()>,
}

impl AllowListCache {
    /// Create an empty (stale) cache
    pub fn new(source: AllowListSource, policy: RefreshPolicy) -> Self {
        Self {
            source,
            policy,
            state: RwLock::new(Arc::new(Snapshot::default())),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Key Vault when a store is supplied, configuration otherwise
    pub fn from_config(
        config: &AccessConfig,
        secret_name: &str,
        store: Option<Arc<dyn SecretStore>>,
        local: Arc<dyn ConfigSource>,
    ) -> Self {
        let source = match store {
            Some(store) => AllowListSource::SecretStore {
                store,
                secret_name: secret_name.to_string(),
            },
            None => AllowListSource::Config(local),
        };
        Self::new(source, RefreshPolicy::from_config(config))
    }

    fn read_state(&self) -> RwLockReadGuard<'_, Arc<Snapshot>> {
        self.state.read().unwrap_or_else(|poisoned| {
            tracing::warn!("allow-list lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.read_state())
    }

    fn replace(&self, next: Snapshot) {
        let mut guard = self.state.write().unwrap_or_else(|poisoned| {
            tracing::warn!("allow-list lock poisoned, recovering");
            poisoned.into_inner()
        });
        *guard = Arc::new(next);
    }

    fn needs_refresh(&self, now: Instant) -> bool {
        let snapshot = self.snapshot();

        let fresh = snapshot
            .refreshed_at
            .is_some_and(|at| now.saturating_duration_since(at) < self.policy.freshness);
        if fresh {
            return false;
        }

        let backing_off = snapshot.retry_at.is_some_and(|at| now < at);
        !backing_off
    }

    /// Refresh if stale; never fails, at worst leaves stale entries in place
    pub async fn ensure_fresh(&self) {
        if !self.needs_refresh(Instant::now()) {
            return;
        }

        let _guard = self.refresh_lock.lock().await;
        if !self.needs_refresh(Instant::now()) {
            trace!("Allow-list refreshed by another request");
            return;
        }

        self.refresh_locked().await;
    }

    /// Refresh regardless of age; returns whether the fetch succeeded
    pub async fn refresh_now(&self) -> bool {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> bool {
        let source = self.source.describe();
        debug!(source, "Refreshing allow-list");

        let fetched = match tokio::time::timeout(self.policy.timeout, self.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(SecretStoreError::Timeout {
                timeout_secs: self.policy.timeout.as_secs(),
            }),
        };

        let previous = self.snapshot();
        match fetched {
            Ok(emails) => {
                let entries: HashSet<String> = emails
                    .iter()
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect();
                let count = entries.len();

                self.replace(Snapshot {
                    entries: Arc::new(entries),
                    refreshed_at: Some(Instant::now()),
                    retry_at: None,
                    failures: 0,
                });
                info!(source, count, "Loaded approved emails");
                true
            }
            Err(e) => {
                let failures = previous.failures.saturating_add(1);
                let delay = self.policy.backoff_for(failures);
                let retry_at = if delay.is_zero() {
                    None
                } else {
                    Instant::now().checked_add(delay)
                };

                self.replace(Snapshot {
                    entries: Arc::clone(&previous.entries),
                    refreshed_at: previous.refreshed_at,
                    retry_at,
                    failures,
                });
                error!(
                    source,
                    error = %e,
                    failures,
                    retry_in_secs = delay.as_secs(),
                    cached = previous.entries.len(),
                    "Failed to refresh allow-list, keeping previous entries"
                );
                false
            }
        }
    }

    /// Membership test against the current entries
    pub fn contains(&self, email: &str) -> bool {
        self.read_state().entries.contains(email)
    }

    pub fn len(&self) -> usize {
        self.read_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_fresh(&self) -> bool {
        let snapshot = self.snapshot();
        snapshot.refreshed_at.is_some_and(|at| {
            Instant::now().saturating_duration_since(at) < self.policy.freshness
        })
    }

    pub fn last_refreshed(&self) -> Option<Instant> {
        self.snapshot().refreshed_at
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.snapshot().failures
    }

    /// Current entries; the set is never mutated after publication
    pub fn entries(&self) -> Arc<HashSet<String>> {
        Arc::clone(&self.snapshot().entries)
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }
}
