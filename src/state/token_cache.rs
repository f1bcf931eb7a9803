//! Upstream bearer-token cache with single-flight refresh.
//!
//! Reads are lock-free in the common case (shared read lock on a small
//! struct); a refresh takes an async mutex so concurrent cold callers fund
//! exactly one credential fetch between them. Acquisition failures fall back
//! to the statically configured token instead of failing the request.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::warn;

use crate::error::ProxyError;

struct CachedToken {
    token: Arc<str>,
    expires_at: Instant,
}

pub struct AuthTokenCache {
    ttl: Duration,
    static_token: Arc<str>,
    cached: RwLock<Option<CachedToken>>,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl AuthTokenCache {
    #[must_use]
    pub fn new(token_cache_minutes: u64, static_token: &str) -> Self {
        Self {
            ttl: Duration::from_secs(token_cache_minutes * 60),
            static_token: Arc::from(static_token),
            cached: RwLock::new(None),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Return a usable bearer token, fetching one via `fetch` when the cache
    /// is cold, expired, or `refresh` forces it.
    ///
    /// At most one fetch runs at a time; callers that lose the race reuse the
    /// winner's token. When the fetch fails the static token is returned and
    /// nothing is cached, so the next call retries.
    pub async fn get_with<F, Fut>(&self, refresh: bool, fetch: F) -> Arc<str>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, ProxyError>>,
    {
        if !refresh {
            if let Some(token) = self.read_valid() {
                return token;
            }
        }

        let _gate = self.refresh_gate.lock().await;
        // Someone else may have refreshed while we waited on the gate.
        if !refresh {
            if let Some(token) = self.read_valid() {
                return token;
            }
        }

        match fetch().await {
            Ok(token) => {
                let token: Arc<str> = Arc::from(token.as_str());
                *self.cached.write() = Some(CachedToken {
                    token: Arc::clone(&token),
                    expires_at: Instant::now() + self.ttl,
                });
                token
            }
            Err(err) => {
                warn!(error = %err, "token acquisition failed, using static token");
                Arc::clone(&self.static_token)
            }
        }
    }

    /// Whether the credential path currently has any token to offer.
    #[must_use]
    pub fn has_any_token(&self) -> bool {
        self.read_valid().is_some() || !self.static_token.is_empty()
    }

    fn read_valid(&self) -> Option<Arc<str>> {
        let cached = self.cached.read();
        cached
            .as_ref()
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| Arc::clone(&entry.token))
    }
}
