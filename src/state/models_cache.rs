//! Cached `/v1/models` response body.
//!
//! The body starts from the configured aliases and is refreshed in the
//! background from the upstream model listing. Refreshes are opt-in via
//! `try_begin_refresh` so at most one is in flight and the handler never
//! waits on the upstream.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;
use serde_json::Value;

use crate::config::AppConfig;
use crate::transport::UpstreamModelEntry;

const MODEL_CREATED_UNIX: u64 = 1_722_000_000;
const OWNED_BY: &str = "z.ai";

pub(crate) struct ModelsCache {
    body: RwLock<Bytes>,
    ttl_secs: u64,
    next_refresh_unix: AtomicU64,
    refreshing: AtomicBool,
}

impl ModelsCache {
    #[must_use]
    pub(crate) fn new(initial_body: Bytes, ttl_secs: u64) -> Self {
        Self {
            body: RwLock::new(initial_body),
            ttl_secs,
            next_refresh_unix: AtomicU64::new(0),
            refreshing: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub(crate) fn body(&self) -> Bytes {
        self.body.read().clone()
    }

    pub(crate) fn set_body(&self, body: Bytes) {
        *self.body.write() = body;
    }

    /// Claim the refresh slot if the TTL has lapsed. The claimant must call
    /// [`Self::finish_refresh`] when done, success or not.
    #[must_use]
    pub(crate) fn try_begin_refresh(&self, now: u64) -> bool {
        if self.ttl_secs == 0 {
            return false;
        }
        let next = self.next_refresh_unix.load(Ordering::Relaxed);
        if now < next {
            return false;
        }
        if self.refreshing.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.next_refresh_unix
            .store(now.saturating_add(self.ttl_secs), Ordering::Relaxed);
        true
    }

    pub(crate) fn finish_refresh(&self) {
        self.refreshing.store(false, Ordering::Release);
    }
}

/// Build the static body listing every configured alias.
pub(crate) fn build_initial_models_body(config: &AppConfig) -> Bytes {
    let aliases: Vec<&str> = config.models.iter().map(|m| m.alias.as_str()).collect();
    build_models_body(&aliases)
}

/// Build a body restricted to aliases whose upstream model is present in the
/// fetched listing. Returns `None` when the listing confirms nothing, so the
/// caller keeps the previous body.
pub(crate) fn build_dynamic_models_body(
    config: &AppConfig,
    upstream_models: &[UpstreamModelEntry],
) -> Option<Bytes> {
    let aliases: Vec<&str> = config
        .models
        .iter()
        .filter(|m| upstream_models.iter().any(|u| u.id == m.upstream_id))
        .map(|m| m.alias.as_str())
        .collect();
    if aliases.is_empty() {
        return None;
    }
    Some(build_models_body(&aliases))
}

fn build_models_body(aliases: &[&str]) -> Bytes {
    let data: Vec<Value> = aliases
        .iter()
        .map(|alias| {
            serde_json::json!({
                "id": alias,
                "object": "model",
                "created": MODEL_CREATED_UNIX,
                "owned_by": OWNED_BY,
            })
        })
        .collect();
    let payload = serde_json::json!({
        "object": "list",
        "data": data,
    });
    serde_json::to_vec(&payload).map_or_else(
        |_| Bytes::from_static(br#"{"object":"list","data":[]}"#),
        Bytes::from,
    )
}
