mod models_cache;
mod request_id;
pub mod token_cache;

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::auth::authenticate;
use crate::classify::IntentClassifier;
use crate::config::{AppConfig, ModelConfig};
use crate::error::ProxyError;
use crate::transform::ContentTagTransformer;
use crate::transport::UpstreamTransport;
use crate::util::unix_now_secs;

use models_cache::{build_dynamic_models_body, build_initial_models_body, ModelsCache};
use request_id::CompletionIdGenerator;
use token_cache::AuthTokenCache;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub transport: UpstreamTransport,
    pub classifier: IntentClassifier,
    pub transformer: Arc<ContentTagTransformer>,
    token_cache: AuthTokenCache,
    models_cache: ModelsCache,
    completion_ids: CompletionIdGenerator,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, transport: UpstreamTransport) -> Self {
        let classifier = IntentClassifier::new(&config.classifier);
        let transformer = Arc::new(ContentTagTransformer::new(config.features.think_tags_mode));
        let token_cache = AuthTokenCache::new(
            config.upstream.token_cache_minutes,
            &config.upstream.static_token,
        );
        let models_cache = ModelsCache::new(
            build_initial_models_body(&config),
            config.server.models_cache_ttl_secs,
        );
        Self {
            config,
            transport,
            classifier,
            transformer,
            token_cache,
            models_cache,
            completion_ids: CompletionIdGenerator::new(),
        }
    }

    /// Validate the client bearer key.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Auth` when the key is missing or invalid.
    pub fn authenticate(&self, headers: &http::HeaderMap) -> Result<(), ProxyError> {
        authenticate(headers, &self.config.client_authentication.api_key)
    }

    #[must_use]
    pub fn find_model(&self, alias: &str) -> Option<&ModelConfig> {
        self.config.models.iter().find(|m| m.alias == alias)
    }

    #[must_use]
    pub fn next_completion_id(&self) -> String {
        self.completion_ids.next()
    }

    /// Fetch or reuse the upstream bearer token.
    pub async fn upstream_token(&self, refresh: bool) -> Arc<str> {
        self.token_cache
            .get_with(refresh, || self.transport.fetch_guest_token())
            .await
    }

    /// Whether the credential path can currently produce a token, fetching
    /// one if nothing is cached yet.
    pub async fn credential_healthy(&self) -> bool {
        if self.token_cache.has_any_token() {
            return true;
        }
        !self.upstream_token(false).await.is_empty()
    }

    #[must_use]
    pub fn models_body(&self) -> Bytes {
        self.models_cache.body()
    }

    /// Kick off a background models refresh when the TTL has lapsed.
    pub fn maybe_refresh_models(self: &Arc<Self>) {
        if !self.models_cache.try_begin_refresh(unix_now_secs()) {
            return;
        }
        let state = Arc::clone(self);
        tokio::spawn(async move {
            state.refresh_models().await;
            state.models_cache.finish_refresh();
        });
    }

    async fn refresh_models(&self) {
        let token = self.upstream_token(false).await;
        match self.transport.fetch_models(&token).await {
            Ok(listing) => {
                if let Some(body) = build_dynamic_models_body(&self.config, &listing) {
                    self.models_cache.set_body(body);
                } else {
                    debug!("upstream listing confirmed no configured model, keeping cached body");
                }
            }
            Err(err) => {
                debug!(error = %err, "model listing refresh failed, keeping cached body");
            }
        }
    }
}
