//! HTTP transport to the z.ai upstream.
//!
//! One shared `reqwest` client covers the chat endpoint, the anonymous
//! credential endpoint, and the model listing. Errors are mapped into the
//! canonical taxonomy here so callers never see raw `reqwest` errors.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::config::{ServerConfig, UpstreamConfig};
use crate::error::ProxyError;
use crate::protocol::upstream::UpstreamChatRequest;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36";
const FE_VERSION: &str = "prod-fe-1.0.53";

/// z.ai upstream transport, shared across all sessions.
pub struct UpstreamTransport {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
}

/// One entry from the upstream model listing.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamModelEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<UpstreamModelEntry>,
}

impl UpstreamTransport {
    /// Build the shared client from server and upstream settings.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Transport`] when the TLS backend fails to
    /// initialize.
    pub fn new(server: &ServerConfig, upstream: &UpstreamConfig) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(server.http_pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(server.http_pool_idle_timeout_secs))
            .tcp_nodelay(true)
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(server.timeout))
            .build()
            .map_err(|err| ProxyError::Transport(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            base_url: upstream.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Issue the chat call and return the checked response; callers pull the
    /// body via [`reqwest::Response::bytes_stream`].
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::UpstreamTimeout`] on deadline, [`ProxyError::Upstream`]
    /// on a non-2xx status, and [`ProxyError::Transport`] for everything else.
    pub async fn send_chat_request(
        &self,
        request: &UpstreamChatRequest,
        token: &str,
    ) -> Result<reqwest::Response, ProxyError> {
        let url = format!("{}/api/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header("User-Agent", USER_AGENT)
            .header("X-FE-Version", FE_VERSION)
            .header("Referer", format!("{}/", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProxyError::Upstream {
                status: status.as_u16(),
                message: truncate_for_log(&body),
            });
        }
        Ok(response)
    }

    /// Fetch an anonymous guest token from the credential endpoint.
    ///
    /// # Errors
    ///
    /// Same mapping as [`Self::send_chat_request`]; an empty token in an
    /// otherwise valid response is also a transport error.
    pub async fn fetch_guest_token(&self) -> Result<String, ProxyError> {
        let url = format!("{}/api/v1/auths/", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .header("X-FE-Version", FE_VERSION)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::Upstream {
                status: status.as_u16(),
                message: "credential endpoint returned non-success".to_string(),
            });
        }
        let auth: AuthResponse = response.json().await.map_err(map_reqwest_error)?;
        if auth.token.is_empty() {
            return Err(ProxyError::Transport(
                "credential endpoint returned an empty token".to_string(),
            ));
        }
        debug!("acquired anonymous upstream token");
        Ok(auth.token)
    }

    /// Fetch the upstream model listing.
    ///
    /// # Errors
    ///
    /// Same mapping as [`Self::send_chat_request`].
    pub async fn fetch_models(&self, token: &str) -> Result<Vec<UpstreamModelEntry>, ProxyError> {
        let url = format!("{}/api/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header("User-Agent", USER_AGENT)
            .header("X-FE-Version", FE_VERSION)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::Upstream {
                status: status.as_u16(),
                message: "model listing returned non-success".to_string(),
            });
        }
        let models: ModelsResponse = response.json().await.map_err(map_reqwest_error)?;
        Ok(models.data)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ProxyError {
    if err.is_timeout() {
        ProxyError::UpstreamTimeout(err.to_string())
    } else {
        ProxyError::Transport(err.to_string())
    }
}

fn truncate_for_log(body: &str) -> String {
    const MAX: usize = 512;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
