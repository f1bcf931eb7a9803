//! z.ai upstream wire format: outbound request construction and SSE frame decode.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ChatMessage, ChatSession};
use crate::protocol::openai::Usage;

/// Outbound payload sent to the upstream chat endpoint.
///
/// The upstream is always asked to stream; non-streaming client requests are
/// buffered on our side.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamChatRequest {
    pub stream: bool,
    pub chat_id: String,
    pub id: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub features: UpstreamFeatures,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mcp_servers: Vec<&'static str>,
    pub variables: Value,
}

/// Feature switches in the upstream's boolean-map vocabulary.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamFeatures {
    pub enable_thinking: bool,
    pub web_search: bool,
    pub auto_web_search: bool,
}

/// Deterministically map a classified session to the upstream payload.
/// Construction cannot fail on a valid session.
#[must_use]
pub fn build_upstream_request(session: &ChatSession) -> UpstreamChatRequest {
    let now = chrono::Local::now();
    UpstreamChatRequest {
        stream: true,
        chat_id: session.session_id.clone(),
        id: session.upstream_message_id.clone(),
        model: session.upstream_model_id.clone(),
        messages: session.messages.clone(),
        features: UpstreamFeatures {
            enable_thinking: session.flags.enable_thinking,
            web_search: session.flags.enable_web_search,
            auto_web_search: session.flags.enable_auto_web_search,
        },
        mcp_servers: session.flags.mcp_servers.clone(),
        variables: serde_json::json!({
            "{{USER_NAME}}": "User",
            "{{USER_LOCATION}}": "Unknown",
            "{{CURRENT_DATETIME}}": now.format("%Y-%m-%d %H:%M:%S").to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Upstream SSE frame decode
// ---------------------------------------------------------------------------

/// Content phase reported on upstream deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Thinking,
    Answer,
    Done,
    #[default]
    #[serde(other)]
    Other,
}

/// Error payload carried inside a frame. The upstream nests this at the top
/// level, inside `data`, or inside `data.data` depending on failure origin.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameError {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub code: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameData {
    #[serde(default)]
    pub delta_content: Option<String>,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub error: Option<FrameError>,
    #[serde(default)]
    pub data: Option<InnerFrameData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InnerFrameData {
    #[serde(default)]
    pub error: Option<FrameError>,
}

/// One decoded upstream SSE frame. Transient; consumed immediately.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamFrame {
    #[serde(default, rename = "type")]
    pub frame_type: Option<String>,
    #[serde(default)]
    pub error: Option<FrameError>,
    #[serde(default)]
    pub data: Option<FrameData>,
}

impl UpstreamFrame {
    /// Decode a single `data:` payload.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error on malformed JSON; callers
    /// skip such frames without terminating the stream.
    pub fn decode(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Probe all three nesting levels once; first match wins.
    #[must_use]
    pub fn error(&self) -> Option<&FrameError> {
        if let Some(ref err) = self.error {
            return Some(err);
        }
        let data = self.data.as_ref()?;
        if let Some(ref err) = data.error {
            return Some(err);
        }
        data.data.as_ref()?.error.as_ref()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.data.as_ref().map_or(Phase::Other, |d| d.phase)
    }

    #[must_use]
    pub fn delta_content(&self) -> Option<&str> {
        self.data.as_ref()?.delta_content.as_deref()
    }

    /// Terminal when the `done` flag is set or the phase reports `done`.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.data
            .as_ref()
            .is_some_and(|d| d.done || d.phase == Phase::Done)
    }

    #[must_use]
    pub fn usage(&self) -> Option<Usage> {
        self.data.as_ref()?.usage
    }
}
