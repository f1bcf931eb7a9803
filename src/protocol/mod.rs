pub mod openai;
pub mod upstream;

use serde::{Deserialize, Serialize};

/// Conversation role accepted on the inbound surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single conversation message. Immutable once constructed; ordering within
/// a session is conversation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
}

/// Upstream feature switches derived once per request by the intent classifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    pub enable_thinking: bool,
    pub enable_web_search: bool,
    pub enable_auto_web_search: bool,
    /// Ordered upstream MCP server identifiers; order is part of the payload.
    pub mcp_servers: Vec<&'static str>,
}

impl FeatureFlags {
    /// No thinking, no search.
    #[must_use]
    pub fn basic() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_thinking() -> Self {
        Self {
            enable_thinking: true,
            ..Self::default()
        }
    }

    /// Search implies thinking in this system.
    #[must_use]
    pub fn with_search() -> Self {
        Self {
            enable_thinking: true,
            enable_web_search: true,
            enable_auto_web_search: true,
            mcp_servers: vec!["deep-web-search"],
        }
    }
}

/// Per-request session. Created once per inbound request, never mutated after
/// construction, discarded when the response completes.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub session_id: String,
    pub upstream_message_id: String,
    pub model_alias: String,
    pub upstream_model_id: String,
    pub messages: Vec<ChatMessage>,
    pub flags: FeatureFlags,
    pub is_streaming: bool,
}

/// One client-facing delta produced by the pipeline. Ordering mirrors upstream
/// frame order exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundChunk {
    pub index: usize,
    pub role: Option<Role>,
    pub content: Option<String>,
    pub reasoning_content: Option<String>,
    pub finish_reason: Option<&'static str>,
}

impl OutboundChunk {
    #[must_use]
    pub fn role_marker() -> Self {
        Self {
            role: Some(Role::Assistant),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn content(text: String) -> Self {
        Self {
            content: Some(text),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn reasoning(text: String) -> Self {
        Self {
            reasoning_content: Some(text),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn terminal() -> Self {
        Self {
            finish_reason: Some("stop"),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.finish_reason.is_some()
    }
}
