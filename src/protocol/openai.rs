//! Inbound OpenAI Chat Completions wire types and the response assembler.
//!
//! Streaming chunks are encoded by hand onto a `String` rather than through
//! serde so the per-delta hot path never allocates intermediate values.

use serde::Deserialize;

use super::{OutboundChunk, Role};
use crate::util::{push_json_string_escaped, push_u64_decimal};

pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// `POST /v1/chat/completions` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<InboundMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

/// Token accounting reported by the upstream, zeroed when absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Encode one [`OutboundChunk`] as a `chat.completion.chunk` SSE line.
#[must_use]
pub fn encode_chunk_sse(chunk: &OutboundChunk, id: &str, model: &str, created: u64) -> String {
    let payload_len = chunk.content.as_deref().map_or(0, str::len)
        + chunk.reasoning_content.as_deref().map_or(0, str::len);
    let mut out = String::with_capacity(144 + id.len() + model.len() + payload_len);
    push_chunk_prefix(&mut out, id, model, created);
    out.push_str(",\"choices\":[{\"index\":0,\"delta\":{");

    let mut first = true;
    if let Some(role) = chunk.role {
        out.push_str("\"role\":");
        push_json_string_escaped(&mut out, role.as_str());
        first = false;
    }
    if let Some(ref content) = chunk.content {
        if !first {
            out.push(',');
        }
        out.push_str("\"content\":");
        push_json_string_escaped(&mut out, content);
        first = false;
    }
    if let Some(ref reasoning) = chunk.reasoning_content {
        if !first {
            out.push(',');
        }
        out.push_str("\"reasoning_content\":");
        push_json_string_escaped(&mut out, reasoning);
    }

    out.push_str("},\"finish_reason\":");
    match chunk.finish_reason {
        Some(reason) => push_json_string_escaped(&mut out, reason),
        None => out.push_str("null"),
    }
    out.push_str("}]}\n\n");
    out
}

/// Encode the aggregated non-streaming `chat.completion` body.
#[must_use]
pub fn encode_completion_body(
    id: &str,
    model: &str,
    created: u64,
    content: &str,
    reasoning_content: &str,
    usage: Usage,
) -> String {
    let mut out =
        String::with_capacity(256 + id.len() + model.len() + content.len() + reasoning_content.len());
    out.push_str("{\"id\":");
    push_json_string_escaped(&mut out, id);
    out.push_str(",\"object\":\"chat.completion\",\"created\":");
    push_u64_decimal(&mut out, created);
    out.push_str(",\"model\":");
    push_json_string_escaped(&mut out, model);
    out.push_str(",\"choices\":[{\"index\":0,\"message\":{\"role\":\"assistant\",\"content\":");
    push_json_string_escaped(&mut out, content);
    if !reasoning_content.is_empty() {
        out.push_str(",\"reasoning_content\":");
        push_json_string_escaped(&mut out, reasoning_content);
    }
    out.push_str("},\"finish_reason\":\"stop\"}],\"usage\":{\"prompt_tokens\":");
    push_u64_decimal(&mut out, usage.prompt_tokens);
    out.push_str(",\"completion_tokens\":");
    push_u64_decimal(&mut out, usage.completion_tokens);
    out.push_str(",\"total_tokens\":");
    push_u64_decimal(&mut out, usage.total_tokens);
    out.push_str("}}");
    out
}

fn push_chunk_prefix(out: &mut String, id: &str, model: &str, created: u64) {
    out.push_str("data: {\"id\":");
    push_json_string_escaped(out, id);
    out.push_str(",\"object\":\"chat.completion.chunk\",\"created\":");
    push_u64_decimal(out, created);
    out.push_str(",\"model\":");
    push_json_string_escaped(out, model);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_chunk(sse: &str) -> serde_json::Value {
        assert!(sse.starts_with("data: "), "missing data prefix: {sse}");
        assert!(sse.ends_with("\n\n"), "missing frame terminator: {sse}");
        serde_json::from_str(sse.trim_start_matches("data: ").trim()).expect("valid chunk json")
    }

    #[test]
    fn role_marker_chunk_carries_only_role() {
        let sse = encode_chunk_sse(&OutboundChunk::role_marker(), "chatcmpl-1", "glm-4.5", 1_700_000_000);
        let json = decode_chunk(&sse);
        assert_eq!(json["object"], "chat.completion.chunk");
        assert_eq!(json["choices"][0]["delta"]["role"], "assistant");
        assert!(json["choices"][0]["delta"].get("content").is_none());
        assert!(json["choices"][0]["finish_reason"].is_null());
    }

    #[test]
    fn content_chunk_escapes_payload() {
        let sse = encode_chunk_sse(
            &OutboundChunk::content("line\n\"quoted\"".to_string()),
            "chatcmpl-1",
            "glm-4.5",
            0,
        );
        let json = decode_chunk(&sse);
        assert_eq!(json["choices"][0]["delta"]["content"], "line\n\"quoted\"");
    }

    #[test]
    fn reasoning_chunk_uses_reasoning_field() {
        let sse = encode_chunk_sse(
            &OutboundChunk::reasoning("because".to_string()),
            "chatcmpl-1",
            "glm-4.5",
            0,
        );
        let json = decode_chunk(&sse);
        assert_eq!(json["choices"][0]["delta"]["reasoning_content"], "because");
        assert!(json["choices"][0]["delta"].get("content").is_none());
    }

    #[test]
    fn terminal_chunk_sets_stop() {
        let sse = encode_chunk_sse(&OutboundChunk::terminal(), "chatcmpl-1", "glm-4.5", 0);
        let json = decode_chunk(&sse);
        assert_eq!(json["choices"][0]["finish_reason"], "stop");
        assert_eq!(json["choices"][0]["delta"], serde_json::json!({}));
    }

    #[test]
    fn completion_body_includes_usage_and_reasoning() {
        let body = encode_completion_body(
            "chatcmpl-2",
            "glm-4.5",
            1_700_000_000,
            "Hi there",
            "greeting detected",
            Usage {
                prompt_tokens: 3,
                completion_tokens: 2,
                total_tokens: 5,
            },
        );
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["object"], "chat.completion");
        assert_eq!(json["choices"][0]["message"]["content"], "Hi there");
        assert_eq!(
            json["choices"][0]["message"]["reasoning_content"],
            "greeting detected"
        );
        assert_eq!(json["usage"]["total_tokens"], 5);
    }

    #[test]
    fn completion_body_omits_empty_reasoning() {
        let body = encode_completion_body("chatcmpl-3", "glm-4.5", 0, "ok", "", Usage::default());
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(json["choices"][0]["message"].get("reasoning_content").is_none());
        assert_eq!(json["usage"]["prompt_tokens"], 0);
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let req: ChatCompletionRequest = serde_json::from_value(serde_json::json!({
            "model": "glm-4.5",
            "messages": [{"role": "user", "content": "hello"}]
        }))
        .unwrap();
        assert!(!req.stream);
        assert!(req.temperature.is_none());
        assert_eq!(req.messages[0].role, Role::User);
    }
}
