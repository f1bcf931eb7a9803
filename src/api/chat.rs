//! `POST /v1/chat/completions` handler.
//!
//! Authenticates, classifies intent, issues the upstream call, and hands the
//! response byte stream to the pipeline. Streaming responses run the pipeline
//! in a spawned producer task coupled to the response body by the bounded
//! channel; non-streaming responses reuse the pipeline in collect form.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::error::{into_axum_response, ProxyError};
use crate::observability::log_request_complete;
use crate::pipeline::{RunEnd, SsePipeline, CHANNEL_CAPACITY};
use crate::protocol::openai::{
    encode_chunk_sse, encode_completion_body, ChatCompletionRequest, DONE_FRAME,
};
use crate::protocol::upstream::{build_upstream_request, UpstreamChatRequest};
use crate::protocol::{ChatMessage, ChatSession};
use crate::state::AppState;
use crate::util::unix_now_secs;

pub async fn handler(state: Arc<AppState>, headers: &HeaderMap, body: Bytes) -> Response {
    let started = Instant::now();

    if let Err(err) = state.authenticate(headers) {
        return into_axum_response(&err);
    }

    let request: ChatCompletionRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            return into_axum_response(&ProxyError::InvalidRequest(format!(
                "Invalid JSON body: {err}"
            )));
        }
    };
    if request.messages.is_empty() {
        return into_axum_response(&ProxyError::InvalidRequest(
            "messages must not be empty".to_string(),
        ));
    }
    let Some(model) = state.find_model(&request.model) else {
        return into_axum_response(&ProxyError::InvalidRequest(format!(
            "Unknown model: {}",
            request.model
        )));
    };

    let messages: Vec<ChatMessage> = request
        .messages
        .iter()
        .map(|m| ChatMessage {
            role: m.role,
            content: m.content.clone(),
            reasoning_content: None,
        })
        .collect();
    let flags = state.classifier.classify(&messages, model.mode);
    debug!(
        model = %model.alias,
        thinking = flags.enable_thinking,
        web_search = flags.enable_web_search,
        stream = request.stream,
        "chat request classified"
    );

    // The upstream expects UUID-shaped session and message identifiers.
    let session = ChatSession {
        session_id: uuid::Uuid::new_v4().to_string(),
        upstream_message_id: uuid::Uuid::new_v4().to_string(),
        model_alias: model.alias.clone(),
        upstream_model_id: model.upstream_id.clone(),
        messages,
        flags,
        is_streaming: request.stream,
    };
    let upstream_request = build_upstream_request(&session);

    let response = match send_with_token_retry(&state, &upstream_request).await {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, model = %session.model_alias, "upstream chat call failed");
            return into_axum_response(&err);
        }
    };
    let byte_stream = response.bytes_stream();

    let completion_id = state.next_completion_id();
    let created = unix_now_secs();
    let pipeline = SsePipeline::new(Arc::clone(&state.transformer));

    if session.is_streaming {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let model_alias = session.model_alias.clone();
        tokio::spawn(async move {
            match pipeline.run(byte_stream, tx).await {
                (RunEnd::Completed, _) => log_request_complete(&model_alias, true, started),
                (RunEnd::ClientDisconnected, _) => {
                    debug!(model = %model_alias, "client disconnected mid-stream");
                }
            }
        });

        let id = completion_id;
        let model_alias = session.model_alias;
        let frames = ReceiverStream::new(rx)
            .map(move |chunk| {
                Ok::<Bytes, Infallible>(Bytes::from(encode_chunk_sse(
                    &chunk,
                    &id,
                    &model_alias,
                    created,
                )))
            })
            .chain(futures_util::stream::once(async {
                Ok(Bytes::from_static(DONE_FRAME.as_bytes()))
            }));

        (
            StatusCode::OK,
            [
                (
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/event-stream"),
                ),
                (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            ],
            Body::from_stream(frames),
        )
            .into_response()
    } else {
        let collected = pipeline.collect(byte_stream).await;
        let body = encode_completion_body(
            &completion_id,
            &session.model_alias,
            created,
            &collected.content,
            &collected.reasoning_content,
            collected.usage,
        );
        log_request_complete(&session.model_alias, false, started);
        (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            body,
        )
            .into_response()
    }
}

/// Send the chat call, refreshing the cached token once if the upstream
/// rejects it as unauthorized.
async fn send_with_token_retry(
    state: &AppState,
    request: &UpstreamChatRequest,
) -> Result<reqwest::Response, ProxyError> {
    let token = state.upstream_token(false).await;
    match state.transport.send_chat_request(request, &token).await {
        Err(ProxyError::Upstream {
            status: status @ (401 | 403),
            ..
        }) => {
            debug!(status, "upstream rejected token, refreshing and retrying");
            let token = state.upstream_token(true).await;
            state.transport.send_chat_request(request, &token).await
        }
        other => other,
    }
}
