//! Upstream stream translation pipeline.
//!
//! Consumes the upstream response byte stream, splits it into `data:` frames,
//! decodes each frame, and pushes [`OutboundChunk`]s through a bounded channel
//! to whoever is writing the client response. The channel gives the two stages
//! independent scheduling with backpressure: when the writer falls behind the
//! producer suspends on `send` instead of buffering or dropping.
//!
//! State machine: `AwaitingFirst -> Streaming -> Terminated`. The first
//! decoded frame triggers a lone assistant-role marker chunk; an upstream
//! error or done signal moves to `Terminated`, after which remaining input
//! is not consumed.

pub mod lines;

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::protocol::openai::Usage;
use crate::protocol::upstream::UpstreamFrame;
use crate::protocol::OutboundChunk;
use crate::transform::ContentTagTransformer;

use self::lines::DataLineSplitter;

/// Bounded queue capacity between the upstream reader and the client writer.
pub const CHANNEL_CAPACITY: usize = 1000;

/// Shown to the client when the upstream reports an error mid-stream.
pub const UPSTREAM_ERROR_APOLOGY: &str =
    "I apologize, but the upstream service reported an error and this response was cut short.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    AwaitingFirst,
    Streaming,
    Terminated,
}

/// Everything a non-streaming response needs from one pipeline run.
#[derive(Debug, Default)]
pub struct CollectedResponse {
    pub content: String,
    pub reasoning_content: String,
    pub usage: Usage,
}

/// How a pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// The upstream stream was driven to completion (or failure) and the
    /// terminal chunk was delivered.
    Completed,
    /// The receiver was dropped mid-stream; the upstream read was abandoned.
    ClientDisconnected,
}

pub struct SsePipeline {
    transformer: Arc<ContentTagTransformer>,
    splitter: DataLineSplitter,
    state: PipelineState,
    usage: Option<Usage>,
}

impl SsePipeline {
    #[must_use]
    pub fn new(transformer: Arc<ContentTagTransformer>) -> Self {
        Self {
            transformer,
            splitter: DataLineSplitter::new(),
            state: PipelineState::AwaitingFirst,
            usage: None,
        }
    }

    /// Drive the upstream byte stream to completion, emitting chunks into
    /// `tx`. Returns how the run ended plus the last usage report the
    /// upstream sent, if any.
    ///
    /// A dropped receiver means the client disconnected; the run returns
    /// without further emission. The upstream read itself races against
    /// `tx.closed()`, so a disconnect is observed even while the upstream
    /// is stalled rather than only on the next `send`. If the stream ends
    /// or fails before a done signal, a terminal chunk is still emitted so
    /// the client side can close cleanly.
    pub async fn run<S, E>(
        mut self,
        byte_stream: S,
        tx: mpsc::Sender<OutboundChunk>,
    ) -> (RunEnd, Option<Usage>)
    where
        S: Stream<Item = Result<bytes::Bytes, E>>,
        E: std::fmt::Display,
    {
        futures_util::pin_mut!(byte_stream);
        let mut payloads = Vec::with_capacity(8);

        'read: while self.state != PipelineState::Terminated {
            let next = tokio::select! {
                next = byte_stream.next() => next,
                () = tx.closed() => {
                    debug!("client disconnected while waiting on the upstream");
                    return (RunEnd::ClientDisconnected, self.usage);
                }
            };
            let Some(next) = next else {
                break;
            };
            let bytes = match next {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(error = %err, "upstream byte stream failed mid-response");
                    break;
                }
            };
            self.splitter.feed_into(&bytes, &mut payloads);
            for payload in payloads.drain(..) {
                if self.state == PipelineState::Terminated {
                    break 'read;
                }
                if !self.handle_payload(&payload, &tx).await {
                    // Receiver gone: the client disconnected.
                    return (RunEnd::ClientDisconnected, self.usage);
                }
            }
        }

        if self.state != PipelineState::Terminated {
            // Upstream ended without a done frame; close the stream anyway.
            let _ = tx.send(OutboundChunk::terminal()).await;
        }
        (RunEnd::Completed, self.usage)
    }

    /// Run the pipeline and accumulate all output instead of streaming it.
    ///
    /// Uses the same channel-coupled producer so streaming and buffered
    /// responses share one code path.
    pub async fn collect<S, E>(self, byte_stream: S) -> CollectedResponse
    where
        S: Stream<Item = Result<bytes::Bytes, E>>,
        E: std::fmt::Display,
    {
        let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
        let producer = self.run(byte_stream, tx);
        futures_util::pin_mut!(producer);

        let mut collected = CollectedResponse::default();
        let mut usage = None;
        let mut producer_done = false;
        loop {
            tokio::select! {
                chunk = rx.recv() => match chunk {
                    Some(chunk) => {
                        if let Some(ref content) = chunk.content {
                            collected.content.push_str(content);
                        }
                        if let Some(ref reasoning) = chunk.reasoning_content {
                            collected.reasoning_content.push_str(reasoning);
                        }
                    }
                    None => break,
                },
                (_, reported) = &mut producer, if !producer_done => {
                    usage = reported;
                    producer_done = true;
                }
            }
        }
        collected.usage = usage.unwrap_or_default();
        collected
    }

    /// Process one decoded payload. Returns `false` when the receiver is
    /// closed and the pipeline should stop immediately.
    async fn handle_payload(&mut self, payload: &str, tx: &mpsc::Sender<OutboundChunk>) -> bool {
        let frame = match UpstreamFrame::decode(payload) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(error = %err, "skipping malformed upstream frame");
                return true;
            }
        };

        if self.state == PipelineState::AwaitingFirst {
            if tx.send(OutboundChunk::role_marker()).await.is_err() {
                return false;
            }
            self.state = PipelineState::Streaming;
        }

        if let Some(error) = frame.error() {
            warn!(
                detail = error.detail.as_deref().unwrap_or("unknown"),
                "upstream signalled an error, terminating stream"
            );
            if tx
                .send(OutboundChunk::content(UPSTREAM_ERROR_APOLOGY.to_string()))
                .await
                .is_err()
            {
                return false;
            }
            if tx.send(OutboundChunk::terminal()).await.is_err() {
                return false;
            }
            self.state = PipelineState::Terminated;
            return true;
        }

        if let Some(reported) = frame.usage() {
            self.usage = Some(reported);
        }

        if let Some(delta) = frame.delta_content() {
            if !delta.is_empty() {
                let split = self.transformer.classify(delta, frame.phase());
                if let Some(content) = split.content {
                    if tx.send(OutboundChunk::content(content)).await.is_err() {
                        return false;
                    }
                } else if let Some(reasoning) = split.reasoning_content {
                    if tx.send(OutboundChunk::reasoning(reasoning)).await.is_err() {
                        return false;
                    }
                }
            }
        }

        if frame.is_done() {
            if tx.send(OutboundChunk::terminal()).await.is_err() {
                return false;
            }
            self.state = PipelineState::Terminated;
        }
        true
    }
}
