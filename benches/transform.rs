use criterion::{black_box, criterion_group, criterion_main, Criterion};

use zbridge_rs::classify::IntentClassifier;
use zbridge_rs::config::{ClassifierConfig, ModelMode, ThinkTagsMode};
use zbridge_rs::protocol::openai::encode_chunk_sse;
use zbridge_rs::protocol::upstream::{Phase, UpstreamFrame};
use zbridge_rs::protocol::{ChatMessage, OutboundChunk, Role};
use zbridge_rs::transform::ContentTagTransformer;

const THINKING_FRAGMENT: &str = "<details class=\"reasoning\"><summary>Thought for 3 seconds</summary>\n> The user asks about streaming backpressure.\n> A bounded channel keeps memory flat while the\n> writer catches up with the reader.</details>";

const ANSWER_FRAME: &str =
    r#"{"type":"chat","data":{"delta_content":"Backpressure keeps producers honest.","phase":"answer"}}"#;

fn bench_transform(c: &mut Criterion) {
    let transformer = ContentTagTransformer::new(ThinkTagsMode::Think);
    c.bench_function("transform_thinking_fragment", |b| {
        b.iter(|| transformer.transform(black_box(THINKING_FRAGMENT), Phase::Thinking));
    });

    c.bench_function("transform_answer_noop", |b| {
        b.iter(|| transformer.transform(black_box("plain answer text"), Phase::Answer));
    });
}

fn bench_frame_decode(c: &mut Criterion) {
    c.bench_function("decode_answer_frame", |b| {
        b.iter(|| UpstreamFrame::decode(black_box(ANSWER_FRAME)));
    });
}

fn bench_chunk_encode(c: &mut Criterion) {
    let chunk = OutboundChunk::content("Backpressure keeps producers honest.".to_string());
    c.bench_function("encode_content_chunk", |b| {
        b.iter(|| {
            encode_chunk_sse(
                black_box(&chunk),
                "chatcmpl-0123456789abcdef",
                "glm-4.5",
                1_722_000_000,
            )
        });
    });
}

fn bench_classify(c: &mut Criterion) {
    let classifier = IntentClassifier::new(&ClassifierConfig {
        intent_cache_ttl_secs: 0,
        ..ClassifierConfig::default()
    });
    let messages = [ChatMessage {
        role: Role::User,
        content: "explain the latest benchmark results and analyze why the numbers moved"
            .to_string(),
        reasoning_content: None,
    }];
    c.bench_function("classify_auto_mode", |b| {
        b.iter(|| classifier.classify(black_box(&messages), ModelMode::Auto));
    });
}

criterion_group!(
    benches,
    bench_transform,
    bench_frame_decode,
    bench_chunk_encode,
    bench_classify
);
criterion_main!(benches);
