//! Tests for planchain-llm: request types, SSE parsing, and stream collection

use bytes::Bytes;
use futures::StreamExt;
use planchain_llm::anthropic::parse_sse_stream;
use planchain_llm::*;

fn sse(events: &[(&str, &str)]) -> String {
    events
        .iter()
        .map(|(event, data)| format!("event: {}\ndata: {}\n\n", event, data))
        .collect()
}

fn byte_stream(
    chunks: Vec<String>,
) -> impl futures::Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    futures::stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
}

// ===========================================================================
// LlmRequest
// ===========================================================================

#[test]
fn llm_request_default() {
    let req = LlmRequest::default();
    assert!(req.model.contains("claude"));
    assert!(req.messages.is_empty());
    assert_eq!(req.max_tokens, Some(1024));
    assert!(req.temperature.is_none());
    assert!(req.system.is_none());
}

#[test]
fn llm_request_prompt_builds_one_user_turn() {
    let req = LlmRequest::prompt("m", "be terse", "hello");
    assert_eq!(req.messages, vec![LlmMessage::user("hello")]);
    assert_eq!(req.system.as_deref(), Some("be terse"));
    let json = serde_json::to_value(&req).unwrap();
    assert!(json.get("temperature").is_none());
}

// ===========================================================================
// SSE parsing
// ===========================================================================

#[tokio::test]
async fn text_deltas_are_collected() {
    let body = sse(&[
        ("message_start", r#"{"type":"message_start"}"#),
        (
            "content_block_delta",
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hel"}}"#,
        ),
        (
            "content_block_delta",
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"lo"}}"#,
        ),
        (
            "message_delta",
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":2}}"#,
        ),
        ("message_stop", r#"{"type":"message_stop"}"#),
    ]);
    let stream = parse_sse_stream(byte_stream(vec![body]), CancellationToken::new());
    let text = collect_text(Box::pin(stream)).await.unwrap();
    assert_eq!(text, "Hello");
}

#[tokio::test]
async fn events_split_across_chunks() {
    let body = sse(&[(
        "content_block_delta",
        r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"split"}}"#,
    )]);
    let (a, b) = body.split_at(body.len() / 2);
    let stream = parse_sse_stream(
        byte_stream(vec![a.to_string(), b.to_string()]),
        CancellationToken::new(),
    );
    let deltas: Vec<_> = stream.collect().await;
    assert_eq!(deltas.len(), 1);
    assert!(matches!(&deltas[0], Ok(StreamDelta::Text(t)) if t == "split"));
}

#[tokio::test]
async fn multibyte_text_split_across_chunks() {
    let body = sse(&[(
        "content_block_delta",
        r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"café München"}}"#,
    )])
    .into_bytes();
    // Cut between the two bytes of 'é'
    let cut = body.windows(2).position(|w| w == "é".as_bytes()).unwrap() + 1;
    let chunks = vec![
        Ok::<_, std::io::Error>(Bytes::copy_from_slice(&body[..cut])),
        Ok(Bytes::copy_from_slice(&body[cut..])),
    ];
    let stream = parse_sse_stream(futures::stream::iter(chunks), CancellationToken::new());
    let text = collect_text(Box::pin(stream)).await.unwrap();
    assert_eq!(text, "café München");
}

#[tokio::test]
async fn invalid_utf8_event_is_invalid_response() {
    let mut body = b"event: content_block_delta\ndata: ".to_vec();
    body.extend_from_slice(&[0xff, 0xfe]);
    body.extend_from_slice(b"\n\n");
    let chunks = vec![Ok::<_, std::io::Error>(Bytes::from(body))];
    let stream = parse_sse_stream(futures::stream::iter(chunks), CancellationToken::new());
    let err = collect_text(Box::pin(stream)).await.unwrap_err();
    assert!(matches!(err, LlmError::InvalidResponse(_)));
}

#[tokio::test]
async fn done_carries_usage() {
    let body = sse(&[
        (
            "message_delta",
            r#"{"type":"message_delta","delta":{"stop_reason":"max_tokens"},"usage":{"output_tokens":9}}"#,
        ),
        ("message_stop", r#"{"type":"message_stop"}"#),
    ]);
    let deltas: Vec<_> = parse_sse_stream(byte_stream(vec![body]), CancellationToken::new())
        .collect()
        .await;
    match &deltas[0] {
        Ok(StreamDelta::Done { stop_reason, usage }) => {
            assert_eq!(stop_reason.as_deref(), Some("max_tokens"));
            assert_eq!(usage.as_ref().unwrap().output_tokens, 9);
        }
        other => panic!("expected Done, got {:?}", other),
    }
}

#[tokio::test]
async fn error_event_fails_collection() {
    let body = sse(&[(
        "error",
        r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
    )]);
    let stream = parse_sse_stream(byte_stream(vec![body]), CancellationToken::new());
    let err = collect_text(Box::pin(stream)).await.unwrap_err();
    assert!(err.to_string().contains("Overloaded"));
}

#[tokio::test]
async fn cancelled_token_ends_stream() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let pending = futures::stream::pending::<Result<Bytes, std::io::Error>>();
    let stream = parse_sse_stream(pending, cancel);
    let err = collect_text(Box::pin(stream)).await.unwrap_err();
    assert!(matches!(err, LlmError::Cancelled));
}

#[tokio::test]
async fn unreachable_endpoint_is_network_error() {
    let provider =
        AnthropicProvider::new("test-key").with_base_url("http://127.0.0.1:9/v1/messages");
    let result = provider
        .complete_stream(LlmRequest::prompt("m", "s", "u"), None)
        .await;
    assert!(matches!(result, Err(LlmError::NetworkError(_))));
}
