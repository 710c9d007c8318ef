//! Tests for the JSON shape of results and chunks.

use mira_core::{
    CompletionResult, FinishReason, Message, ResponseEnvelope, Role, StreamChunk, Usage,
};
use serde_json::json;

fn envelope() -> ResponseEnvelope {
    ResponseEnvelope::new("chatcmpl-42", 1_700_000_000, "openai/gpt-4o-mini")
}

#[test]
fn test_role_chunk_shape() {
    let chunk = envelope().role_chunk(Role::Assistant);
    let value = serde_json::to_value(&chunk).unwrap();

    assert_eq!(
        value,
        json!({
            "id": "chatcmpl-42",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000,
            "model": "openai/gpt-4o-mini",
            "choices": [{"index": 0, "delta": {"role": "assistant"}}]
        })
    );
}

#[test]
fn test_content_chunk_has_no_role() {
    let value = serde_json::to_value(envelope().content_chunk("Hello")).unwrap();
    assert_eq!(value["choices"][0]["delta"], json!({"content": "Hello"}));
    assert!(value["choices"][0].get("finish_reason").is_none());
}

#[test]
fn test_finish_chunk_has_empty_delta() {
    let chunk = envelope().finish_chunk(FinishReason::Stop);
    let value = serde_json::to_value(&chunk).unwrap();

    assert_eq!(value["choices"][0]["delta"], json!({}));
    assert_eq!(value["choices"][0]["finish_reason"], "stop");
    assert!(chunk.choices[0].delta.is_empty());
}

#[test]
fn test_chunks_share_identity() {
    let envelope = envelope();
    let chunks = [
        envelope.role_chunk(Role::Assistant),
        envelope.content_chunk("Hi"),
        envelope.finish_chunk(FinishReason::Stop),
    ];
    assert!(chunks.iter().all(|c| c.id == "chatcmpl-42"));
    assert!(chunks.iter().all(|c| c.created == 1_700_000_000));
}

#[test]
fn test_chunk_decodes_from_wire() {
    let chunk: StreamChunk = serde_json::from_str(
        r#"{"id":"x","object":"chat.completion.chunk","created":1,"model":"m",
            "choices":[{"index":0,"delta":{"content":"! How"}}]}"#,
    )
    .unwrap();

    assert_eq!(chunk.content(), Some("! How"));
    assert_eq!(chunk.role(), None);
    assert_eq!(chunk.finish_reason(), None);
}

#[test]
fn test_completion_shape() {
    let result = envelope()
        .with_fingerprint("fp_abc")
        .completion(
            Message::assistant("Hello! How can I assist you today?"),
            FinishReason::Stop,
            Usage::new(30, 10),
        );
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["object"], "chat.completion");
    assert_eq!(value["system_fingerprint"], "fp_abc");
    assert_eq!(value["choices"][0]["message"]["role"], "assistant");
    assert_eq!(value["choices"][0]["finish_reason"], "stop");
    assert!(value["choices"][0]["logprobs"].is_null());
    assert!(value["choices"][0].get("tool_calls").is_none());
    assert_eq!(
        value["usage"],
        json!({"prompt_tokens": 30, "completion_tokens": 10, "total_tokens": 40})
    );
}

#[test]
fn test_completion_decodes_tool_calls() {
    let result: CompletionResult = serde_json::from_value(json!({
        "id": "x", "object": "chat.completion", "created": 1, "model": "m",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": ""},
            "finish_reason": "tool_calls",
            "logprobs": null,
            "tool_calls": [{"id": "call_1", "type": "function", "function": {"name": "weather"}}]
        }],
        "usage": {"prompt_tokens": 1, "completion_tokens": 2, "total_tokens": 3}
    }))
    .unwrap();

    assert_eq!(result.choices[0].finish_reason, FinishReason::ToolCalls);
    assert_eq!(result.choices[0].tool_calls[0].function.name, "weather");
    assert!(result.usage.is_consistent());
}

#[test]
fn test_usage_total_is_sum() {
    let usage = Usage::new(7, 5);
    assert_eq!(*usage.total_tokens(), 12);
    assert!(usage.is_consistent());

    let forged: Usage = serde_json::from_value(
        json!({"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 5}),
    )
    .unwrap();
    assert!(!forged.is_consistent());
}

#[test]
fn test_now_envelope_stamps_fingerprint() {
    let envelope = ResponseEnvelope::now("m");
    assert!(envelope.id().starts_with("chatcmpl-"));
    assert!(*envelope.created() > 0);
    assert!(
        envelope
            .system_fingerprint()
            .as_deref()
            .is_some_and(|fp| fp.starts_with("fp_"))
    );
}
